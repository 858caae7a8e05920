// Miner Spawner
//
// <exe> -a <algo> -o <pool-url> -u <wallet>.<worker> -p <password> -t <threads>

use crate::config::MinerConfig;
use crate::error::MinerError;
use crate::types::WorkerIdentity;
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

const BUSY_RETRIES: u32 = 5;
const BUSY_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Pool and wallet settings passed to ccminer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinerArgs {
    pub algorithm: String,
    pub pool_url: String,
    pub wallet: String,
    pub password: String,
    pub threads: u32,
}

impl MinerArgs {
    pub fn from_config(config: &MinerConfig) -> Self {
        Self {
            algorithm: config.algorithm.clone(),
            pool_url: config.pool_url.clone(),
            wallet: config.wallet.clone(),
            password: config.password.clone(),
            threads: config.threads,
        }
    }

    /// Command line arguments for the given worker
    pub fn to_args(&self, worker: &WorkerIdentity) -> Vec<String> {
        vec![
            "-a".to_string(),
            self.algorithm.clone(),
            "-o".to_string(),
            self.pool_url.clone(),
            "-u".to_string(),
            format!("{}.{}", self.wallet, worker),
            "-p".to_string(),
            self.password.clone(),
            "-t".to_string(),
            self.threads.to_string(),
        ]
    }
}

/// Spawn ccminer with piped stdout/stderr and `cwd` as working directory.
/// On unix the miner leads its own process group so helpers it forks are
/// signalled together with it.
pub fn spawn_miner(executable: &Path, args: &[String], cwd: &Path) -> Result<Child, MinerError> {
    let mut attempt = 0;
    loop {
        let mut command = Command::new(executable);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        own_process_group(&mut command);

        let result = command.spawn();

        match result {
            Ok(child) => {
                tracing::info!(pid = child.id(), exe = %executable.display(), "Spawned miner process");
                return Ok(child);
            }
            // A freshly staged binary can still be open for writing in a
            // concurrently forked child
            Err(e) if is_text_file_busy(&e) && attempt < BUSY_RETRIES => {
                attempt += 1;
                tracing::debug!(attempt, "Executable busy, retrying spawn");
                thread::sleep(BUSY_RETRY_DELAY);
            }
            Err(e) => {
                tracing::error!(exe = %executable.display(), error = %e, "Failed to start miner process");
                return Err(MinerError::SpawnFailure(e));
            }
        }
    }
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

#[cfg(unix)]
fn is_text_file_busy(e: &io::Error) -> bool {
    e.raw_os_error() == Some(nix::errno::Errno::ETXTBSY as i32)
}

#[cfg(not(unix))]
fn is_text_file_busy(_e: &io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_argument_contract() {
        let args = MinerArgs::from_config(&MinerConfig::default());
        let worker = WorkerIdentity::new("Pixel-7-AB12CD");

        assert_eq!(
            args.to_args(&worker),
            vec![
                "-a",
                "verus",
                "-o",
                "stratum+tcp://ap.luckpool.net:3956",
                "-u",
                "RNjEn7tNTZ6DuYnYrxKMsvYzBgJ11P5hQ4.Pixel-7-AB12CD",
                "-p",
                "x",
                "-t",
                "5",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_miner_leads_its_own_process_group() {
        let temp_dir = TempDir::new().unwrap();
        let mut child = spawn_miner(std::path::Path::new("sleep"), &["30".to_string()], temp_dir.path()).unwrap();

        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        assert_eq!(nix::unistd::getpgid(Some(pid)).unwrap(), pid);

        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn test_spawn_missing_binary_fails() {
        let temp_dir = TempDir::new().unwrap();
        let result = spawn_miner(&temp_dir.path().join("ccminer"), &[], temp_dir.path());
        assert!(matches!(result, Err(MinerError::SpawnFailure(_))));
    }
}

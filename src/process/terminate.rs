// Graceful Termination
//
// SIGTERM first, SIGKILL once the grace period runs out. Signals go to the
// miner's whole process group so forked helpers cannot keep its output
// pipes open. Always reaps the child so no zombie is left behind.

use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_STEP: Duration = Duration::from_millis(20);

pub fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let pid = child.id();

    if let Some(status) = child.try_wait()? {
        // The leader is gone but its helpers may still be running
        kill_group(pid);
        return Ok(status);
    }

    if request_exit(pid) {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = child.try_wait()? {
                tracing::debug!(pid, ?status, "Miner exited after SIGTERM");
                kill_group(pid);
                return Ok(status);
            }
            thread::sleep(WAIT_STEP);
        }
        tracing::warn!(pid, grace_ms = grace.as_millis() as u64, "Miner ignored SIGTERM, killing");
    }

    kill_group(pid);
    match child.kill() {
        Ok(()) => {}
        // Exited between the last poll and the kill
        Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
        Err(e) => return Err(e),
    }
    child.wait()
}

/// Ask the miner's process group to exit. Returns false if no graceful
/// signal could be delivered.
#[cfg(unix)]
fn request_exit(pid: u32) -> bool {
    use nix::sys::signal::{kill, killpg, Signal};
    use nix::unistd::Pid;

    let pid = Pid::from_raw(pid as i32);
    if killpg(pid, Signal::SIGTERM).is_ok() {
        return true;
    }
    // Not a group leader (spawned elsewhere), signal the process alone
    match kill(pid, Signal::SIGTERM) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(pid = pid.as_raw(), error = %e, "SIGTERM failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn request_exit(_pid: u32) -> bool {
    false
}

/// SIGKILL whatever is left of the process group
#[cfg(unix)]
pub(crate) fn kill_group(pid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::debug!(pid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
pub(crate) fn kill_group(_pid: u32) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};

    fn group_leader(program: &str, args: &[&str]) -> Child {
        Command::new(program)
            .args(args)
            .stdout(Stdio::null())
            .process_group(0)
            .spawn()
            .unwrap()
    }

    #[test]
    fn test_terminate_sleeping_child() {
        let mut child = group_leader("sleep", &["30"]);
        let started = Instant::now();

        let status = terminate(&mut child, Duration::from_secs(5)).unwrap();

        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_escalates_when_sigterm_ignored() {
        let mut child = group_leader("sh", &["-c", "trap '' TERM; while true; do sleep 1; done"]);
        // Give the shell time to install the trap
        thread::sleep(Duration::from_millis(200));

        let status = terminate(&mut child, Duration::from_millis(300)).unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_child_outside_a_group_is_still_stopped() {
        let mut child = Command::new("sleep").arg("30").stdout(Stdio::null()).spawn().unwrap();

        let status = terminate(&mut child, Duration::from_secs(5)).unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_already_exited_child() {
        let mut child = group_leader("true", &[]);
        child.wait().unwrap();
        let status = terminate(&mut child, Duration::from_millis(100)).unwrap();
        assert!(status.success());
    }
}

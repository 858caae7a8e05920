// Mining Session
//
// One run of the ccminer process. The child handle and its reader threads
// are owned here and released together.

use crate::process::terminate;
use crate::process::terminate::kill_group;
use crate::types::WorkerIdentity;
use std::io;
use std::process::{Child, ExitStatus};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long cleanup waits for the output readers before detaching them
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);
const READER_JOIN_STEP: Duration = Duration::from_millis(10);

pub struct MiningSession {
    pub id: u64,
    pub worker: WorkerIdentity,
    pid: u32,
    child: Option<Child>,
    readers: Vec<JoinHandle<()>>,
    started_at: Instant,
}

impl MiningSession {
    pub fn new(id: u64, worker: WorkerIdentity, child: Child, readers: Vec<JoinHandle<()>>) -> Self {
        Self {
            id,
            worker,
            pid: child.id(),
            child: Some(child),
            readers,
            started_at: Instant::now(),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Exit status if the process has already exited
    pub fn try_exit_status(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Ok(None),
        }
    }

    /// Terminate (if still alive), reap, and wait for the output readers.
    /// The session holds no process after this returns, even on error.
    pub fn finish(&mut self, grace: Duration) -> io::Result<ExitStatus> {
        let result = match self.child.take() {
            Some(mut child) => terminate(&mut child, grace),
            None => Err(io::Error::new(io::ErrorKind::NotFound, "session already finished")),
        };
        self.join_readers();
        result
    }

    /// Join the output readers. A reader still blocked on a pipe held open
    /// by some other process is detached rather than waited on.
    fn join_readers(&mut self) {
        let deadline = Instant::now() + READER_JOIN_TIMEOUT;
        for reader in self.readers.drain(..) {
            while !reader.is_finished() && Instant::now() < deadline {
                thread::sleep(READER_JOIN_STEP);
            }
            if !reader.is_finished() {
                tracing::warn!(session = self.id, pid = self.pid, "Output reader still blocked, detaching it");
                continue;
            }
            if reader.join().is_err() {
                tracing::error!(session = self.id, "Output reader thread panicked");
            }
        }
    }
}

impl Drop for MiningSession {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            tracing::warn!(pid = self.pid, worker = %self.worker, "Mining session dropped with live process, killing");
            kill_group(self.pid);
            let _ = child.kill();
            let _ = child.wait();
        }
        self.join_readers();
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    #[test]
    fn test_drop_kills_live_child() {
        let child = Command::new("sleep").arg("30").stdout(Stdio::null()).spawn().unwrap();
        let pid = child.id();
        let session = MiningSession::new(1, WorkerIdentity::new("w"), child, Vec::new());
        drop(session);

        let alive = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok();
        assert!(!alive);
    }

    #[test]
    fn test_finish_does_not_wait_on_blocked_reader() {
        let child = Command::new("sleep").arg("30").stdout(Stdio::null()).spawn().unwrap();
        // Stands in for a reader whose pipe another process keeps open
        let (_keep_open, blocked) = std::sync::mpsc::channel::<()>();
        let reader = thread::spawn(move || {
            let _ = blocked.recv();
        });
        let mut session = MiningSession::new(1, WorkerIdentity::new("w"), child, vec![reader]);

        let started = Instant::now();
        assert!(session.finish(Duration::from_secs(2)).is_ok());
        assert!(started.elapsed() < Duration::from_secs(4), "finish blocked for {:?}", started.elapsed());
    }

    #[test]
    fn test_finish_twice_reports_error() {
        let child = Command::new("sleep").arg("30").stdout(Stdio::null()).spawn().unwrap();
        let mut session = MiningSession::new(1, WorkerIdentity::new("w"), child, Vec::new());

        assert!(session.finish(Duration::from_secs(2)).is_ok());
        assert!(session.finish(Duration::from_secs(2)).is_err());
        assert_eq!(session.try_exit_status().unwrap(), None);
    }
}

// Foreground Presence
//
// Keep-alive announcement shown while the miner runs
// - announce on entering Running
// - cancel when the session ends
//

use crate::types::WorkerIdentity;

pub const PRESENCE_TITLE: &str = "Mobile Miner Running";

/// Platform keep-alive capability (foreground service notification, tray
/// entry, ...). Called only from the controller thread.
pub trait ForegroundPresence: Send + Sync {
    fn announce(&self, title: &str, text: &str);

    fn cancel(&self);
}

/// Body text of the running notification
pub fn presence_text(worker: &WorkerIdentity) -> String {
    format!("Mining with worker: {}", worker)
}

/// Presence that only records the announcement in the log
#[derive(Debug, Default)]
pub struct LogPresence;

impl ForegroundPresence for LogPresence {
    fn announce(&self, title: &str, text: &str) {
        tracing::info!(title, text, "Foreground presence started");
    }

    fn cancel(&self) {
        tracing::info!("Foreground presence stopped");
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingPresence {
        pub announcements: Mutex<Vec<String>>,
        pub cancels: AtomicUsize,
    }

    impl RecordingPresence {
        pub fn announce_count(&self) -> usize {
            self.announcements.lock().unwrap().len()
        }

        pub fn cancel_count(&self) -> usize {
            self.cancels.load(Ordering::SeqCst)
        }
    }

    impl ForegroundPresence for RecordingPresence {
        fn announce(&self, _title: &str, text: &str) {
            self.announcements.lock().unwrap().push(text.to_string());
        }

        fn cancel(&self) {
            self.cancels.fetch_add(1, Ordering::SeqCst);
        }
    }
}

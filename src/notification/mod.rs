// Notification Module - Foreground presence while mining

pub mod sender;

pub use sender::{presence_text, ForegroundPresence, LogPresence, PRESENCE_TITLE};

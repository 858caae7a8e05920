// Identity Module - Worker name persistence
//
// Generates the worker label once per installation and keeps it in a small
// JSON preference file

pub mod device;
pub mod prefs;
pub mod store;

pub use prefs::PreferenceStore;
pub use store::WorkerIdentityStore;

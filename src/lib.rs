// Mobile Miner
//
// Supervises a bundled ccminer process: worker identity, staging, process
// lifecycle and battery/thermal auto-pause. Presentation and the platform
// keep-alive are traits implemented by the host shell.

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod identity;
pub mod monitor;
pub mod notification;
pub mod process;
pub mod staging;
pub mod types;

pub use config::MinerConfig;
pub use controller::{ControllerHandle, MinerController};
pub use error::MinerError;
pub use types::{ControllerState, EnvironmentSample, StartOutcome, StopOutcome, WorkerIdentity};

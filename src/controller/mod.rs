// Controller Module - Miner lifecycle
//
// One thread owns the ccminer session and every state transition

pub mod core;
pub mod session;

pub use self::core::{ControlEvent, ControllerHandle, MinerController};
pub use session::MiningSession;

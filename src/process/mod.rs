// Process Module - ccminer subprocess plumbing
//
// Spawning with the pool/wallet arguments, output reader threads and
// graceful termination. Lifecycle decisions live in the controller.

pub mod output;
pub mod spawner;
pub mod terminate;

pub use output::{start_output_reader, StreamKind};
pub use spawner::{spawn_miner, MinerArgs};
pub use terminate::terminate;

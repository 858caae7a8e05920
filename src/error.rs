// Error Types
//
// Every failure ends the operation that raised it; callers turn them into
// presenter lines and log records.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MinerError {
    #[error("ccminer binary not found or not executable: {}", path.display())]
    ExecutableMissing { path: PathBuf },

    #[error("failed to stage ccminer binary from {}: {source}", asset.display())]
    StagingFailure {
        asset: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to start miner process: {0}")]
    SpawnFailure(#[source] io::Error),

    #[error("miner process exited unexpectedly ({0})")]
    UnexpectedExit(ExitStatus),

    #[error("error reading miner output: {0}")]
    StreamReadFailure(#[source] io::Error),

    #[error("worker identity store failed at {}: {reason}", path.display())]
    Identity { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("miner controller is not running")]
    ControllerUnavailable,
}

impl MinerError {
    pub(crate) fn identity(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MinerError::Identity {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Text line shown to the user for this failure
    pub fn user_message(&self) -> String {
        match self {
            MinerError::ExecutableMissing { .. } => {
                "Error: ccminer binary not found or not executable.".to_string()
            }
            MinerError::StagingFailure { .. } => "Error: Failed to copy ccminer binary.".to_string(),
            MinerError::SpawnFailure(_) => "Error: Failed to start miner process.".to_string(),
            MinerError::UnexpectedExit(status) => {
                format!("Miner process exited unexpectedly ({}).", status)
            }
            other => format!("Error: {}", other),
        }
    }
}

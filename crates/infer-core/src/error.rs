use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferError {
    #[error(
        "replicas not ready after {waited:?}: expected {expected} new containers, saw {observed}"
    )]
    ProvisioningTimeout {
        expected: usize,
        observed: usize,
        waited: Duration,
    },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("learning failed: {0}")]
    LearningFailed(String),

    #[error("output directory already holds a result: {}", .0.display())]
    AlreadyCompleted(PathBuf),

    #[error("cannot execute an empty word")]
    EmptyWord,

    #[error("config error: {0}")]
    Config(String),

    #[error("container runtime error: {0}")]
    Runtime(String),

    #[error("session {0} is already active on this host")]
    SessionBusy(u8),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InferError {
    /// Process exit status for errors that end a session.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::AlreadyCompleted(_) => 1,
            Self::Config(_) => 2,
            Self::ProvisioningTimeout { .. } => 3,
            Self::LearningFailed(_) => 4,
            Self::SessionBusy(_) => 5,
            Self::Runtime(_) => 6,
            _ => 1,
        }
    }
}

pub type InferResult<T> = Result<T, InferError>;

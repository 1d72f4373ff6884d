//! Error types for the task timer.

use thiserror::Error;

/// Failures reading or writing a persisted slot.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid slot key '{0}'")]
    InvalidKey(String),
}

/// A collaborator (notification, audio, alarm) could not do its job.
///
/// Always logged and dropped by the driver; never aborts a transition.
#[derive(Error, Debug)]
pub enum EffectError {
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive number of milliseconds, got '{value}'")]
    InvalidTick { var: &'static str, value: String },
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

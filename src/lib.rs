pub mod assistant;
pub mod config;
pub mod engines;
pub mod intent;
pub mod models;
pub mod session;
pub mod speech;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum TellerError {
    #[error("invalid session state: expected {expected}, was {actual}")]
    InvalidState {
        expected: &'static str,
        actual: String,
    },

    #[error("models are not ready")]
    NotReady,

    #[error("audio capture error: {0}")]
    Capture(String),

    #[error("model load error: {0}")]
    ModelLoad(String),

    #[error("required entity missing: {0}")]
    MissingEntity(&'static str),

    #[error("calendar access denied")]
    PermissionDenied,

    #[error("calendar write failed: {0}")]
    Persistence(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TellerError {
    /// Check if this error is recovered into a spoken utterance rather than
    /// surfaced to the caller.
    ///
    /// Only `InvalidState` (and the infrastructure errors) are reported
    /// directly; everything else terminates in speech and a return to idle.
    pub fn is_spoken_recovery(&self) -> bool {
        matches!(
            self,
            TellerError::MissingEntity(_)
                | TellerError::PermissionDenied
                | TellerError::Persistence(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, TellerError>;

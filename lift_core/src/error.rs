//! Error types for the lift_core library.

use crate::session::SessionPhase;
use std::io;
use uuid::Uuid;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lift_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Routine/exercise library validation error
    #[error("Library validation error: {0}")]
    LibraryValidation(String),

    /// A session operation was called from a phase that does not allow it.
    ///
    /// This is a caller bug, not a runtime condition.
    #[error("cannot {operation} while workout is {phase}")]
    InvalidTransition {
        operation: &'static str,
        phase: SessionPhase,
    },

    /// The referenced set log does not belong to the active session
    #[error("Unknown set log: {0}")]
    UnknownSet(Uuid),

    /// State management error
    #[error("State error: {0}")]
    State(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

//! Error types for the Stepwise session engine.

use thiserror::Error;

use crate::session::SessionKey;

/// A shared error type for the session engine.
///
/// Only [`StepwiseError::DuplicateSession`] is expected to reach callers of
/// [`SessionController::begin`](crate::session::SessionController::begin) in normal
/// operation. The remaining variants describe collaborator failures or conditions the
/// controller resolves internally and reports for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepwiseError {
    /// A session is already live under this key
    #[error("A session is already in progress for {key}")]
    DuplicateSession { key: SessionKey },

    /// The session's collected responses no longer line up with its step index
    #[error(
        "Inconsistent session state for {key}: step index {step_index}, {responses} responses"
    )]
    InternalConsistency {
        key: SessionKey,
        step_index: usize,
        responses: usize,
    },

    /// A session spec without any steps can never prompt
    #[error("Session spec '{0}' has no steps")]
    EmptySpec(String),

    /// No guided command is registered under this identifier
    #[error("Unknown guided command: {0}")]
    UnknownCommand(String),

    /// Sending or deleting a message failed
    #[error("Messaging error: {0}")]
    Messaging(String),

    /// A completion sink reported a failure
    #[error("Completion error: {0}")]
    Completion(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization { format: String, message: String },
}

impl StepwiseError {
    /// Creates a DuplicateSession error
    pub fn duplicate(key: SessionKey) -> Self {
        Self::DuplicateSession { key }
    }

    /// Creates a Messaging error
    pub fn messaging(message: impl Into<String>) -> Self {
        Self::Messaging(message.into())
    }

    /// Creates a Completion error
    pub fn completion(message: impl Into<String>) -> Self {
        Self::Completion(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a DuplicateSession error
    pub fn is_duplicate_session(&self) -> bool {
        matches!(self, Self::DuplicateSession { .. })
    }

    /// Check if this is an InternalConsistency error
    pub fn is_internal_consistency(&self) -> bool {
        matches!(self, Self::InternalConsistency { .. })
    }
}

impl From<std::io::Error> for StepwiseError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<toml::de::Error> for StepwiseError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// A type alias for `Result<T, StepwiseError>`.
pub type Result<T> = std::result::Result<T, StepwiseError>;

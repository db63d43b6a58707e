//! Error types for a3s-protect

use thiserror::Error;

/// Errors that can occur while protecting repository properties
#[derive(Debug, Error)]
pub enum ProtectError {
    /// No repository session could be obtained for the save batch
    #[error("Repository session unavailable")]
    SessionUnavailable,

    /// Underlying protect/unprotect capability failure
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Failure reading or writing a specific property
    #[error("Failed to access property '{path}': {reason}")]
    RepositoryAccess {
        path: String,
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ProtectError {
    /// Build a repository access error for a property path
    pub fn repository(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RepositoryAccess {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for protect operations
pub type Result<T> = std::result::Result<T, ProtectError>;

//! Error types for the policy engine.

use thiserror::Error;

/// Errors that can occur while loading or evaluating policies.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The policy file could not be read or parsed.
    #[error("Policy load error: {message}")]
    Load {
        /// Description of the load failure.
        message: String,
    },

    /// The policy document failed validation.
    #[error("Policy validation error: {message}")]
    Validation {
        /// Joined validation errors.
        message: String,
    },

    /// An unrecoverable failure during evaluation.
    ///
    /// Never surfaced to HTTP callers: the authorization service collapses
    /// it into a safe-default Deny response.
    #[error("Evaluation error: {message}")]
    Evaluation {
        /// Description of the evaluation failure.
        message: String,
    },
}

impl PolicyError {
    /// Creates a new `Load` error.
    #[must_use]
    pub fn load(message: impl Into<String>) -> Self {
        Self::Load {
            message: message.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `Evaluation` error.
    #[must_use]
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::Evaluation {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        Self::load(format!("Invalid JSON in policies file: {err}"))
    }
}

impl From<std::io::Error> for PolicyError {
    fn from(err: std::io::Error) -> Self {
        Self::load(format!("Failed to read policies file: {err}"))
    }
}

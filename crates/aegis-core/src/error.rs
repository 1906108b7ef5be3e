//! Error taxonomy for the resource-store boundary.
//!
//! These are the error kinds the SCIM store surfaces and the core consumes.
//! Token and policy errors live in their own crates; this taxonomy covers
//! entity lookup and persistence.

use thiserror::Error;

/// Errors surfaced by resource stores and shared infrastructure.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The requested entity does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of entity ("User", "Group").
        resource: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("{resource} already exists: {value}")]
    AlreadyExists {
        /// Kind of entity.
        resource: String,
        /// The conflicting unique value.
        value: String,
    },

    /// A reference points at an entity that does not exist.
    #[error("Referential integrity violation: {message}")]
    ReferentialIntegrity {
        /// Description of the dangling reference.
        message: String,
    },

    /// The submitted entity is malformed.
    #[error("Invalid resource: {message}")]
    InvalidResource {
        /// Description of what is wrong with the resource.
        message: String,
    },

    /// The store failed to read or write.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Startup or runtime configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(resource: impl Into<String>, value: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
            value: value.into(),
        }
    }

    /// Creates a new `ReferentialIntegrity` error.
    #[must_use]
    pub fn referential_integrity(message: impl Into<String>) -> Self {
        Self::ReferentialIntegrity {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidResource` error.
    #[must_use]
    pub fn invalid_resource(message: impl Into<String>) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this error maps to a 4xx response.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::ReferentialIntegrity { .. }
                | Self::InvalidResource { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::not_found("User", "usr_missing");
        assert_eq!(err.to_string(), "User not found: usr_missing");

        let err = CoreError::already_exists("User", "jdoe");
        assert_eq!(err.to_string(), "User already exists: jdoe");

        let err = CoreError::referential_integrity("member usr_x does not exist");
        assert_eq!(
            err.to_string(),
            "Referential integrity violation: member usr_x does not exist"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::not_found("User", "x").is_client_error());
        assert!(CoreError::already_exists("Group", "x").is_client_error());
        assert!(CoreError::invalid_resource("bad").is_client_error());
        assert!(!CoreError::storage("disk on fire").is_client_error());
        assert!(!CoreError::configuration("missing var").is_client_error());
    }
}

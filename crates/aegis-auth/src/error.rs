//! Authentication and token error types.

use thiserror::Error;

/// Errors that can occur during authentication and token operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Client or user credentials did not match.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// The user exists in the directory but is marked inactive.
    #[error("User {username} is inactive")]
    UserInactive {
        /// Username of the inactive account.
        username: String,
    },

    /// The token's `exp` is in the past.
    #[error("Token has expired")]
    TokenExpired,

    /// The token failed verification for any other reason.
    #[error("Invalid token: {message}")]
    TokenInvalid {
        /// Description of why the token is invalid (log-only detail).
        message: String,
    },

    /// The requested grant type is not supported.
    #[error("Unsupported grant_type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The request is malformed (missing credentials for the grant, bad header).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of the problem.
        message: String,
    },

    /// The request lacks valid authentication.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// Authenticated, but not allowed to perform the action.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// Key material or token configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `UserInactive` error.
    #[must_use]
    pub fn user_inactive(username: impl Into<String>) -> Self {
        Self::UserInactive {
            username: username.into(),
        }
    }

    /// Creates a new `TokenInvalid` error.
    #[must_use]
    pub fn token_invalid(message: impl Into<String>) -> Self {
        Self::TokenInvalid {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
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

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for token verification failures.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        matches!(self, Self::TokenExpired | Self::TokenInvalid { .. })
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_client",
            Self::UserInactive { .. } => "invalid_grant",
            Self::TokenExpired | Self::TokenInvalid { .. } => "invalid_token",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Unauthorized { .. } => "unauthorized",
            Self::Forbidden { .. } => "access_denied",
            Self::Configuration { .. } | Self::Internal { .. } => "server_error",
        }
    }
}

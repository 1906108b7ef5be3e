//! HTTP error responses for authentication failures.
//!
//! `AuthError` renders as an OAuth2-style `{error, error_description}`
//! body; 401 responses additionally carry a `WWW-Authenticate` header.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// OAuth2 error body (RFC 6749 §5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthErrorBody {
    /// OAuth2 error code.
    pub error: String,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        let error = self.oauth_error_code();
        let description = public_description(&self);

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = format!(
                "Bearer realm=\"aegis\", error=\"{}\", error_description=\"{}\"",
                error,
                description.replace('"', "\\\"")
            );
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        let body = OAuthErrorBody {
            error: error.to_string(),
            error_description: Some(description),
        };

        (status, headers, Json(body)).into_response()
    }
}

fn status_for(error: &AuthError) -> StatusCode {
    match error {
        AuthError::InvalidCredentials
        | AuthError::UserInactive { .. }
        | AuthError::TokenExpired
        | AuthError::TokenInvalid { .. }
        | AuthError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AuthError::UnsupportedGrantType { .. } | AuthError::InvalidRequest { .. } => {
            StatusCode::BAD_REQUEST
        }
        AuthError::Configuration { .. } | AuthError::Internal { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Caller-facing description. Token failures collapse to one uniform
/// message; the distinguishing detail is log-only.
fn public_description(error: &AuthError) -> String {
    match error {
        AuthError::InvalidCredentials => "Authentication failed - invalid credentials".to_string(),
        AuthError::UserInactive { .. } => "User account is inactive".to_string(),
        AuthError::TokenExpired | AuthError::TokenInvalid { .. } => {
            "Invalid or expired token".to_string()
        }
        AuthError::Internal { .. } | AuthError::Configuration { .. } => {
            "Internal server error".to_string()
        }
        other => other.to_string(),
    }
}

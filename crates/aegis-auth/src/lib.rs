//! # aegis-auth
//!
//! Token issuance and bearer authentication for the Aegis identity
//! microservice.
//!
//! This crate provides:
//! - The token manager: HS256/RS256 signing, verification, refresh
//! - The auth service: OAuth2-style grant flows over a credential table
//! - The gatekeeper middleware and request extractors
//! - OAuth2 error responses
//!
//! ## Modules
//!
//! - [`config`] - Token configuration (algorithm, keys, issuer, audience)
//! - [`keys`] - Key material loading and development keypair generation
//! - [`jwt`] - The token manager
//! - [`claims`] - Typed token claims
//! - [`credentials`] - Static credential table
//! - [`service`] - Grant flows and claims assembly
//! - [`middleware`] - Gatekeeper and extractors
//! - [`response`] - HTTP error rendering

pub mod claims;
pub mod config;
pub mod credentials;
pub mod error;
pub mod jwt;
pub mod keys;
pub mod middleware;
pub mod response;
pub mod service;

pub use claims::Claims;
pub use config::{Environment, TokenAlgorithm, TokenConfig};
pub use credentials::{CredentialsTable, SubjectProfile};
pub use error::AuthError;
pub use jwt::{ClaimsMap, TokenManager};
pub use middleware::{
    ADMIN_GROUP, AdminAuth, AuthGateway, AuthSession, OptionalAuth, RequireAuth, authenticate,
    require_authenticated,
};
pub use response::OAuthErrorBody;
pub use service::{AuthService, TokenRequest, TokenResponse};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;

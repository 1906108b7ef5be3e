//! Shared application state.

use std::sync::Arc;

use aegis_abac::AuthzService;
use aegis_auth::AuthService;
use aegis_scim::InMemoryDirectory;

use crate::config::AppConfig;

/// Application state: one live instance of each service, assembled at
/// startup and cloned (cheaply, via `Arc`) into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Validated configuration.
    pub config: Arc<AppConfig>,
    /// Authentication service (grant flows, token validation).
    pub auth_service: Arc<AuthService>,
    /// Authorization service (ABAC evaluation).
    pub authz_service: Arc<AuthzService>,
    /// SCIM directory store.
    pub directory: Arc<InMemoryDirectory>,
}

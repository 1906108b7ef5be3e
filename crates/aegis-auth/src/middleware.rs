//! Bearer-token gatekeeper and request extractors.
//!
//! The gatekeeper runs in front of every route outside the exclusion set.
//! A missing `Authorization` header lets the request through unauthenticated
//! (handlers decide whether that matters); a malformed header or a failed
//! verification is rejected at the gate with 401.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::claims::Claims;
use crate::error::AuthError;
use crate::service::AuthService;

/// Paths that bypass bearer authentication entirely.
const EXCLUDED_PATHS: &[&str] = &["/", "/health", "/config", "/docs", "/openapi.json", "/auth/token"];

/// Path prefixes that bypass bearer authentication (docs routes).
const EXCLUDED_PREFIXES: &[&str] = &["/docs", "/openapi"];

/// Authentication outcome attached to every request that passes the gate.
#[derive(Clone, Default)]
pub struct AuthSession {
    /// `true` when a bearer token was presented and verified.
    pub authenticated: bool,
    /// Verified claims, when authenticated.
    pub claims: Option<Arc<Claims>>,
}

impl AuthSession {
    fn anonymous() -> Self {
        Self::default()
    }

    fn authenticated(claims: Claims) -> Self {
        Self {
            authenticated: true,
            claims: Some(Arc::new(claims)),
        }
    }
}

/// State for the gatekeeper middleware.
#[derive(Clone)]
pub struct AuthGateway {
    auth_service: Arc<AuthService>,
}

impl AuthGateway {
    /// Creates the gateway over the auth service.
    #[must_use]
    pub fn new(auth_service: Arc<AuthService>) -> Self {
        Self { auth_service }
    }
}

fn is_excluded(path: &str) -> bool {
    EXCLUDED_PATHS.contains(&path)
        || EXCLUDED_PREFIXES
            .iter()
            .any(|prefix| path.starts_with(prefix))
}

/// Gatekeeper middleware: extracts and verifies the bearer token, attaching
/// an [`AuthSession`] to the request.
pub async fn authenticate(
    State(gateway): State<AuthGateway>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    if is_excluded(&path) {
        request.extensions_mut().insert(AuthSession::anonymous());
        return next.run(request).await;
    }

    let Some(header) = request.headers().get(AUTHORIZATION) else {
        // No credentials presented; handlers decide whether auth is required.
        request.extensions_mut().insert(AuthSession::anonymous());
        return next.run(request).await;
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "));
    let Some(token) = token else {
        tracing::warn!(path = %path, "Malformed authorization header");
        return AuthError::unauthorized(
            "Invalid authorization header format. Expected 'Bearer <token>'",
        )
        .into_response();
    };

    match gateway.auth_service.validate_token_and_get_claims(token) {
        Ok(claims) => {
            tracing::debug!(subject = %claims.sub, path = %path, "Request authenticated");
            request
                .extensions_mut()
                .insert(AuthSession::authenticated(claims));
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(path = %path, error = %err, "Token validation failed");
            // Cause details stay in the log; callers see a uniform message.
            AuthError::token_invalid("Invalid or expired token").into_response()
        }
    }
}

/// Middleware that rejects unauthenticated requests outright.
///
/// Applied to route groups (e.g. the SCIM surface) whose every handler
/// requires a bearer, saving a per-handler extractor.
pub async fn require_authenticated(request: Request, next: Next) -> Response {
    let authenticated = request
        .extensions()
        .get::<AuthSession>()
        .is_some_and(|session| session.authenticated);
    if !authenticated {
        return AuthError::unauthorized("Authentication required").into_response();
    }
    next.run(request).await
}

// =============================================================================
// Extractors
// =============================================================================

/// Extractor that requires an authenticated caller.
///
/// Rejects with 401 when unauthenticated, and 403 when the session claims
/// are missing despite authentication.
pub struct RequireAuth(pub Arc<Claims>);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .unwrap_or_default();

        if !session.authenticated {
            return Err(AuthError::unauthorized("Authentication required"));
        }

        session
            .claims
            .map(RequireAuth)
            .ok_or_else(|| AuthError::forbidden("Invalid authentication state"))
    }
}

/// Extractor that yields claims when present, `None` otherwise.
pub struct OptionalAuth(pub Option<Arc<Claims>>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .unwrap_or_default();
        Ok(OptionalAuth(session.authenticated.then_some(session.claims).flatten()))
    }
}

/// Group whose members may perform administrative operations.
pub const ADMIN_GROUP: &str = "ADMINS";

/// Extractor that additionally requires membership in [`ADMIN_GROUP`].
pub struct AdminAuth(pub Arc<Claims>);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(claims) = RequireAuth::from_request_parts(parts, state).await?;
        if !claims.has_group(ADMIN_GROUP) {
            tracing::warn!(
                subject = %claims.sub,
                groups = ?claims.groups,
                "Unauthorized admin operation attempt"
            );
            return Err(AuthError::forbidden("Admin privileges required"));
        }
        Ok(AdminAuth(claims))
    }
}

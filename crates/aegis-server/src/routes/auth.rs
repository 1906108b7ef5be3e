//! Authentication endpoints: token issuance and caller introspection.

use axum::{Json, extract::State};
use aegis_auth::{AuthError, Claims, RequireAuth, TokenRequest, TokenResponse};
use serde_json::{Value, json};

use super::now_rfc3339;
use crate::state::AppState;

/// `POST /auth/token`: authenticates credentials and issues a bearer token.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    tracing::info!(grant_type = %request.grant_type, "Token generation requested");
    let response = state.auth_service.authenticate_and_issue(&request).await?;
    Ok(Json(response))
}

/// `GET /auth/me`: returns the verified claims of the caller.
pub async fn me(RequireAuth(claims): RequireAuth) -> Json<Claims> {
    tracing::info!(subject = %claims.sub, "User info requested");
    Json((*claims).clone())
}

/// `GET /auth/health`: authentication service health.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "auth_service": "ok",
        "token_manager": "ok",
        "algorithm": state.auth_service.token_manager().algorithm().as_str(),
        "timestamp": now_rfc3339(),
    }))
}

//! Authorization endpoints: evaluation, debugging, administration.

use aegis_abac::{AbacRequest, AuthzMetrics};
use aegis_auth::{AdminAuth, RequireAuth};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use super::now_rfc3339;
use crate::state::AppState;

fn correlation_id(headers: &HeaderMap) -> Option<&str> {
    headers.get("x-correlation-id").and_then(|v| v.to_str().ok())
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "invalid_request",
            "error_description": message,
        })),
    )
        .into_response()
}

/// `POST /authz/evaluate`: renders an authorization decision.
///
/// Always 200 with a decision in the body; the decision itself may be Deny.
pub async fn evaluate(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    headers: HeaderMap,
    Json(request): Json<AbacRequest>,
) -> Response {
    if let Err(message) = request.validate() {
        return bad_request(&message);
    }

    let correlation_id = correlation_id(&headers);
    tracing::info!(
        correlation_id = ?correlation_id,
        authenticated_user = %claims.sub,
        subject_dept = ?request.subject.dept,
        resource_type = ?request.resource.resource_type,
        "Authorization evaluation requested"
    );

    let response = state.authz_service.evaluate(&request, correlation_id).await;
    Json(response).into_response()
}

/// `GET /authz/policies`: applicability breakdown for a request (debugging).
pub async fn applicable_policies(
    State(state): State<AppState>,
    RequireAuth(claims): RequireAuth,
    headers: HeaderMap,
    Json(request): Json<AbacRequest>,
) -> Response {
    if let Err(message) = request.validate() {
        return bad_request(&message);
    }

    tracing::info!(
        correlation_id = ?correlation_id(&headers),
        authenticated_user = %claims.sub,
        "Applicable policies requested"
    );

    let listing = state.authz_service.get_applicable_policies(&request).await;
    Json(listing).into_response()
}

/// `POST /authz/policies/reload`: forces a policy reload (ADMINS only).
pub async fn reload_policies(
    State(state): State<AppState>,
    AdminAuth(claims): AdminAuth,
) -> Json<Value> {
    tracing::info!(admin_user = %claims.sub, "Policy reload requested");

    let outcome = state.authz_service.reload_policies().await;

    tracing::info!(
        admin_user = %claims.sub,
        valid = outcome.reload_result.valid,
        policies_count = outcome.reload_result.policies_count,
        "Policy reload completed"
    );

    Json(json!({
        "reload_result": outcome.reload_result,
        "cache_cleared": outcome.cache_cleared,
        "timestamp": now_rfc3339(),
    }))
}

/// `GET /authz/metrics`: authorization service metrics.
pub async fn metrics(
    State(state): State<AppState>,
    RequireAuth(_claims): RequireAuth,
) -> Json<AuthzMetrics> {
    Json(state.authz_service.metrics().await)
}

/// `GET /authz/health`: authorization service health and policy status.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let validation = state.authz_service.validate_current_policies();
    let metadata = state.authz_service.policy_metadata().await;
    let metrics = state.authz_service.metrics().await;

    let status = if validation.valid { "healthy" } else { "degraded" };
    Json(json!({
        "service": "authorization",
        "status": status,
        "policies": {
            "valid": validation.valid,
            "count": metadata.policies_count,
            "errors": validation.errors,
            "warnings": validation.warnings,
        },
        "metrics": metrics,
        "timestamp": now_rfc3339(),
    }))
}

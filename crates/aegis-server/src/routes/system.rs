//! Service-level endpoints: banner, liveness, redacted configuration.

use axum::{Json, extract::State};
use serde_json::{Value, json};

use super::now_rfc3339;
use crate::state::AppState;

/// `GET /`: service banner.
pub async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": state.config.app_name,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "environment": state.config.environment.as_str(),
    }))
}

/// `GET /health`: liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": now_rfc3339(),
    }))
}

/// `GET /config`: redacted configuration view. Secrets and key material
/// are never included.
pub async fn config(State(state): State<AppState>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "app_name": config.app_name,
        "environment": config.environment.as_str(),
        "log_level": config.log_level,
        "policies_path": config.policies_path.display().to_string(),
        "db_path": config.db_path.display().to_string(),
        "cors_origins": config.cors_origins,
        "jwt": {
            "algorithm": config.token.algorithm.as_str(),
            "issuer": config.token.issuer,
            "audience": config.token.audience,
            "expiration_minutes": config.token.expiration_minutes,
        },
    }))
}

//! Router assembly and server lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use aegis_auth::{AuthGateway, authenticate, require_authenticated};
use aegis_scim::{GroupStore, ScimState, UserStore};
use axum::{
    Router,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{RateLimiter, rate_limit, request_id};
use crate::routes;
use crate::state::AppState;

/// Builds the full application router.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let gateway = AuthGateway::new(state.auth_service.clone());
    let users: Arc<dyn UserStore> = state.directory.clone();
    let groups: Arc<dyn GroupStore> = state.directory.clone();
    let scim_state = ScimState::new(users, groups);

    let auth_routes = Router::new()
        .route("/auth/token", post(routes::auth::issue_token))
        .route_layer(from_fn_with_state(RateLimiter::per_minute(10), rate_limit))
        .merge(
            Router::new()
                .route("/auth/me", get(routes::auth::me))
                .route_layer(from_fn_with_state(RateLimiter::per_minute(30), rate_limit)),
        )
        .route("/auth/health", get(routes::auth::health));

    let authz_routes = Router::new()
        .route("/authz/evaluate", post(routes::authz::evaluate))
        .route_layer(from_fn_with_state(RateLimiter::per_minute(100), rate_limit))
        .merge(
            Router::new()
                .route("/authz/policies", get(routes::authz::applicable_policies))
                .route_layer(from_fn_with_state(RateLimiter::per_minute(50), rate_limit)),
        )
        .merge(
            Router::new()
                .route("/authz/policies/reload", post(routes::authz::reload_policies))
                .route_layer(from_fn_with_state(RateLimiter::per_minute(10), rate_limit)),
        )
        .route("/authz/metrics", get(routes::authz::metrics))
        .route("/authz/health", get(routes::authz::health));

    let system_routes = Router::new()
        .route("/", get(routes::system::root))
        .route("/health", get(routes::system::health))
        .route("/config", get(routes::system::config));

    let scim_routes = aegis_scim::router(scim_state).layer(from_fn(require_authenticated));

    Router::new()
        .merge(auth_routes)
        .merge(authz_routes)
        .merge(system_routes)
        .nest_service("/scim/v2", scim_routes)
        .layer(from_fn_with_state(gateway, authenticate))
        .layer(from_fn(request_id))
        .layer(cors_layer(&state.config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let list: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(list))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Binds and serves until a shutdown signal arrives.
///
/// # Errors
///
/// Returns an I/O error when binding or serving fails.
pub async fn run(state: AppState) -> std::io::Result<()> {
    let addr = state.config.addr();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}

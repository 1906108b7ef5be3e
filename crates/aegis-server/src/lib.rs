//! # aegis-server
//!
//! HTTP server for the Aegis identity microservice: configuration,
//! router assembly, middleware, and startup bootstrap.

pub mod bootstrap;
pub mod config;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use server::{build_router, run};
pub use state::AppState;

use tracing_subscriber::EnvFilter;

/// Initialises the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

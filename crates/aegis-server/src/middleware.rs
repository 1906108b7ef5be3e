//! Request-id propagation and per-IP rate limiting.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    Json,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use uuid::Uuid;

/// Middleware that ensures each request has an `X-Request-Id` and mirrors
/// it on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    let req_id_value = req.headers().get(&header_name).cloned().unwrap_or_else(|| {
        HeaderValue::from_str(&Uuid::new_v4().to_string()).expect("uuid is a valid header value")
    });

    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

// =============================================================================
// Rate limiting
// =============================================================================

struct RateLimiterInner {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, (Instant, u32)>>,
}

/// Fixed-window per-IP rate limiter.
///
/// One instance per protected route group; windows reset after the
/// configured interval. Stale windows are dropped opportunistically when
/// the map grows.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<RateLimiterInner>,
}

impl RateLimiter {
    /// A limiter allowing `limit` requests per minute per client IP.
    #[must_use]
    pub fn per_minute(limit: u32) -> Self {
        Self {
            inner: Arc::new(RateLimiterInner {
                limit,
                window: Duration::from_secs(60),
                windows: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Records one request from `ip`; returns `false` when over the limit.
    fn allow(&self, ip: IpAddr) -> bool {
        let mut windows = self.inner.windows.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();

        if windows.len() > 10_000 {
            let window = self.inner.window;
            windows.retain(|_, (start, _)| now.duration_since(*start) < window);
        }

        let entry = windows.entry(ip).or_insert((now, 0));
        if now.duration_since(entry.0) >= self.inner.window {
            *entry = (now, 0);
        }
        entry.1 += 1;
        entry.1 <= self.inner.limit
    }
}

/// Middleware enforcing a [`RateLimiter`] for the wrapped routes.
pub async fn rate_limit(
    State(limiter): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&req);
    if !limiter.allow(ip) {
        tracing::warn!(client_ip = %ip, path = %req.uri().path(), "Rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "rate_limited",
                "error_description": "Too many requests, try again later",
            })),
        )
            .into_response();
    }
    next.run(req).await
}

/// Best-effort client address: `X-Forwarded-For` first hop, else the
/// connection peer, else unspecified.
fn client_ip(req: &Request<Body>) -> IpAddr {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        && let Some(first) = forwarded.split(',').next()
        && let Ok(ip) = first.trim().parse()
    {
        return ip;
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip())
}

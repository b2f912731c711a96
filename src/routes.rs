//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /{hash}`      - Gated redirect (public)
//! - `GET  /{hash}/qr`   - Gated QR code (public)
//! - `GET  /health`      - Health check: store, broker, cache, click queue
//! - `/api/*`            - Creation and inspection API (rate limited)
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Rate limiting** - Per-IP token bucket (configurable for proxy deployments)
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::{health_handler, qr_handler, redirect_handler};
use crate::api::middleware::{rate_limit, tracing};
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
///
/// # Arguments
///
/// - `state` - shared application state injected into all handlers
/// - `behind_proxy` - when `true`, rate limiting reads client IP from
///   `X-Forwarded-For` / `X-Real-IP` headers instead of the peer socket address;
///   enable only when the service runs behind a trusted reverse proxy
pub fn router(state: AppState, behind_proxy: bool) -> Router {
    let api_router = rate_limit::apply(api::routes::api_routes(), behind_proxy);

    Router::new()
        .route("/{hash}", get(redirect_handler))
        .route("/{hash}/qr", get(qr_handler))
        .route("/health", get(health_handler))
        .nest("/api", api_router)
        .with_state(state)
        .layer(tracing::layer())
}

/// [`router`] with trailing slashes trimmed before routing.
pub fn app_router(state: AppState, behind_proxy: bool) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state, behind_proxy))
}

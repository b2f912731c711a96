//! API route configuration.
//!
//! Creation and inspection endpoints, mounted under `/api` and rate
//! limited per client by [`crate::api::middleware::rate_limit`].

use crate::api::handlers::{create_link_handler, link_info_handler};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// All API routes.
///
/// # Endpoints
///
/// - `POST /link`         - Create a short URL and queue its verification
/// - `GET  /link/{hash}`  - Verification state and recent clicks of a record
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/link", post(create_link_handler))
        .route("/link/{hash}", get(link_info_handler))
}

//! Handler for short URL redirect.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use std::net::SocketAddr;

use crate::domain::click_event::ClickEvent;
use crate::domain::entities::RedirectMode;
use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short URL to its target once the target is verified safe.
///
/// # Endpoint
///
/// `GET /{hash}`
///
/// # Responses
///
/// - **307 / 301**: target verified safe; status follows the record's mode
/// - **404**: unknown hash
/// - **503** + `Retry-After`: verification still pending
/// - **403**: target flagged unsafe
///
/// Successful redirects are recorded asynchronously; a full click queue
/// drops the record, not the redirect.
pub async fn redirect_handler(
    Path(hash): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Result<impl IntoResponse, AppError> {
    let click = ClickEvent::new(
        hash,
        Some(addr.ip().to_string()),
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok()),
        headers.get(header::REFERER).and_then(|v| v.to_str().ok()),
    );

    let redirection = state.gate_service.redirect(click).await?;

    let status = match redirection.mode {
        RedirectMode::Temporary => StatusCode::TEMPORARY_REDIRECT,
        RedirectMode::Permanent => StatusCode::MOVED_PERMANENTLY,
    };

    Ok((status, [(header::LOCATION, redirection.target)]))
}

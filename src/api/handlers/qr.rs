//! Handler for QR code retrieval.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::error::AppError;
use crate::state::AppState;

/// Returns the QR code of a verified short URL.
///
/// # Endpoint
///
/// `GET /{hash}/qr`
///
/// Responds with `image/svg+xml`. Gated exactly like the redirect: 404 for
/// unknown hashes, 503 + `Retry-After` while pending, 403 when unsafe.
pub async fn qr_handler(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    let image = state.qr_service.get(&hash).await?;

    Ok((
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        image.bytes,
    ))
}

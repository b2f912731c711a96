//! Handler for record metadata.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::dto::link::LinkInfoResponse;
use crate::error::AppError;
use crate::state::AppState;

/// Returns a record's verification state and recent clicks.
///
/// # Endpoint
///
/// `GET /api/link/{hash}`
///
/// Not gated: pending and unsafe records are reported, not rejected.
///
/// # Errors
///
/// Returns 404 Not Found for unknown hashes.
pub async fn link_info_handler(
    Path(hash): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<LinkInfoResponse>, AppError> {
    let info = state.link_info_service.get(&hash).await?;
    Ok(Json(info.into()))
}

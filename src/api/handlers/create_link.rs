//! Handler for short URL creation.

use axum::{
    Json,
    extract::{ConnectInfo, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::net::SocketAddr;
use validator::Validate;

use crate::api::dto::link::{CreateLinkRequest, CreateLinkResponse};
use crate::domain::entities::ShortUrlMetadata;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short URL and queues its safety verification.
///
/// # Endpoint
///
/// `POST /api/link`
///
/// # Request Body
///
/// ```json
/// { "url": "http://example.com/", "want_qr": true, "sponsor": "acme", "permanent": false }
/// ```
///
/// # Response
///
/// `201 Created` with a `Location` header pointing at the short URL:
///
/// ```json
/// {
///   "hash": "2a1b4024",
///   "url": "http://localhost:3000/2a1b4024",
///   "qr": "http://localhost:3000/2a1b4024/qr",
///   "target": "http://example.com/",
///   "safety": "unknown",
///   "verification": "queued"
/// }
/// ```
///
/// The response never waits for the verdict; the short URL answers
/// `503` with `Retry-After` until the target has been checked.
///
/// # Errors
///
/// Returns 400 Bad Request (`invalid_url`) for unsupported URLs.
pub async fn create_link_handler(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let metadata = ShortUrlMetadata {
        sponsor: payload.sponsor,
        ip: Some(addr.ip().to_string()),
        permanent: payload.permanent,
    };

    let created = state
        .creation_service
        .create(&payload.url, payload.want_qr, metadata)
        .await?;

    let location = created.short_url.clone();
    let body = CreateLinkResponse::from(created);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(body),
    ))
}

//! DTOs for short URL creation and lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::application::services::{CreatedShortUrl, LinkInfo, VerificationStatus};
use crate::domain::entities::{Click, Safety};

/// Request to shorten a URL.
///
/// The URL itself is checked by the creation service so that unsupported
/// schemes report `invalid_url`; only sizes are validated here.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLinkRequest {
    #[validate(length(max = 2048, message = "URL is too long"))]
    pub url: String,

    /// Prefetch and cache a QR code once the target is verified.
    #[serde(default)]
    pub want_qr: bool,

    #[validate(length(min = 1, max = 128))]
    pub sponsor: Option<String>,

    /// When true, uses 301 Moved Permanently instead of 307 Temporary Redirect.
    #[serde(default)]
    pub permanent: bool,
}

/// Response of a successful creation.
#[derive(Debug, Serialize)]
pub struct CreateLinkResponse {
    pub hash: String,
    /// Public short URL.
    pub url: String,
    /// QR endpoint, present when a QR code was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    pub target: String,
    pub safety: Safety,
    pub verification: VerificationStatus,
}

impl From<CreatedShortUrl> for CreateLinkResponse {
    fn from(created: CreatedShortUrl) -> Self {
        Self {
            hash: created.record.hash,
            url: created.short_url,
            qr: created.qr_url,
            target: created.record.target,
            safety: created.record.safety,
            verification: created.verification,
        }
    }
}

/// A recorded redirect.
#[derive(Debug, Serialize)]
pub struct ClickItem {
    pub created_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl From<Click> for ClickItem {
    fn from(click: Click) -> Self {
        Self {
            created_at: click.created_at,
            ip: click.ip,
            browser: click.browser,
            platform: click.platform,
            referrer: click.referrer,
        }
    }
}

/// Record summary with recent clicks.
#[derive(Debug, Serialize)]
pub struct LinkInfoResponse {
    pub hash: String,
    pub target: String,
    pub safety: Safety,
    pub redirect_status: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sponsor: Option<String>,

    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub clicks: Vec<ClickItem>,
}

impl From<LinkInfo> for LinkInfoResponse {
    fn from(info: LinkInfo) -> Self {
        let record = info.record;
        Self {
            redirect_status: record.mode.status_code(),
            hash: record.hash,
            target: record.target,
            safety: record.safety,
            sponsor: record.sponsor,
            created_at: record.created_at,
            verified_at: record.verified_at,
            clicks: info.clicks.into_iter().map(ClickItem::from).collect(),
        }
    }
}

//! Read-only record summaries with their click history.

use std::sync::Arc;

use serde_json::json;

use crate::domain::entities::{Click, ShortUrl};
use crate::domain::repositories::{ClickRepository, ShortUrlRepository};
use crate::error::AppError;

/// A record together with its most recent clicks.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    pub record: ShortUrl,
    pub clicks: Vec<Click>,
}

/// Service for record metadata lookups.
///
/// Not gated: it reports the safety state instead of enforcing it.
pub struct LinkInfoService {
    short_urls: Arc<dyn ShortUrlRepository>,
    clicks: Arc<dyn ClickRepository>,
    click_limit: i64,
}

impl LinkInfoService {
    pub fn new(
        short_urls: Arc<dyn ShortUrlRepository>,
        clicks: Arc<dyn ClickRepository>,
        click_limit: i64,
    ) -> Self {
        Self {
            short_urls,
            clicks,
            click_limit,
        }
    }

    /// Returns the record for `hash` and up to `click_limit` newest clicks.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown hashes and
    /// [`AppError::Internal`] on storage errors.
    pub async fn get(&self, hash: &str) -> Result<LinkInfo, AppError> {
        let record = self.short_urls.find_by_hash(hash).await?.ok_or_else(|| {
            AppError::not_found("Short URL not found", json!({ "hash": hash }))
        })?;

        let clicks = self.clicks.list_by_hash(hash, self.click_limit).await?;

        Ok(LinkInfo { record, clicks })
    }
}

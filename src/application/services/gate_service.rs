//! Safety gate in front of redirects and QR codes.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::click_event::ClickEvent;
use crate::domain::entities::{Redirection, Safety, ShortUrl};
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;

/// Decides whether a short URL may be served.
///
/// Lookup order is existence first, then safety:
///
/// | State     | Outcome                                   |
/// |-----------|-------------------------------------------|
/// | missing   | [`AppError::NotFound`]                    |
/// | `Unknown` | [`AppError::NotVerified`] with retry-after |
/// | `Unsafe`  | [`AppError::Unsafe`]                      |
/// | `Safe`    | served                                    |
///
/// The gate reads the store on every call and never waits for a verdict;
/// callers are told when to come back instead.
pub struct GateService {
    repository: Arc<dyn ShortUrlRepository>,
    click_sender: mpsc::Sender<ClickEvent>,
    retry_after_secs: u64,
}

impl GateService {
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        click_sender: mpsc::Sender<ClickEvent>,
        retry_after_secs: u64,
    ) -> Self {
        Self {
            repository,
            click_sender,
            retry_after_secs,
        }
    }

    /// Returns the record for `hash` if it is currently safe to serve.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`], [`AppError::NotVerified`] or
    /// [`AppError::Unsafe`] per the gating table, and [`AppError::Internal`]
    /// on storage errors.
    pub async fn check(&self, hash: &str) -> Result<ShortUrl, AppError> {
        let record = self.repository.find_by_hash(hash).await?.ok_or_else(|| {
            metrics::counter!("shortener_gate_rejections_total", "reason" => "not_found")
                .increment(1);
            AppError::not_found("Short URL not found", json!({ "hash": hash }))
        })?;

        match record.safety {
            Safety::Safe => Ok(record),
            Safety::Unknown => {
                debug!(hash, "Gate: verification pending");
                metrics::counter!("shortener_gate_rejections_total", "reason" => "not_verified")
                    .increment(1);
                Err(AppError::not_verified(hash, self.retry_after_secs))
            }
            Safety::Unsafe => {
                debug!(hash, "Gate: target flagged unsafe");
                metrics::counter!("shortener_gate_rejections_total", "reason" => "unsafe")
                    .increment(1);
                Err(AppError::unsafe_target(hash))
            }
        }
    }

    /// Gates a redirect and queues a click record when it passes.
    ///
    /// Click recording is fire-and-forget: when the queue is full the click
    /// is dropped and counted, and the redirect still succeeds.
    ///
    /// # Errors
    ///
    /// See [`Self::check`].
    pub async fn redirect(&self, click: ClickEvent) -> Result<Redirection, AppError> {
        let record = self.check(&click.hash).await?;

        if let Err(e) = self.click_sender.try_send(click) {
            warn!(hash = %record.hash, "Dropping click record: {}", e);
            metrics::counter!("shortener_clicks_dropped_total").increment(1);
        }

        Ok(Redirection {
            target: record.target,
            mode: record.mode,
        })
    }
}

//! QR code retrieval and background prefetch.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::services::GateService;
use crate::domain::entities::Safety;
use crate::domain::repositories::ShortUrlRepository;
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::qr::QrRenderer;
use crate::utils::backoff::doubling_delays;

/// A rendered QR code ready to be served.
#[derive(Debug, Clone)]
pub struct QrImage {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Bounds of the background prefetch poller.
#[derive(Debug, Clone, Copy)]
pub struct PrefetchPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for PrefetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

/// How a prefetch poller ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// The record became safe and its QR code is cached.
    Cached,
    /// The record was flagged unsafe; nothing was cached.
    Unsafe,
    /// The record does not exist.
    Missing,
    /// No verdict arrived within the attempt budget.
    Exhausted,
}

/// Serves QR codes for safe short URLs, memoizing rendered images.
///
/// Every read goes through the [`GateService`] first, cache hits included, so
/// an image is never served for a hash that is not currently `Safe`.
pub struct QrService {
    gate: Arc<GateService>,
    repository: Arc<dyn ShortUrlRepository>,
    cache: Arc<dyn CacheService>,
    renderer: Arc<dyn QrRenderer>,
    base_url: String,
    prefetch: PrefetchPolicy,
}

impl QrService {
    pub fn new(
        gate: Arc<GateService>,
        repository: Arc<dyn ShortUrlRepository>,
        cache: Arc<dyn CacheService>,
        renderer: Arc<dyn QrRenderer>,
        base_url: impl Into<String>,
        prefetch: PrefetchPolicy,
    ) -> Self {
        Self {
            gate,
            repository,
            cache,
            renderer,
            base_url: base_url.into(),
            prefetch,
        }
    }

    /// Public short URL a QR code for `hash` encodes.
    pub fn short_url(&self, hash: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), hash)
    }

    /// Returns the QR code for `hash`, rendering and caching it on a miss.
    ///
    /// # Errors
    ///
    /// Gating errors as in [`GateService::check`]; [`AppError::Internal`] if
    /// rendering fails.
    pub async fn get(&self, hash: &str) -> Result<QrImage, AppError> {
        self.gate.check(hash).await?;

        match self.cache.get_qr(hash).await {
            Ok(Some(bytes)) => {
                debug!(hash, "QR served from cache");
                return Ok(self.image(bytes));
            }
            Ok(None) => {}
            Err(e) => warn!(hash, "QR cache read failed: {}", e),
        }

        let bytes = self.render_and_cache(hash).await?;
        Ok(self.image(bytes))
    }

    /// Starts a detached poller that caches the QR code once `hash` is safe.
    ///
    /// The poller sleeps on a doubling schedule and gives up after
    /// [`PrefetchPolicy::max_attempts`] reads. Its outcome never reaches the
    /// creating client.
    pub fn spawn_prefetch(self: &Arc<Self>, hash: String) -> JoinHandle<PrefetchOutcome> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = service.prefetch(&hash).await;
            debug!(hash = %hash, ?outcome, "QR prefetch finished");
            outcome
        })
    }

    async fn prefetch(&self, hash: &str) -> PrefetchOutcome {
        let policy = self.prefetch;
        for delay in doubling_delays(policy.base_delay, policy.max_delay, policy.max_attempts) {
            tokio::time::sleep(delay).await;

            let record = match self.repository.find_by_hash(hash).await {
                Ok(Some(record)) => record,
                Ok(None) => return PrefetchOutcome::Missing,
                Err(e) => {
                    warn!(hash, "QR prefetch lookup failed: {}", e);
                    continue;
                }
            };

            match record.safety {
                Safety::Unknown => continue,
                Safety::Unsafe => return PrefetchOutcome::Unsafe,
                Safety::Safe => {
                    return match self.render_and_cache(hash).await {
                        Ok(_) => {
                            info!(hash, "QR code prefetched");
                            PrefetchOutcome::Cached
                        }
                        Err(e) => {
                            warn!(hash, "QR prefetch render failed: {}", e);
                            PrefetchOutcome::Exhausted
                        }
                    };
                }
            }
        }

        PrefetchOutcome::Exhausted
    }

    async fn render_and_cache(&self, hash: &str) -> Result<Vec<u8>, AppError> {
        let bytes = self.renderer.render(&self.short_url(hash)).map_err(|e| {
            AppError::internal(
                "Failed to render QR code",
                json!({ "hash": hash, "reason": e.to_string() }),
            )
        })?;

        if let Err(e) = self.cache.set_qr(hash, &bytes, None).await {
            warn!(hash, "QR cache write failed: {}", e);
        }

        Ok(bytes)
    }

    fn image(&self, bytes: Vec<u8>) -> QrImage {
        QrImage {
            bytes,
            content_type: self.renderer.content_type(),
        }
    }
}

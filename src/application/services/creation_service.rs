//! Short URL creation and verification dispatch.

use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::application::services::QrService;
use crate::domain::entities::{NewShortUrl, RedirectMode, Safety, ShortUrl, ShortUrlMetadata};
use crate::domain::repositories::ShortUrlRepository;
use crate::domain::verification_request::VerificationRequest;
use crate::error::AppError;
use crate::infrastructure::messaging::MessageBroker;
use crate::utils::hasher::UrlHasher;
use crate::utils::url_normalizer::UrlValidator;

/// Where the record stands with respect to verification after a create call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// A verification request was published.
    Queued,
    /// Publishing failed; the record stays `Unknown` until it is re-requested.
    Degraded,
    /// The record already carries a verdict; nothing was published.
    Resolved,
}

/// Result of [`CreationService::create`].
#[derive(Debug, Clone)]
pub struct CreatedShortUrl {
    pub record: ShortUrl,
    pub short_url: String,
    pub qr_url: Option<String>,
    pub created: bool,
    pub verification: VerificationStatus,
}

/// Creates short URLs and hands them to the verification pipeline.
///
/// Creation never waits for a verdict: the record is stored as `Unknown`, a
/// [`VerificationRequest`] is published, and the caller gets the record back
/// immediately.
pub struct CreationService {
    repository: Arc<dyn ShortUrlRepository>,
    broker: Arc<dyn MessageBroker>,
    validator: Arc<dyn UrlValidator>,
    hasher: Arc<dyn UrlHasher>,
    qr_service: Arc<QrService>,
    topic: String,
}

impl CreationService {
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        broker: Arc<dyn MessageBroker>,
        validator: Arc<dyn UrlValidator>,
        hasher: Arc<dyn UrlHasher>,
        qr_service: Arc<QrService>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            broker,
            validator,
            hasher,
            qr_service,
            topic: topic.into(),
        }
    }

    /// Creates (or returns the existing) short URL for `url`.
    ///
    /// # Flow
    ///
    /// 1. Validate and normalize; reject before any side effect
    /// 2. Hash the normalized URL
    /// 3. Insert-if-absent with `Unknown` safety
    /// 4. Publish a verification request unless the record is already resolved
    /// 5. Optionally start a QR prefetch poller
    ///
    /// Deduplicated records that are still `Unknown` are re-published, which
    /// unsticks records whose first publish failed.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidUrl`] for unsupported URLs,
    /// [`AppError::HashConflict`] when the derived key is already stored for a
    /// different target, and [`AppError::Internal`] on storage errors. A broker failure is not an
    /// error; it is reported as [`VerificationStatus::Degraded`].
    pub async fn create(
        &self,
        url: &str,
        want_qr: bool,
        metadata: ShortUrlMetadata,
    ) -> Result<CreatedShortUrl, AppError> {
        let target = self
            .validator
            .normalize(url)
            .map_err(|e| AppError::invalid_url(url, e.to_string()))?;

        let hash = self.hasher.hash(&target);
        let mode = if metadata.permanent {
            RedirectMode::Permanent
        } else {
            RedirectMode::Temporary
        };

        let outcome = self
            .repository
            .insert_if_absent(NewShortUrl {
                hash: hash.clone(),
                target: target.clone(),
                mode,
                sponsor: metadata.sponsor,
                ip: metadata.ip,
            })
            .await?;

        let record = outcome.record;
        if record.target != target {
            metrics::counter!("shortener_hash_conflicts_total").increment(1);
            warn!(hash = %hash, "Short key already belongs to another target");
            return Err(AppError::hash_conflict(&hash, &target));
        }
        if outcome.created {
            metrics::counter!("shortener_links_created_total").increment(1);
            info!(hash = %record.hash, target = %record.target, "Short URL created");
        }

        let verification = if record.safety == Safety::Unknown {
            self.publish(&record).await
        } else {
            VerificationStatus::Resolved
        };

        let qr_url = if want_qr {
            if record.safety != Safety::Unsafe {
                self.qr_service.spawn_prefetch(record.hash.clone());
            }
            Some(format!("{}/qr", self.qr_service.short_url(&record.hash)))
        } else {
            None
        };

        Ok(CreatedShortUrl {
            short_url: self.qr_service.short_url(&record.hash),
            qr_url,
            created: outcome.created,
            verification,
            record,
        })
    }

    /// Publishes a fresh verification request for an existing record.
    ///
    /// The record keeps its current safety until the new verdict is written.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] for unknown hashes and
    /// [`AppError::Internal`] when the request cannot be published.
    pub async fn request_verification(&self, hash: &str) -> Result<ShortUrl, AppError> {
        let record = self.repository.find_by_hash(hash).await?.ok_or_else(|| {
            AppError::not_found("Short URL not found", json!({ "hash": hash }))
        })?;

        match self.publish(&record).await {
            VerificationStatus::Queued => Ok(record),
            _ => Err(AppError::internal(
                "Failed to publish verification request",
                json!({ "hash": hash, "topic": self.topic }),
            )),
        }
    }

    async fn publish(&self, record: &ShortUrl) -> VerificationStatus {
        let request = VerificationRequest::new(&record.target, &record.hash);

        match self.broker.publish(&self.topic, &request.encode()).await {
            Ok(()) => VerificationStatus::Queued,
            Err(e) => {
                metrics::counter!("shortener_publish_failures_total").increment(1);
                warn!(
                    hash = %record.hash,
                    topic = %self.topic,
                    "Verification request not published: {}", e
                );
                VerificationStatus::Degraded
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{GateService, PrefetchPolicy};
    use crate::domain::entities::Verdict;
    use crate::domain::repositories::{InsertOutcome, MockShortUrlRepository};
    use crate::infrastructure::cache::MemoryCache;
    use crate::infrastructure::messaging::{BrokerError, BrokerResult, Delivery, MemoryBroker};
    use crate::infrastructure::persistence::MemoryShortUrlRepository;
    use crate::infrastructure::qr::SvgQrRenderer;
    use crate::utils::hasher::Sha256Hasher;
    use crate::utils::url_normalizer::HttpUrlValidator;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const TOPIC: &str = "safe";

    struct FailingBroker;

    #[async_trait]
    impl MessageBroker for FailingBroker {
        async fn publish(&self, _topic: &str, _payload: &str) -> BrokerResult<()> {
            Err(BrokerError::Connection("broker down".to_string()))
        }
        async fn receive(&self, _topic: &str) -> BrokerResult<Option<Delivery>> {
            Ok(None)
        }
        async fn ack(&self, _delivery: &Delivery) -> BrokerResult<()> {
            Ok(())
        }
        async fn dead_letter(&self, _delivery: &Delivery) -> BrokerResult<()> {
            Ok(())
        }
        async fn dead_letters(&self, _topic: &str) -> BrokerResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn take_dead_letters(&self, _topic: &str) -> BrokerResult<Vec<String>> {
            Ok(Vec::new())
        }
        async fn recover_in_flight(&self, _topic: &str) -> BrokerResult<usize> {
            Ok(0)
        }
        async fn health_check(&self) -> bool {
            false
        }
    }

    fn service_with(
        repository: Arc<dyn ShortUrlRepository>,
        broker: Arc<dyn MessageBroker>,
    ) -> CreationService {
        let (tx, _rx) = mpsc::channel(16);
        let gate = Arc::new(GateService::new(repository.clone(), tx, 5));
        let qr = Arc::new(QrService::new(
            gate,
            repository.clone(),
            Arc::new(MemoryCache::new(60)),
            Arc::new(SvgQrRenderer::default()),
            "http://localhost:3000",
            PrefetchPolicy {
                max_attempts: 1,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            },
        ));
        CreationService::new(
            repository,
            broker,
            Arc::new(HttpUrlValidator),
            Arc::new(Sha256Hasher),
            qr,
            TOPIC,
        )
    }

    fn memory_broker() -> Arc<MemoryBroker> {
        Arc::new(MemoryBroker::new(Duration::from_millis(5)))
    }

    #[tokio::test]
    async fn test_create_stores_unknown_and_publishes() {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        let broker = memory_broker();
        let service = service_with(repo.clone(), broker.clone());

        let created = service
            .create("http://example.com/", false, ShortUrlMetadata::default())
            .await
            .unwrap();

        assert!(created.created);
        assert_eq!(created.record.hash, "2a1b4024");
        assert_eq!(created.record.safety, Safety::Unknown);
        assert_eq!(created.verification, VerificationStatus::Queued);
        assert_eq!(created.short_url, "http://localhost:3000/2a1b4024");
        assert!(created.qr_url.is_none());

        let delivery = broker.receive(TOPIC).await.unwrap().unwrap();
        let request = VerificationRequest::decode(&delivery.payload).unwrap();
        assert_eq!(request.hash, "2a1b4024");
        assert_eq!(request.target, "http://example.com/");
        assert_eq!(request.attempt, 0);
    }

    #[tokio::test]
    async fn test_invalid_url_has_no_side_effects() {
        let mut repo = MockShortUrlRepository::new();
        repo.expect_insert_if_absent().times(0);
        let broker = memory_broker();
        let service = service_with(Arc::new(repo), broker.clone());

        let err = service
            .create("ftp://example.com/file", true, ShortUrlMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidUrl { .. }));
        assert_eq!(broker.ready_len(TOPIC).await, 0);
    }

    #[tokio::test]
    async fn test_publish_failure_is_degraded_not_error() {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        let service = service_with(repo.clone(), Arc::new(FailingBroker));

        let created = service
            .create("http://example.com/", false, ShortUrlMetadata::default())
            .await
            .unwrap();

        assert_eq!(created.verification, VerificationStatus::Degraded);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_keeps_verdict_and_skips_publish() {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        let broker = memory_broker();
        let service = service_with(repo.clone(), broker.clone());

        service
            .create("http://example.com/", false, ShortUrlMetadata::default())
            .await
            .unwrap();
        let delivery = broker.receive(TOPIC).await.unwrap().unwrap();
        broker.ack(&delivery).await.unwrap();
        repo.update_safety("2a1b4024", Verdict::Safe).await.unwrap();

        let again = service
            .create("http://example.com", false, ShortUrlMetadata::default())
            .await
            .unwrap();

        assert!(!again.created);
        assert_eq!(again.record.safety, Safety::Safe);
        assert_eq!(again.verification, VerificationStatus::Resolved);
        assert_eq!(broker.ready_len(TOPIC).await, 0);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_of_pending_record_republishes() {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        let broker = memory_broker();
        let service = service_with(repo, broker.clone());

        for _ in 0..2 {
            service
                .create("http://example.com/", false, ShortUrlMetadata::default())
                .await
                .unwrap();
        }

        assert_eq!(broker.ready_len(TOPIC).await, 2);
    }

    #[tokio::test]
    async fn test_metadata_is_stored() {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        let service = service_with(repo, memory_broker());

        let created = service
            .create(
                "https://example.com/promo",
                true,
                ShortUrlMetadata {
                    sponsor: Some("acme".to_string()),
                    ip: Some("10.0.0.1".to_string()),
                    permanent: true,
                },
            )
            .await
            .unwrap();

        assert_eq!(created.record.mode, RedirectMode::Permanent);
        assert_eq!(created.record.sponsor.as_deref(), Some("acme"));
        assert_eq!(created.record.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(
            created.qr_url.as_deref(),
            Some(format!("http://localhost:3000/{}/qr", created.record.hash).as_str())
        );
    }

    #[tokio::test]
    async fn test_storage_error_propagates() {
        let mut repo = MockShortUrlRepository::new();
        repo.expect_insert_if_absent()
            .times(1)
            .returning(|_| Err(AppError::internal("db down", json!({}))));
        let broker = memory_broker();
        let service = service_with(Arc::new(repo), broker.clone());

        let err = service
            .create("http://example.com/", false, ShortUrlMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Internal { .. }));
        assert_eq!(broker.ready_len(TOPIC).await, 0);
    }

    #[tokio::test]
    async fn test_request_verification_keeps_state() {
        let mut repo = MockShortUrlRepository::new();
        repo.expect_find_by_hash().returning(|hash| {
            let mut record = ShortUrl::pending(
                NewShortUrl {
                    hash: hash.to_string(),
                    target: "http://example.com/".to_string(),
                    mode: RedirectMode::Temporary,
                    sponsor: None,
                    ip: None,
                },
                Utc::now(),
            );
            record.safety = Safety::Unsafe;
            Ok(Some(record))
        });
        repo.expect_update_safety().times(0);
        let broker = memory_broker();
        let service = service_with(Arc::new(repo), broker.clone());

        let record = service.request_verification("2a1b4024").await.unwrap();

        assert_eq!(record.safety, Safety::Unsafe);
        assert_eq!(broker.ready_len(TOPIC).await, 1);
    }

    #[tokio::test]
    async fn test_request_verification_unknown_hash() {
        let mut repo = MockShortUrlRepository::new();
        repo.expect_find_by_hash().returning(|_| Ok(None));
        let service = service_with(Arc::new(repo), memory_broker());

        let err = service.request_verification("missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    /// Maps every URL to the same key.
    struct ConstantHasher;

    impl UrlHasher for ConstantHasher {
        fn hash(&self, _url: &str) -> String {
            "0badc0de".to_string()
        }
    }

    #[tokio::test]
    async fn test_colliding_key_is_rejected() {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        let broker = memory_broker();
        let base = service_with(repo.clone(), broker.clone());
        let service = CreationService {
            hasher: Arc::new(ConstantHasher),
            ..base
        };

        let first = service
            .create("http://collide.test/48435", false, ShortUrlMetadata::default())
            .await
            .unwrap();
        repo.update_safety(&first.record.hash, Verdict::Safe)
            .await
            .unwrap();

        let err = service
            .create("http://collide.test/163457", false, ShortUrlMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::HashConflict { .. }));
        assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);
        assert_eq!(repo.len(), 1);
        let stored = repo.find_by_hash("0badc0de").await.unwrap().unwrap();
        assert_eq!(stored.target, "http://collide.test/48435");
        assert_eq!(stored.safety, Safety::Safe);
        assert_eq!(broker.ready_len(TOPIC).await, 1);
    }

    #[tokio::test]
    async fn test_insert_outcome_from_mock() {
        let mut repo = MockShortUrlRepository::new();
        repo.expect_insert_if_absent().times(1).returning(|new| {
            Ok(InsertOutcome {
                record: ShortUrl::pending(new, Utc::now()),
                created: true,
            })
        });
        let service = service_with(Arc::new(repo), Arc::new(FailingBroker));

        let created = service
            .create("HTTP://Example.COM", false, ShortUrlMetadata::default())
            .await
            .unwrap();

        assert_eq!(created.record.target, "http://example.com/");
        assert_eq!(created.verification, VerificationStatus::Degraded);
    }
}

//! Consumer side of the verification pipeline.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, error, info, warn};

use crate::domain::entities::Verdict;
use crate::domain::repositories::ShortUrlRepository;
use crate::domain::verification_request::{DecodeError, VerificationRequest};
use crate::error::AppError;
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::messaging::{BrokerError, Delivery, MessageBroker};
use crate::infrastructure::safety::{SafetyCheckError, SafetyChecker};
use crate::utils::backoff::delay_for_attempt;

/// Why a verification attempt did not produce a verdict.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("undecodable request: {0}")]
    Decode(#[from] DecodeError),

    #[error("no record for hash {0}")]
    RecordMissing(String),

    /// The message names a target other than the one stored under its hash.
    #[error("request target does not match the record stored under {hash}")]
    TargetMismatch { hash: String },

    #[error(transparent)]
    Check(#[from] SafetyCheckError),

    #[error("store error: {0}")]
    Store(#[from] AppError),
}

/// Retry and timeout bounds of the worker.
#[derive(Debug, Clone, Copy)]
pub struct VerificationPolicy {
    /// Deliveries of one request before it is dead-lettered.
    pub max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Upper bound of a single reputation call.
    pub check_timeout: Duration,
    /// Extra in-process tries of the reputation call within one delivery.
    pub check_retries: usize,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            check_timeout: Duration::from_secs(5),
            check_retries: 2,
        }
    }
}

/// What happened to a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Verified(Verdict),
    /// Re-published as delivery number `attempt` (zero-based).
    Retried { attempt: u32 },
    DeadLettered,
}

/// Consumes verification requests and records verdicts.
///
/// Each consumer loop handles one delivery at a time; several loops may run on
/// the same topic. Processing is idempotent, so duplicate or concurrent
/// deliveries for one hash converge on the same record state.
///
/// Failures never write a verdict. They are retried by re-publishing the
/// request with an incremented attempt counter after a doubling delay; once
/// the attempt budget is spent the delivery goes to the dead letter list.
/// Payloads that cannot be decoded, that already carry an exhausted attempt
/// counter, or whose target disagrees with the stored record are
/// dead-lettered immediately.
///
/// The verdict is always computed from the stored target, never from the
/// target carried by the message.
pub struct VerificationWorker {
    repository: Arc<dyn ShortUrlRepository>,
    checker: Arc<dyn SafetyChecker>,
    broker: Arc<dyn MessageBroker>,
    cache: Arc<dyn CacheService>,
    topic: String,
    policy: VerificationPolicy,
    /// Delayed re-publishes; the delivery stays in flight until one completes.
    retries: Mutex<JoinSet<()>>,
}

impl VerificationWorker {
    pub fn new(
        repository: Arc<dyn ShortUrlRepository>,
        checker: Arc<dyn SafetyChecker>,
        broker: Arc<dyn MessageBroker>,
        cache: Arc<dyn CacheService>,
        topic: impl Into<String>,
        policy: VerificationPolicy,
    ) -> Self {
        Self {
            repository,
            checker,
            broker,
            cache,
            topic: topic.into(),
            policy,
            retries: Mutex::new(JoinSet::new()),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Checks one request and writes the verdict.
    ///
    /// # Errors
    ///
    /// - [`VerificationError::RecordMissing`] if the record does not exist (yet)
    /// - [`VerificationError::TargetMismatch`] if the stored target differs
    /// - [`VerificationError::Check`] if the reputation call failed or timed out
    /// - [`VerificationError::Store`] on storage errors
    pub async fn handle(&self, request: &VerificationRequest) -> Result<Verdict, VerificationError> {
        let hash = request.hash.as_str();

        let record = self
            .repository
            .find_by_hash(hash)
            .await?
            .ok_or_else(|| VerificationError::RecordMissing(hash.to_string()))?;

        if record.target != request.target {
            return Err(VerificationError::TargetMismatch {
                hash: hash.to_string(),
            });
        }

        let verdict = Verdict::from_is_safe(self.check(&record.target).await?);

        if !self.repository.update_safety(hash, verdict).await? {
            return Err(VerificationError::RecordMissing(hash.to_string()));
        }

        if verdict == Verdict::Unsafe
            && let Err(e) = self.cache.invalidate(hash).await
        {
            warn!(hash, "Failed to invalidate QR cache: {}", e);
        }

        metrics::counter!("shortener_verifications_total", "verdict" => verdict.as_str())
            .increment(1);
        info!(hash, verdict = verdict.as_str(), "Verification recorded");

        Ok(verdict)
    }

    /// Reputation call bounded by the check timeout and retried with jitter.
    async fn check(&self, target: &str) -> Result<bool, SafetyCheckError> {
        let strategy = ExponentialBackoff::from_millis(10)
            .factor(5)
            .max_delay(Duration::from_secs(1))
            .map(jitter)
            .take(self.policy.check_retries);

        Retry::spawn(strategy, || self.check_once(target)).await
    }

    async fn check_once(&self, target: &str) -> Result<bool, SafetyCheckError> {
        let timeout = self.policy.check_timeout;
        match tokio::time::timeout(timeout, self.checker.is_safe(target)).await {
            Ok(result) => result,
            Err(_) => Err(SafetyCheckError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Processes one delivery: ack, schedule a retry or dead letter.
    ///
    /// A retry is scheduled in the background: after the backoff delay the
    /// follow-up request is published and only then the original is
    /// acknowledged, so a crash in between duplicates the request instead of
    /// losing it. The consumer is free to take the next delivery meanwhile.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError`] when the broker itself fails; the delivery is
    /// then left in flight for recovery.
    pub async fn process(&self, delivery: Delivery) -> Result<ProcessOutcome, BrokerError> {
        let request = match VerificationRequest::decode(&delivery.payload) {
            Ok(request) => request,
            Err(e) => {
                warn!(topic = %delivery.topic, "Dead-lettering undecodable payload: {}", e);
                return self.dead_letter(&delivery).await;
            }
        };

        if request.attempt >= self.policy.max_attempts {
            warn!(
                hash = %request.hash,
                attempt = request.attempt,
                "Dead-lettering request past its attempt budget"
            );
            return self.dead_letter(&delivery).await;
        }

        match self.handle(&request).await {
            Ok(verdict) => {
                self.broker.ack(&delivery).await?;
                Ok(ProcessOutcome::Verified(verdict))
            }
            Err(e @ VerificationError::TargetMismatch { .. }) => {
                warn!(topic = %delivery.topic, "Dead-lettering request: {}", e);
                self.dead_letter(&delivery).await
            }
            Err(e) => self.retry_or_dead_letter(delivery, &request, e).await,
        }
    }

    async fn retry_or_dead_letter(
        &self,
        delivery: Delivery,
        request: &VerificationRequest,
        cause: VerificationError,
    ) -> Result<ProcessOutcome, BrokerError> {
        let next = request.next_attempt();
        if next.attempt >= self.policy.max_attempts {
            error!(
                hash = %request.hash,
                attempts = next.attempt,
                "Verification failed permanently: {}", cause
            );
            return self.dead_letter(&delivery).await;
        }

        let delay = delay_for_attempt(
            self.policy.retry_base_delay,
            self.policy.retry_max_delay,
            request.attempt,
        );
        warn!(
            hash = %request.hash,
            attempt = request.attempt,
            delay_ms = delay.as_millis() as u64,
            "Verification failed, retrying: {}", cause
        );

        let attempt = next.attempt;
        let broker = Arc::clone(&self.broker);
        let mut retries = self.retries.lock().await;
        while retries.try_join_next().is_some() {}
        retries.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = republish(broker.as_ref(), &delivery, &next).await {
                // left in flight; recovered on the next start
                error!(hash = %next.hash, "Failed to re-publish verification request: {}", e);
            }
        });

        Ok(ProcessOutcome::Retried { attempt })
    }

    /// Waits until every scheduled retry has been published.
    pub async fn wait_for_retries(&self) {
        let mut retries = std::mem::take(&mut *self.retries.lock().await);
        while retries.join_next().await.is_some() {}
    }

    async fn dead_letter(&self, delivery: &Delivery) -> Result<ProcessOutcome, BrokerError> {
        self.broker.dead_letter(delivery).await?;
        metrics::counter!("shortener_verification_dead_letters_total").increment(1);
        Ok(ProcessOutcome::DeadLettered)
    }

    /// Consumer loop; returns once `shutdown` flips to `true` or its sender drops.
    pub async fn run(self: Arc<Self>, consumer: usize, mut shutdown: watch::Receiver<bool>) {
        info!(consumer, topic = %self.topic, "Verification consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let received = tokio::select! {
                _ = shutdown.changed() => break,
                received = self.broker.receive(&self.topic) => received,
            };

            let delivery = match received {
                Ok(Some(delivery)) => delivery,
                Ok(None) => continue,
                Err(e) => {
                    error!(consumer, "Broker receive failed: {}", e);
                    tokio::time::sleep(self.policy.retry_base_delay).await;
                    continue;
                }
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                outcome = self.process(delivery) => match outcome {
                    Ok(outcome) => debug!(consumer, ?outcome, "Delivery processed"),
                    Err(e) => error!(consumer, "Broker error while settling delivery: {}", e),
                },
            }
        }

        // pending retries keep their deliveries in flight for recovery
        self.retries.lock().await.abort_all();
        info!(consumer, "Verification consumer stopped");
    }

    /// Starts `consumers` loops on the worker's topic.
    ///
    /// A delivery interrupted by shutdown, including one waiting for its
    /// retry delay, stays in flight and is recovered on the next start.
    pub fn spawn(
        self: &Arc<Self>,
        consumers: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        (0..consumers)
            .map(|consumer| tokio::spawn(Arc::clone(self).run(consumer, shutdown.clone())))
            .collect()
    }
}

async fn republish(
    broker: &dyn MessageBroker,
    delivery: &Delivery,
    next: &VerificationRequest,
) -> Result<(), BrokerError> {
    broker.publish(&delivery.topic, &next.encode()).await?;
    broker.ack(delivery).await?;
    metrics::counter!("shortener_verification_retries_total").increment(1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{NewShortUrl, RedirectMode, Safety};
    use crate::infrastructure::cache::MemoryCache;
    use crate::infrastructure::messaging::MemoryBroker;
    use crate::infrastructure::persistence::MemoryShortUrlRepository;
    use crate::infrastructure::safety::MockSafetyChecker;

    const TOPIC: &str = "safe";
    const HASH: &str = "2a1b4024";
    const TARGET: &str = "http://example.com/";

    struct Fixture {
        repo: Arc<MemoryShortUrlRepository>,
        broker: Arc<MemoryBroker>,
        cache: Arc<MemoryCache>,
        worker: Arc<VerificationWorker>,
    }

    fn policy() -> VerificationPolicy {
        VerificationPolicy {
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(4),
            check_timeout: Duration::from_millis(50),
            check_retries: 0,
        }
    }

    fn fixture(checker: MockSafetyChecker, policy: VerificationPolicy) -> Fixture {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        let broker = Arc::new(MemoryBroker::new(Duration::from_millis(5)));
        let cache = Arc::new(MemoryCache::new(60));
        let worker = Arc::new(VerificationWorker::new(
            repo.clone(),
            Arc::new(checker),
            broker.clone(),
            cache.clone(),
            TOPIC,
            policy,
        ));
        Fixture {
            repo,
            broker,
            cache,
            worker,
        }
    }

    fn checker_returning(safe: bool) -> MockSafetyChecker {
        let mut checker = MockSafetyChecker::new();
        checker.expect_is_safe().returning(move |_| Ok(safe));
        checker
    }

    async fn insert(repo: &MemoryShortUrlRepository) {
        repo.insert_if_absent(NewShortUrl {
            hash: HASH.to_string(),
            target: TARGET.to_string(),
            mode: RedirectMode::Temporary,
            sponsor: None,
            ip: None,
        })
        .await
        .unwrap();
    }

    async fn deliver(f: &Fixture, payload: &str) -> Delivery {
        f.broker.publish(TOPIC, payload).await.unwrap();
        f.broker.receive(TOPIC).await.unwrap().unwrap()
    }

    fn request(attempt: u32) -> String {
        VerificationRequest {
            target: TARGET.to_string(),
            hash: HASH.to_string(),
            attempt,
        }
        .encode()
    }

    #[tokio::test]
    async fn test_safe_verdict_is_written_and_acked() {
        let f = fixture(checker_returning(true), policy());
        insert(&f.repo).await;

        let delivery = deliver(&f, &request(0)).await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Verified(Verdict::Safe));
        let record = f.repo.find_by_hash(HASH).await.unwrap().unwrap();
        assert_eq!(record.safety, Safety::Safe);
        assert_eq!(f.broker.in_flight_len(TOPIC).await, 0);
    }

    #[tokio::test]
    async fn test_unsafe_verdict_invalidates_qr_cache() {
        let f = fixture(checker_returning(false), policy());
        insert(&f.repo).await;
        f.cache.set_qr(HASH, b"<svg/>", None).await.unwrap();

        let delivery = deliver(&f, &request(0)).await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Verified(Verdict::Unsafe));
        assert!(!f.cache.contains(HASH));
    }

    #[tokio::test]
    async fn test_text_payload_is_accepted() {
        let f = fixture(checker_returning(true), policy());
        insert(&f.repo).await;

        let delivery = deliver(&f, &format!("{}::{}", TARGET, HASH)).await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Verified(Verdict::Safe));
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_dead_lettered() {
        let mut checker = MockSafetyChecker::new();
        checker.expect_is_safe().times(0);
        let f = fixture(checker, policy());

        let delivery = deliver(&f, "garbage without separator").await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        assert_eq!(
            f.broker.dead_letters(TOPIC).await.unwrap(),
            vec!["garbage without separator"]
        );
    }

    #[tokio::test]
    async fn test_missing_record_is_retried() {
        let mut checker = MockSafetyChecker::new();
        checker.expect_is_safe().times(0);
        let f = fixture(checker, policy());

        let delivery = deliver(&f, &request(0)).await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Retried { attempt: 1 });
        f.worker.wait_for_retries().await;
        assert_eq!(f.broker.in_flight_len(TOPIC).await, 0);

        let retried = f.broker.receive(TOPIC).await.unwrap().unwrap();
        assert_eq!(
            VerificationRequest::decode(&retried.payload).unwrap().attempt,
            1
        );
    }

    #[tokio::test]
    async fn test_check_failure_never_writes_verdict() {
        let mut checker = MockSafetyChecker::new();
        checker
            .expect_is_safe()
            .returning(|_| Err(SafetyCheckError::Api { status: 503 }));
        let f = fixture(checker, policy());
        insert(&f.repo).await;

        let delivery = deliver(&f, &request(0)).await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Retried { attempt: 1 });
        let record = f.repo.find_by_hash(HASH).await.unwrap().unwrap();
        assert_eq!(record.safety, Safety::Unknown);
    }

    /// Never answers within any reasonable timeout.
    struct HangingChecker;

    #[async_trait::async_trait]
    impl SafetyChecker for HangingChecker {
        async fn is_safe(&self, _url: &str) -> Result<bool, SafetyCheckError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_check_timeout_is_retried_without_verdict() {
        let repo = Arc::new(MemoryShortUrlRepository::new());
        let broker = Arc::new(MemoryBroker::new(Duration::from_millis(5)));
        let worker = VerificationWorker::new(
            repo.clone(),
            Arc::new(HangingChecker),
            broker.clone(),
            Arc::new(MemoryCache::new(60)),
            TOPIC,
            VerificationPolicy {
                check_timeout: Duration::from_millis(30),
                ..policy()
            },
        );
        insert(&repo).await;
        broker.publish(TOPIC, &request(0)).await.unwrap();
        let delivery = broker.receive(TOPIC).await.unwrap().unwrap();

        let outcome = worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Retried { attempt: 1 });
        let record = repo.find_by_hash(HASH).await.unwrap().unwrap();
        assert_eq!(record.safety, Safety::Unknown);
        assert!(matches!(
            worker.handle(&VerificationRequest::new(TARGET, HASH)).await,
            Err(VerificationError::Check(SafetyCheckError::Timeout(30)))
        ));
    }

    #[tokio::test]
    async fn test_target_mismatch_is_dead_lettered_without_check() {
        let mut checker = MockSafetyChecker::new();
        checker.expect_is_safe().times(0);
        let f = fixture(checker, policy());
        insert(&f.repo).await;

        let forged = VerificationRequest::new("http://benign.example/", HASH).encode_text();
        let delivery = deliver(&f, &forged).await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        let record = f.repo.find_by_hash(HASH).await.unwrap().unwrap();
        assert_eq!(record.safety, Safety::Unknown);
        assert_eq!(f.broker.dead_letters(TOPIC).await.unwrap(), vec![forged]);
    }

    #[tokio::test]
    async fn test_verdict_uses_stored_target() {
        let mut checker = MockSafetyChecker::new();
        checker
            .expect_is_safe()
            .withf(|url| url == TARGET)
            .times(1)
            .returning(|_| Ok(false));
        let f = fixture(checker, policy());
        insert(&f.repo).await;

        let verdict = f.worker.handle(&VerificationRequest::new(TARGET, HASH)).await;
        assert_eq!(verdict.unwrap(), Verdict::Unsafe);
    }

    #[tokio::test]
    async fn test_attempt_counter_at_max_is_dead_lettered() {
        let mut checker = MockSafetyChecker::new();
        checker.expect_is_safe().times(0);
        let f = fixture(checker, policy());
        insert(&f.repo).await;

        let payload = VerificationRequest {
            target: TARGET.to_string(),
            hash: HASH.to_string(),
            attempt: u32::MAX,
        }
        .encode();
        let delivery = deliver(&f, &payload).await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        assert_eq!(f.broker.ready_len(TOPIC).await, 0);
        assert_eq!(f.broker.dead_letters(TOPIC).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_delay_does_not_block_consumer() {
        let mut checker = MockSafetyChecker::new();
        checker
            .expect_is_safe()
            .returning(|_| Err(SafetyCheckError::Api { status: 503 }));
        let f = fixture(
            checker,
            VerificationPolicy {
                retry_base_delay: Duration::from_secs(2),
                retry_max_delay: Duration::from_secs(2),
                ..policy()
            },
        );
        insert(&f.repo).await;

        let delivery = deliver(&f, &request(0)).await;
        let started = tokio::time::Instant::now();
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::Retried { attempt: 1 });
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(f.broker.ready_len(TOPIC).await, 0);
        assert_eq!(f.broker.in_flight_len(TOPIC).await, 1);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_are_dead_lettered() {
        let mut checker = MockSafetyChecker::new();
        checker
            .expect_is_safe()
            .returning(|_| Err(SafetyCheckError::Transport("refused".to_string())));
        let f = fixture(checker, policy());
        insert(&f.repo).await;

        let delivery = deliver(&f, &request(2)).await;
        let outcome = f.worker.process(delivery).await.unwrap();

        assert_eq!(outcome, ProcessOutcome::DeadLettered);
        assert_eq!(f.broker.ready_len(TOPIC).await, 0);
        assert_eq!(f.broker.dead_letters(TOPIC).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_in_process_retry_recovers_transient_failure() {
        let mut checker = MockSafetyChecker::new();
        let mut seq = mockall::Sequence::new();
        checker
            .expect_is_safe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(SafetyCheckError::Transport("reset".to_string())));
        checker
            .expect_is_safe()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(true));
        let f = fixture(
            checker,
            VerificationPolicy {
                check_retries: 2,
                ..policy()
            },
        );
        insert(&f.repo).await;

        let verdict = f.worker.handle(&VerificationRequest::new(TARGET, HASH)).await;
        assert_eq!(verdict.unwrap(), Verdict::Safe);
    }

    #[tokio::test]
    async fn test_duplicate_delivery_is_idempotent() {
        let f = fixture(checker_returning(true), policy());
        insert(&f.repo).await;

        for _ in 0..2 {
            let delivery = deliver(&f, &request(0)).await;
            f.worker.process(delivery).await.unwrap();
        }

        let record = f.repo.find_by_hash(HASH).await.unwrap().unwrap();
        assert_eq!(record.safety, Safety::Safe);
        assert_eq!(f.repo.len(), 1);
    }

    #[tokio::test]
    async fn test_run_loop_consumes_until_shutdown() {
        let f = fixture(checker_returning(true), policy());
        insert(&f.repo).await;
        f.broker.publish(TOPIC, &request(0)).await.unwrap();

        let (tx, rx) = watch::channel(false);
        let handles = f.worker.spawn(2, rx);

        for _ in 0..100 {
            let record = f.repo.find_by_hash(HASH).await.unwrap().unwrap();
            if record.safety == Safety::Safe {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        let record = f.repo.find_by_hash(HASH).await.unwrap().unwrap();
        assert_eq!(record.safety, Safety::Safe);
    }
}

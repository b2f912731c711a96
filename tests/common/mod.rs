#![allow(dead_code)]

use axum::{Router, extract::ConnectInfo};
use axum_test::TestServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tower::Layer;
use verified_shortener::application::services::PrefetchPolicy;
use verified_shortener::domain::click_event::ClickEvent;
use verified_shortener::domain::entities::{NewShortUrl, RedirectMode, ShortUrl, Verdict};
use verified_shortener::domain::repositories::ShortUrlRepository;
use verified_shortener::domain::verification_worker::{VerificationPolicy, VerificationWorker};
use verified_shortener::infrastructure::cache::MemoryCache;
use verified_shortener::infrastructure::messaging::MemoryBroker;
use verified_shortener::infrastructure::persistence::{
    MemoryClickRepository, MemoryShortUrlRepository,
};
use verified_shortener::infrastructure::safety::SafetyChecker;
use verified_shortener::routes;
use verified_shortener::state::{AppState, ServiceSettings};

pub const TOPIC: &str = "safe";
pub const BASE_URL: &str = "http://sho.rt";
pub const RETRY_AFTER_SECS: u64 = 5;

/// Application state on in-memory backends, with handles to inspect them.
pub struct TestApp {
    pub state: AppState,
    pub short_urls: Arc<MemoryShortUrlRepository>,
    pub clicks: Arc<MemoryClickRepository>,
    pub broker: Arc<MemoryBroker>,
    pub cache: Arc<MemoryCache>,
    pub click_rx: mpsc::Receiver<ClickEvent>,
}

pub fn create_test_app() -> TestApp {
    let short_urls = Arc::new(MemoryShortUrlRepository::new());
    let clicks = Arc::new(MemoryClickRepository::new());
    let broker = Arc::new(MemoryBroker::new(Duration::from_millis(20)));
    let cache = Arc::new(MemoryCache::new(3600));
    let (tx, rx) = mpsc::channel(100);

    let settings = ServiceSettings {
        base_url: BASE_URL.to_string(),
        verification_topic: TOPIC.to_string(),
        retry_after_secs: RETRY_AFTER_SECS,
        prefetch: PrefetchPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
    };

    let state = AppState::new(
        short_urls.clone(),
        clicks.clone(),
        broker.clone(),
        cache.clone(),
        tx,
        settings,
    );

    TestApp {
        state,
        short_urls,
        clicks,
        broker,
        cache,
        click_rx: rx,
    }
}

/// Full application router behind a fixed peer address.
pub fn test_server(state: AppState) -> TestServer {
    let app: Router = routes::router(state, false).layer(MockConnectInfoLayer);
    TestServer::new(app).unwrap()
}

/// Worker on the test app's backends with millisecond retry delays.
pub fn create_worker(app: &TestApp, checker: Arc<dyn SafetyChecker>) -> VerificationWorker {
    VerificationWorker::new(
        app.short_urls.clone(),
        checker,
        app.broker.clone(),
        app.cache.clone(),
        TOPIC,
        VerificationPolicy {
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(5),
            check_timeout: Duration::from_millis(200),
            check_retries: 0,
        },
    )
}

pub async fn create_record(
    repo: &MemoryShortUrlRepository,
    hash: &str,
    target: &str,
    mode: RedirectMode,
) -> ShortUrl {
    repo.insert_if_absent(NewShortUrl {
        hash: hash.to_string(),
        target: target.to_string(),
        mode,
        sponsor: None,
        ip: None,
    })
    .await
    .unwrap()
    .record
}

pub async fn create_verified_record(
    repo: &MemoryShortUrlRepository,
    hash: &str,
    target: &str,
    verdict: Verdict,
) {
    create_record(repo, hash, target, RedirectMode::Temporary).await;
    assert!(repo.update_safety(hash, verdict).await.unwrap());
}

#[derive(Clone)]
pub struct MockConnectInfoLayer;

impl<S> Layer<S> for MockConnectInfoLayer {
    type Service = MockConnectInfoService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MockConnectInfoService { inner }
    }
}

#[derive(Clone)]
pub struct MockConnectInfoService<S> {
    inner: S,
}

impl<S, B> tower::Service<axum::http::Request<B>> for MockConnectInfoService<S>
where
    S: tower::Service<axum::http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = S::Future;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let addr: SocketAddr = "127.0.0.1:12345".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        self.inner.call(req)
    }
}

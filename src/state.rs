//! Shared application state injected into handlers.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::application::services::{
    CreationService, GateService, LinkInfoService, PrefetchPolicy, QrService,
};
use crate::config::Config;
use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::{ClickRepository, ShortUrlRepository};
use crate::infrastructure::cache::CacheService;
use crate::infrastructure::messaging::MessageBroker;
use crate::infrastructure::qr::SvgQrRenderer;
use crate::utils::hasher::Sha256Hasher;
use crate::utils::url_normalizer::HttpUrlValidator;

/// Clicks returned by the link info endpoint.
const CLICK_HISTORY_LIMIT: i64 = 50;

/// Settings the services need beyond their backends.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub base_url: String,
    pub verification_topic: String,
    pub retry_after_secs: u64,
    pub prefetch: PrefetchPolicy,
}

impl From<&Config> for ServiceSettings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            verification_topic: config.verification_topic.clone(),
            retry_after_secs: config.not_verified_retry_after_secs,
            prefetch: config.prefetch_policy(),
        }
    }
}

/// Application state shared across all request handlers.
///
/// Cloned per request; every field is an `Arc` or a channel handle.
#[derive(Clone)]
pub struct AppState {
    pub creation_service: Arc<CreationService>,
    pub gate_service: Arc<GateService>,
    pub qr_service: Arc<QrService>,
    pub link_info_service: Arc<LinkInfoService>,
    pub short_urls: Arc<dyn ShortUrlRepository>,
    pub broker: Arc<dyn MessageBroker>,
    pub cache: Arc<dyn CacheService>,
    pub click_sender: mpsc::Sender<ClickEvent>,
}

impl AppState {
    /// Wires the services on top of the selected backends.
    pub fn new(
        short_urls: Arc<dyn ShortUrlRepository>,
        clicks: Arc<dyn ClickRepository>,
        broker: Arc<dyn MessageBroker>,
        cache: Arc<dyn CacheService>,
        click_sender: mpsc::Sender<ClickEvent>,
        settings: ServiceSettings,
    ) -> Self {
        let gate_service = Arc::new(GateService::new(
            short_urls.clone(),
            click_sender.clone(),
            settings.retry_after_secs,
        ));

        let qr_service = Arc::new(QrService::new(
            gate_service.clone(),
            short_urls.clone(),
            cache.clone(),
            Arc::new(SvgQrRenderer::default()),
            settings.base_url,
            settings.prefetch,
        ));

        let creation_service = Arc::new(CreationService::new(
            short_urls.clone(),
            broker.clone(),
            Arc::new(HttpUrlValidator),
            Arc::new(Sha256Hasher),
            qr_service.clone(),
            settings.verification_topic,
        ));

        let link_info_service = Arc::new(LinkInfoService::new(
            short_urls.clone(),
            clicks,
            CLICK_HISTORY_LIMIT,
        ));

        Self {
            creation_service,
            gate_service,
            qr_service,
            link_info_service,
            short_urls,
            broker,
            cache,
            click_sender,
        }
    }
}

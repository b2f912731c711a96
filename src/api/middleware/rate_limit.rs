//! Rate limiting middleware using token bucket algorithm.

use axum::Router;
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use std::sync::Arc;
use tower_governor::{
    GovernorLayer,
    governor::GovernorConfigBuilder,
    key_extractor::{KeyExtractor, PeerIpKeyExtractor, SmartIpKeyExtractor},
};
use tracing::warn;

use crate::state::AppState;

/// Sustained requests per second allowed per client.
const PER_SECOND: u64 = 2;

/// Burst capacity per client.
const BURST_SIZE: u32 = 100;

type Layer<K> = GovernorLayer<K, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// Wraps `router` in a per-client rate limiter.
///
/// # Limits
///
/// - **Rate**: 2 requests per second
/// - **Burst**: 100 requests
///
/// Requests exceeding the limit receive `429 Too Many Requests`.
///
/// # Key Extraction
///
/// With `behind_proxy` the client IP comes from `X-Forwarded-For` /
/// `X-Real-IP` / `Forwarded`; otherwise from the socket peer address.
///
/// # Example
///
/// ```rust,ignore
/// let api = rate_limit::apply(Router::new().route("/link", post(create_link_handler)), false);
/// ```
pub fn apply(router: Router<AppState>, behind_proxy: bool) -> Router<AppState> {
    if behind_proxy {
        match layer(SmartIpKeyExtractor) {
            Some(layer) => router.layer(layer),
            None => router,
        }
    } else {
        match layer(PeerIpKeyExtractor) {
            Some(layer) => router.layer(layer),
            None => router,
        }
    }
}

fn layer<K>(key_extractor: K) -> Option<Layer<K>>
where
    K: KeyExtractor,
{
    let Some(config) = GovernorConfigBuilder::default()
        .per_second(PER_SECOND)
        .burst_size(BURST_SIZE)
        .key_extractor(key_extractor)
        .finish()
    else {
        warn!("Invalid rate limit configuration, rate limiting disabled");
        return None;
    };

    Some(GovernorLayer::new(Arc::new(config)))
}

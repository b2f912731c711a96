//! Cache service trait and error types.

use async_trait::async_trait;
use std::fmt;

/// Errors that can occur during cache operations.
#[derive(Debug)]
pub enum CacheError {
    ConnectionError(String),
    OperationError(String),
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ConnectionError(e) => write!(f, "Cache connection error: {}", e),
            Self::OperationError(e) => write!(f, "Cache operation error: {}", e),
        }
    }
}

impl std::error::Error for CacheError {}

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Storage for rendered QR artifacts, keyed by short URL hash.
///
/// The cache holds opaque bytes and knows nothing about safety; callers must only
/// write artifacts for records that are `Safe` and must consult the gate before
/// serving a hit. Implementations must be thread-safe and fail open: a cache
/// failure degrades to regeneration, never to an error response.
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::RedisCache`] - Redis-backed cache with TTL support
/// - [`crate::infrastructure::cache::MemoryCache`] - In-process map used without Redis
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Retrieves a cached artifact.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` on cache hit
    /// - `Ok(None)` on cache miss or backend error (fail-open behavior)
    async fn get_qr(&self, hash: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Stores an artifact with optional TTL (implementation default if `None`).
    async fn set_qr(&self, hash: &str, artifact: &[u8], ttl_seconds: Option<u64>)
    -> CacheResult<()>;

    /// Removes a cached artifact, e.g. when a hash is found unsafe.
    async fn invalidate(&self, hash: &str) -> CacheResult<()>;

    /// Checks if the cache backend is healthy.
    async fn health_check(&self) -> bool;
}

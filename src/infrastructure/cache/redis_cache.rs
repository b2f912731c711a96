//! Redis-backed QR artifact cache.

use super::service::{CacheError, CacheResult, CacheService};
use async_trait::async_trait;
use redis::{Client, RedisResult, aio::ConnectionManager};
use tracing::{debug, info, warn};

/// Namespace of QR entries; the renderer version is part of the key so a
/// format change never serves artifacts produced by an older build.
const KEY_PREFIX: &str = "qr:svg:v1:";

/// SVG codes for a short URL stay well below this; anything larger is not
/// worth holding in Redis.
const MAX_ARTIFACT_BYTES: usize = 64 * 1024;

/// Redis cache for rendered QR codes.
///
/// Reads refresh the expiry (`GETEX`), so codes that keep being scanned stay
/// warm while abandoned ones age out. Removal uses `UNLINK` to keep the
/// invalidation on the verification path non-blocking. Every Redis failure is
/// swallowed: the caller regenerates the artifact instead.
pub struct RedisCache {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisCache {
    /// Connects to Redis and verifies the connection with a `PING`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ConnectionError`] if the URL is invalid or Redis
    /// does not answer.
    pub async fn connect(redis_url: &str, ttl_seconds: u64) -> CacheResult<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| CacheError::ConnectionError(format!("invalid Redis URL: {}", e)))?;
        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::ConnectionError(e.to_string()))?;

        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| CacheError::ConnectionError(format!("PING failed: {}", e)))?;

        info!(ttl_seconds, "QR cache connected to Redis");
        Ok(Self { conn, ttl_seconds })
    }

    fn key(hash: &str) -> String {
        format!("{KEY_PREFIX}{hash}")
    }
}

/// Logs a failed Redis call and substitutes `fallback`.
fn fail_open<T>(op: &'static str, hash: &str, result: RedisResult<T>, fallback: T) -> T {
    result.unwrap_or_else(|e| {
        metrics::counter!("shortener_qr_cache_errors_total", "op" => op).increment(1);
        warn!(hash, op, "QR cache unavailable, continuing without it: {}", e);
        fallback
    })
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get_qr(&self, hash: &str) -> CacheResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let result = redis::cmd("GETEX")
            .arg(Self::key(hash))
            .arg("EX")
            .arg(self.ttl_seconds)
            .query_async::<Option<Vec<u8>>>(&mut conn)
            .await;

        let artifact = fail_open("get", hash, result, None);
        debug!(hash, hit = artifact.is_some(), "QR cache lookup");
        Ok(artifact)
    }

    async fn set_qr(&self, hash: &str, artifact: &[u8], ttl: Option<u64>) -> CacheResult<()> {
        if artifact.is_empty() || artifact.len() > MAX_ARTIFACT_BYTES {
            debug!(hash, size = artifact.len(), "QR artifact not cached");
            return Ok(());
        }

        let mut conn = self.conn.clone();
        let ttl_seconds = ttl.unwrap_or(self.ttl_seconds);
        let result = redis::cmd("SET")
            .arg(Self::key(hash))
            .arg(artifact)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async::<()>(&mut conn)
            .await;

        fail_open("set", hash, result, ());
        Ok(())
    }

    async fn invalidate(&self, hash: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let result = redis::cmd("UNLINK")
            .arg(Self::key(hash))
            .query_async::<u32>(&mut conn)
            .await;

        if fail_open("invalidate", hash, result, 0) > 0 {
            debug!(hash, "QR artifact evicted");
        }
        Ok(())
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await.is_ok()
    }
}

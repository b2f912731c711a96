//! In-process QR artifact cache.

use super::service::{CacheResult, CacheService};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct Entry {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// Thread-safe in-memory cache, used when Redis is not configured.
///
/// Backed by a `DashMap` so concurrent readers of different hashes do not contend.
/// Expired entries are dropped lazily on read.
#[derive(Debug, Clone)]
pub struct MemoryCache {
    inner: Arc<DashMap<String, Entry>>,
    default_ttl: Duration,
}

impl MemoryCache {
    pub fn new(default_ttl_seconds: u64) -> Self {
        debug!("Using in-memory QR cache");
        Self {
            inner: Arc::new(DashMap::new()),
            default_ttl: Duration::from_secs(default_ttl_seconds),
        }
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns true if a live entry exists for `hash`.
    pub fn contains(&self, hash: &str) -> bool {
        self.inner
            .get(hash)
            .is_some_and(|entry| entry.expires_at > Instant::now())
    }
}

#[async_trait]
impl CacheService for MemoryCache {
    async fn get_qr(&self, hash: &str) -> CacheResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let hit = self
            .inner
            .get(hash)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.bytes.clone());

        if hit.is_none() {
            self.inner.remove_if(hash, |_, entry| entry.expires_at <= now);
        }

        Ok(hit)
    }

    async fn set_qr(&self, hash: &str, artifact: &[u8], ttl: Option<u64>) -> CacheResult<()> {
        let ttl = ttl.map(Duration::from_secs).unwrap_or(self.default_ttl);
        self.inner.insert(
            hash.to_string(),
            Entry {
                bytes: artifact.to_vec(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn invalidate(&self, hash: &str) -> CacheResult<()> {
        self.inner.remove(hash);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}

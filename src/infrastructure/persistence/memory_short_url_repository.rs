//! In-process short URL store.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use crate::domain::entities::{NewShortUrl, Safety, ShortUrl, Verdict};
use crate::domain::repositories::{InsertOutcome, ShortUrlRepository};
use crate::error::AppError;

/// Short URL store over a `DashMap`, used when no database is configured.
///
/// Inserts go through the shard-locked `entry` API and verdicts through
/// `get_mut`, so each key sees the same atomic semantics as a single SQL
/// statement.
#[derive(Debug, Clone, Default)]
pub struct MemoryShortUrlRepository {
    records: Arc<DashMap<String, ShortUrl>>,
}

impl MemoryShortUrlRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ShortUrlRepository for MemoryShortUrlRepository {
    async fn insert_if_absent(&self, new: NewShortUrl) -> Result<InsertOutcome, AppError> {
        match self.records.entry(new.hash.clone()) {
            Entry::Occupied(existing) => Ok(InsertOutcome {
                record: existing.get().clone(),
                created: false,
            }),
            Entry::Vacant(slot) => {
                let record = ShortUrl::pending(new, Utc::now());
                slot.insert(record.clone());
                Ok(InsertOutcome {
                    record,
                    created: true,
                })
            }
        }
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<ShortUrl>, AppError> {
        Ok(self.records.get(hash).map(|r| r.clone()))
    }

    async fn update_safety(&self, hash: &str, verdict: Verdict) -> Result<bool, AppError> {
        match self.records.get_mut(hash) {
            Some(mut record) => {
                record.safety = verdict.into();
                record.verified_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<ShortUrl>, AppError> {
        let mut pending: Vec<ShortUrl> = self
            .records
            .iter()
            .filter(|r| r.safety == Safety::Unknown)
            .map(|r| r.clone())
            .collect();

        pending.sort_by_key(|r| r.created_at);
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn count_by_safety(&self, safety: Safety) -> Result<i64, AppError> {
        Ok(self.records.iter().filter(|r| r.safety == safety).count() as i64)
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::RedirectMode;

    fn new_record(hash: &str, target: &str) -> NewShortUrl {
        NewShortUrl {
            hash: hash.to_string(),
            target: target.to_string(),
            mode: RedirectMode::Temporary,
            sponsor: None,
            ip: None,
        }
    }

    #[tokio::test]
    async fn test_insert_creates_unknown_record() {
        let repo = MemoryShortUrlRepository::new();
        let outcome = repo
            .insert_if_absent(new_record("2a1b4024", "http://example.com/"))
            .await
            .unwrap();

        assert!(outcome.created);
        assert_eq!(outcome.record.safety, Safety::Unknown);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_reinsert_keeps_existing_verdict() {
        let repo = MemoryShortUrlRepository::new();
        repo.insert_if_absent(new_record("2a1b4024", "http://example.com/"))
            .await
            .unwrap();
        repo.update_safety("2a1b4024", Verdict::Safe).await.unwrap();

        let outcome = repo
            .insert_if_absent(new_record("2a1b4024", "http://example.com/"))
            .await
            .unwrap();

        assert!(!outcome.created);
        assert_eq!(outcome.record.safety, Safety::Safe);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record_returns_false() {
        let repo = MemoryShortUrlRepository::new();
        assert!(!repo.update_safety("missing", Verdict::Safe).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let repo = MemoryShortUrlRepository::new();
        repo.insert_if_absent(new_record("h", "http://a.test/"))
            .await
            .unwrap();

        assert!(repo.update_safety("h", Verdict::Unsafe).await.unwrap());
        assert!(repo.update_safety("h", Verdict::Unsafe).await.unwrap());

        let record = repo.find_by_hash("h").await.unwrap().unwrap();
        assert_eq!(record.safety, Safety::Unsafe);
        assert!(record.verified_at.is_some());
    }

    #[tokio::test]
    async fn test_pending_and_counts() {
        let repo = MemoryShortUrlRepository::new();
        for (hash, target) in [("a", "http://a.test/"), ("b", "http://b.test/"), ("c", "http://c.test/")] {
            repo.insert_if_absent(new_record(hash, target)).await.unwrap();
        }
        repo.update_safety("b", Verdict::Safe).await.unwrap();

        let pending = repo.list_pending(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|r| r.safety == Safety::Unknown));
        assert_eq!(repo.list_pending(1).await.unwrap().len(), 1);

        assert_eq!(repo.count_by_safety(Safety::Unknown).await.unwrap(), 2);
        assert_eq!(repo.count_by_safety(Safety::Safe).await.unwrap(), 1);
        assert_eq!(repo.count_by_safety(Safety::Unsafe).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_create_one_record() {
        let repo = MemoryShortUrlRepository::new();
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.insert_if_absent(new_record("same", "http://same.test/"))
                        .await
                        .unwrap()
                        .created
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap() {
                created += 1;
            }
        }

        assert_eq!(created, 1);
        assert_eq!(repo.len(), 1);
    }
}

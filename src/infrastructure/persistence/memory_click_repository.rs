//! In-process click log.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;

use crate::domain::entities::{Click, NewClick};
use crate::domain::repositories::ClickRepository;
use crate::error::AppError;

/// Click log keyed by hash, used when no database is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryClickRepository {
    clicks: Arc<DashMap<String, Vec<Click>>>,
}

impl MemoryClickRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClickRepository for MemoryClickRepository {
    async fn record(&self, click: NewClick) -> Result<(), AppError> {
        let click = click.into_click(Utc::now());
        self.clicks.entry(click.hash.clone()).or_default().push(click);
        Ok(())
    }

    async fn list_by_hash(&self, hash: &str, limit: i64) -> Result<Vec<Click>, AppError> {
        Ok(self
            .clicks
            .get(hash)
            .map(|clicks| {
                clicks
                    .iter()
                    .rev()
                    .take(limit.max(0) as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count(&self) -> Result<i64, AppError> {
        Ok(self.clicks.iter().map(|c| c.len() as i64).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(hash: &str, browser: &str) -> NewClick {
        NewClick {
            hash: hash.to_string(),
            ip: Some("127.0.0.1".to_string()),
            browser: Some(browser.to_string()),
            platform: None,
            referrer: None,
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_limited() {
        let repo = MemoryClickRepository::new();
        repo.record(click("h", "Firefox")).await.unwrap();
        repo.record(click("h", "Chrome")).await.unwrap();
        repo.record(click("other", "Safari")).await.unwrap();

        let clicks = repo.list_by_hash("h", 10).await.unwrap();
        assert_eq!(clicks.len(), 2);
        assert_eq!(clicks[0].browser.as_deref(), Some("Chrome"));

        assert_eq!(repo.list_by_hash("h", 1).await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unknown_hash_has_no_clicks() {
        let repo = MemoryClickRepository::new();
        assert!(repo.list_by_hash("missing", 10).await.unwrap().is_empty());
    }
}

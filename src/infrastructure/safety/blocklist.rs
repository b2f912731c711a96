//! Offline reputation check against a configured host list.

use super::checker::{SafetyCheckError, SafetyChecker};
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;
use url::Url;

/// Flags a URL as unsafe when its host, or any parent domain of it, is listed.
///
/// Used when no Safe Browsing key is configured, and in tests.
#[derive(Debug, Clone, Default)]
pub struct BlocklistChecker {
    hosts: HashSet<String>,
}

impl BlocklistChecker {
    pub fn new<I, S>(hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let hosts: HashSet<String> = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().trim_end_matches('.').to_lowercase())
            .filter(|h| !h.is_empty())
            .collect();

        info!(blocked_hosts = hosts.len(), "Using static blocklist reputation checks");
        Self { hosts }
    }

    fn is_blocked(&self, host: &str) -> bool {
        let mut candidate = host;
        loop {
            if self.hosts.contains(candidate) {
                return true;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if !parent.is_empty() => candidate = parent,
                _ => return false,
            }
        }
    }
}

#[async_trait]
impl SafetyChecker for BlocklistChecker {
    async fn is_safe(&self, url: &str) -> Result<bool, SafetyCheckError> {
        let parsed = Url::parse(url).map_err(|e| SafetyCheckError::Parse(e.to_string()))?;
        let host = parsed
            .host_str()
            .map(|h| h.trim_end_matches('.').to_lowercase())
            .unwrap_or_default();

        Ok(!self.is_blocked(&host))
    }
}

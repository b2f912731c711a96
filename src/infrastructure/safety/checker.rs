//! Reputation check port.

use async_trait::async_trait;

/// Failures of a reputation lookup. All of them are recoverable: the caller
/// retries later and never records a verdict for a failed lookup.
#[derive(Debug, thiserror::Error)]
pub enum SafetyCheckError {
    #[error("Reputation check timed out after {0} ms")]
    Timeout(u64),

    #[error("Reputation service unreachable: {0}")]
    Transport(String),

    #[error("Reputation service returned HTTP {status}")]
    Api { status: u16 },

    #[error("Unexpected reputation response: {0}")]
    Parse(String),
}

/// Answers whether a target URL is considered safe.
///
/// # Implementations
///
/// - [`crate::infrastructure::safety::SafeBrowsingClient`] - Google Safe Browsing v4
/// - [`crate::infrastructure::safety::BlocklistChecker`] - Static host blocklist
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SafetyChecker: Send + Sync {
    /// Returns `Ok(true)` when no threat is known for `url`.
    async fn is_safe(&self, url: &str) -> Result<bool, SafetyCheckError>;
}

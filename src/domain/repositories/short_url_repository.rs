//! Repository trait for short URL records.

use crate::domain::entities::{NewShortUrl, Safety, ShortUrl, Verdict};
use crate::error::AppError;
use async_trait::async_trait;

/// Result of an insert-if-absent.
#[derive(Debug, Clone)]
pub struct InsertOutcome {
    /// The stored record: the new one, or the one that already owned the hash.
    pub record: ShortUrl,
    /// `false` when a record with the same hash already existed.
    pub created: bool,
}

/// Repository interface for short URL records.
///
/// The store is the only shared mutable state of the verification pipeline, so
/// every mutation is a single atomic per-key operation:
///
/// - [`insert_if_absent`](Self::insert_if_absent) never overwrites an existing
///   record, so re-creating a target cannot reset its safety flag.
/// - [`update_safety`](Self::update_safety) overwrites one field and accepts only
///   a [`Verdict`], so a resolved record never returns to `Unknown`.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgShortUrlRepository`] - PostgreSQL
/// - [`crate::infrastructure::persistence::MemoryShortUrlRepository`] - in-process map
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortUrlRepository: Send + Sync {
    /// Stores a new record with `Unknown` safety unless the hash already exists.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    async fn insert_if_absent(&self, new: NewShortUrl) -> Result<InsertOutcome, AppError>;

    /// Finds a record by hash.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    async fn find_by_hash(&self, hash: &str) -> Result<Option<ShortUrl>, AppError>;

    /// Writes a verdict for `hash`.
    ///
    /// Returns `Ok(false)` when no record exists for the hash. Writing the value
    /// the record already holds is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    async fn update_safety(&self, hash: &str, verdict: Verdict) -> Result<bool, AppError>;

    /// Lists records still awaiting a verdict, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    async fn list_pending(&self, limit: i64) -> Result<Vec<ShortUrl>, AppError>;

    /// Counts records in the given safety state.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    async fn count_by_safety(&self, safety: Safety) -> Result<i64, AppError>;

    /// Checks that the backing store is reachable.
    async fn health_check(&self) -> bool;
}

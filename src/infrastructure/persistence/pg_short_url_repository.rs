//! PostgreSQL implementation of the short URL repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{NewShortUrl, RedirectMode, Safety, ShortUrl, Verdict};
use crate::domain::repositories::{InsertOutcome, ShortUrlRepository};
use crate::error::AppError;

const COLUMNS: &str = "hash, target, mode, safety, sponsor, ip, created_at, verified_at";

#[derive(Debug, sqlx::FromRow)]
struct ShortUrlRow {
    hash: String,
    target: String,
    mode: i16,
    safety: String,
    sponsor: Option<String>,
    ip: Option<String>,
    created_at: DateTime<Utc>,
    verified_at: Option<DateTime<Utc>>,
}

impl TryFrom<ShortUrlRow> for ShortUrl {
    type Error = AppError;

    fn try_from(row: ShortUrlRow) -> Result<Self, Self::Error> {
        let safety = row.safety.parse::<Safety>().map_err(|e| {
            AppError::internal(
                "Corrupt safety value in store",
                json!({ "hash": row.hash, "reason": e.to_string() }),
            )
        })?;

        Ok(ShortUrl {
            hash: row.hash,
            target: row.target,
            mode: RedirectMode::from_status_code(row.mode as u16),
            safety,
            sponsor: row.sponsor,
            ip: row.ip,
            created_at: row.created_at,
            verified_at: row.verified_at,
        })
    }
}

/// PostgreSQL repository for short URL records.
///
/// Every mutation is a single statement, so concurrent workers writing the
/// same hash serialize on the row lock.
pub struct PgShortUrlRepository {
    pool: Arc<PgPool>,
}

impl PgShortUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShortUrlRepository for PgShortUrlRepository {
    async fn insert_if_absent(&self, new: NewShortUrl) -> Result<InsertOutcome, AppError> {
        let inserted = sqlx::query_as::<_, ShortUrlRow>(&format!(
            r#"
            INSERT INTO short_urls (hash, target, mode, sponsor, ip)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (hash) DO NOTHING
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.hash)
        .bind(&new.target)
        .bind(new.mode.status_code() as i16)
        .bind(&new.sponsor)
        .bind(&new.ip)
        .fetch_optional(self.pool.as_ref())
        .await?;

        if let Some(row) = inserted {
            return Ok(InsertOutcome {
                record: row.try_into()?,
                created: true,
            });
        }

        let existing = self.find_by_hash(&new.hash).await?.ok_or_else(|| {
            AppError::internal(
                "Record vanished after insert conflict",
                json!({ "hash": new.hash }),
            )
        })?;

        Ok(InsertOutcome {
            record: existing,
            created: false,
        })
    }

    async fn find_by_hash(&self, hash: &str) -> Result<Option<ShortUrl>, AppError> {
        let row = sqlx::query_as::<_, ShortUrlRow>(&format!(
            "SELECT {COLUMNS} FROM short_urls WHERE hash = $1"
        ))
        .bind(hash)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(ShortUrl::try_from).transpose()
    }

    async fn update_safety(&self, hash: &str, verdict: Verdict) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE short_urls
            SET safety = $2, verified_at = NOW()
            WHERE hash = $1
            "#,
        )
        .bind(hash)
        .bind(verdict.as_str())
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<ShortUrl>, AppError> {
        let rows = sqlx::query_as::<_, ShortUrlRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM short_urls
            WHERE safety = 'unknown'
            ORDER BY created_at ASC
            LIMIT $1
            "#
        ))
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        rows.into_iter().map(ShortUrl::try_from).collect()
    }

    async fn count_by_safety(&self, safety: Safety) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM short_urls WHERE safety = $1")
            .bind(safety.as_str())
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }

    async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .is_ok()
    }
}

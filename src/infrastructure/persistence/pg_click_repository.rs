//! PostgreSQL implementation of the click repository.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{Click, NewClick};
use crate::domain::repositories::ClickRepository;
use crate::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ClickRow {
    hash: String,
    ip: Option<String>,
    browser: Option<String>,
    platform: Option<String>,
    referrer: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<ClickRow> for Click {
    fn from(row: ClickRow) -> Self {
        Click {
            hash: row.hash,
            ip: row.ip,
            browser: row.browser,
            platform: row.platform,
            referrer: row.referrer,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL repository for the click log.
pub struct PgClickRepository {
    pool: Arc<PgPool>,
}

impl PgClickRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClickRepository for PgClickRepository {
    async fn record(&self, click: NewClick) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO clicks (hash, ip, browser, platform, referrer)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&click.hash)
        .bind(&click.ip)
        .bind(&click.browser)
        .bind(&click.platform)
        .bind(&click.referrer)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn list_by_hash(&self, hash: &str, limit: i64) -> Result<Vec<Click>, AppError> {
        let rows = sqlx::query_as::<_, ClickRow>(
            r#"
            SELECT hash, ip, browser, platform, referrer, created_at
            FROM clicks
            WHERE hash = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(hash)
        .bind(limit)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(rows.into_iter().map(Click::from).collect())
    }

    async fn count(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clicks")
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(count)
    }
}

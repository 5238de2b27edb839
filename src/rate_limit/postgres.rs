//! Shared rate limit store on PostgreSQL
//!
//! Each call is one SQL transaction. `pg_advisory_xact_lock(hashtext(key))`
//! serialises callers on the same key across every service instance, so two
//! requests can never both observe "under limit" and both be admitted.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::store::{RateLimitStore, RateLimitStoreError, WindowDecision};

#[derive(Debug, Clone)]
pub struct PgRateLimitStore {
    pool: PgPool,
}

impl PgRateLimitStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_and_prune(
        tx: &mut Transaction<'_, Postgres>,
        key: &str,
        window_start_ms: i64,
    ) -> Result<u32, RateLimitStoreError> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(key)
            .execute(&mut **tx)
            .await?;

        sqlx::query("DELETE FROM rate_limit_entries WHERE key = $1 AND timestamp_ms <= $2")
            .bind(key)
            .bind(window_start_ms)
            .execute(&mut **tx)
            .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rate_limit_entries WHERE key = $1")
            .bind(key)
            .fetch_one(&mut **tx)
            .await?;

        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl RateLimitStore for PgRateLimitStore {
    async fn check_and_insert(
        &self,
        key: &str,
        now_ms: i64,
        window_start_ms: i64,
        limit: u32,
    ) -> Result<WindowDecision, RateLimitStoreError> {
        let mut tx = self.pool.begin().await?;

        let count = Self::lock_and_prune(&mut tx, key, window_start_ms).await?;
        let admitted = count < limit;

        if admitted {
            sqlx::query(
                "INSERT INTO rate_limit_entries (key, request_id, timestamp_ms) VALUES ($1, $2, $3)",
            )
            .bind(key)
            .bind(Uuid::new_v4())
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;
        }

        let oldest_ms: Option<i64> =
            sqlx::query_scalar("SELECT MIN(timestamp_ms) FROM rate_limit_entries WHERE key = $1")
                .bind(key)
                .fetch_one(&mut *tx)
                .await?;

        // Commit either way: the prune is kept even when the request is refused
        tx.commit().await?;

        Ok(WindowDecision {
            admitted,
            count: if admitted { count + 1 } else { count },
            oldest_ms,
        })
    }

    async fn count(&self, key: &str, window_start_ms: i64) -> Result<u32, RateLimitStoreError> {
        let mut tx = self.pool.begin().await?;
        let count = Self::lock_and_prune(&mut tx, key, window_start_ms).await?;
        tx.commit().await?;
        Ok(count)
    }

    async fn oldest(
        &self,
        key: &str,
        window_start_ms: i64,
    ) -> Result<Option<i64>, RateLimitStoreError> {
        let oldest: Option<i64> = sqlx::query_scalar(
            "SELECT MIN(timestamp_ms) FROM rate_limit_entries WHERE key = $1 AND timestamp_ms > $2",
        )
        .bind(key)
        .bind(window_start_ms)
        .fetch_one(&self.pool)
        .await?;
        Ok(oldest)
    }

    async fn clear(&self, key: &str) -> Result<(), RateLimitStoreError> {
        sqlx::query("DELETE FROM rate_limit_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_before(&self, cutoff_ms: i64) -> Result<u64, RateLimitStoreError> {
        let result = sqlx::query("DELETE FROM rate_limit_entries WHERE timestamp_ms <= $1")
            .bind(cutoff_ms)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

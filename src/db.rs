//! Database module
//!
//! Connection pool and schema verification utilities.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::Config;

/// Tables created by `migrations/0001_init.sql`
const REQUIRED_TABLES: &[&str] = &[
    "users",
    "wallets",
    "wallet_entries",
    "savings_plans",
    "plan_entries",
    "transactions",
    "rate_limit_entries",
    "audit_logs",
];

/// Create the PostgreSQL pool from configuration
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
}

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Check if required tables exist
pub async fn check_schema(pool: &PgPool) -> Result<bool, sqlx::Error> {
    for table in REQUIRED_TABLES {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = 'public' AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists {
            tracing::error!(
                table = %table,
                "Required table does not exist. Apply migrations/0001_init.sql"
            );
            return Ok(false);
        }
    }

    Ok(true)
}

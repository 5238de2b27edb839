//! Counter store port for the sliding-window limiter

use async_trait::async_trait;

/// Outcome of one atomic check-and-insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub admitted: bool,
    /// Entries in the window after the call (including this request if admitted)
    pub count: u32,
    /// Oldest entry still inside the window, epoch ms
    pub oldest_ms: Option<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitStoreError {
    #[error("Rate limit store error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Shared store holding, per key, an ordered set of `(timestamp, request id)`.
///
/// An entry is inside the window when `timestamp > window_start_ms`.
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// As one atomic unit per key: drop expired entries, count, add an entry
    /// at `now_ms` and keep it only if the count stays within `limit`.
    async fn check_and_insert(
        &self,
        key: &str,
        now_ms: i64,
        window_start_ms: i64,
        limit: u32,
    ) -> Result<WindowDecision, RateLimitStoreError>;

    /// Drop expired entries and count the rest
    async fn count(&self, key: &str, window_start_ms: i64) -> Result<u32, RateLimitStoreError>;

    /// Oldest entry inside the window
    async fn oldest(&self, key: &str, window_start_ms: i64) -> Result<Option<i64>, RateLimitStoreError>;

    async fn clear(&self, key: &str) -> Result<(), RateLimitStoreError>;

    /// Remove entries at or before `cutoff_ms` for every key
    async fn purge_before(&self, cutoff_ms: i64) -> Result<u64, RateLimitStoreError>;
}

//! Rate limiting module
//!
//! Sliding-window admission control keyed by arbitrary strings such as
//! `contribution:<user>:<plan>` or `api:<user>`. The window is correct
//! across service instances as long as they share one store.

mod memory;
mod postgres;
mod store;

pub use memory::MemoryRateLimitStore;
pub use postgres::PgRateLimitStore;
pub use store::{RateLimitStore, RateLimitStoreError, WindowDecision};

use std::sync::Arc;
use std::time::Duration;

use crate::domain::Clock;
use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limit exceeded for {key}, retry after {retry_after_ms}")]
    Exceeded { key: String, retry_after_ms: i64 },

    #[error(transparent)]
    Store(#[from] RateLimitStoreError),
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Exceeded {
                key,
                retry_after_ms,
            } => AppError::RateLimitExceeded {
                key,
                retry_after_ms,
            },
            RateLimitError::Store(e) => AppError::database("check_limit", "rate_limit_entries", e),
        }
    }
}

/// `limit` requests per `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }
}

fn window_ms(window: Duration) -> i64 {
    i64::try_from(window.as_millis()).unwrap_or(i64::MAX)
}

pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Admit the request or fail with the time a slot frees up
    pub async fn check_limit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<(), RateLimitError> {
        let now = self.clock.now_millis();
        let window = window_ms(window);

        let decision = self
            .store
            .check_and_insert(key, now, now.saturating_sub(window), limit)
            .await?;

        if decision.admitted {
            return Ok(());
        }

        let retry_after_ms = decision.oldest_ms.unwrap_or(now).saturating_add(window);
        tracing::warn!(key = %key, limit, retry_after_ms, "Rate limit exceeded");
        Err(RateLimitError::Exceeded {
            key: key.to_string(),
            retry_after_ms,
        })
    }

    pub async fn check(&self, key: &str, policy: RateLimitPolicy) -> Result<(), RateLimitError> {
        self.check_limit(key, policy.limit, policy.window).await
    }

    pub async fn get_remaining_requests(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<u32, RateLimitError> {
        let now = self.clock.now_millis();
        let count = self
            .store
            .count(key, now.saturating_sub(window_ms(window)))
            .await?;
        Ok(limit.saturating_sub(count))
    }

    /// Administrative override
    pub async fn reset_limit(&self, key: &str) -> Result<(), RateLimitError> {
        self.store.clear(key).await?;
        tracing::info!(key = %key, "Rate limit reset");
        Ok(())
    }

    /// Oldest entry + window, `None` when the window is empty
    pub async fn get_retry_after(
        &self,
        key: &str,
        window: Duration,
    ) -> Result<Option<i64>, RateLimitError> {
        let now = self.clock.now_millis();
        let window = window_ms(window);
        let oldest = self.store.oldest(key, now.saturating_sub(window)).await?;
        Ok(oldest.map(|ts| ts.saturating_add(window)))
    }

    /// Drop every entry older than `max_window`
    pub async fn purge_expired(&self, max_window: Duration) -> Result<u64, RateLimitError> {
        let cutoff = self.clock.now_millis().saturating_sub(window_ms(max_window));
        Ok(self.store.purge_before(cutoff).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ManualClock;
    use chrono::{TimeZone, Utc};

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        ));
        let limiter = RateLimiter::new(Arc::new(MemoryRateLimitStore::new()), clock.clone());
        (limiter, clock)
    }

    const WINDOW: Duration = Duration::from_millis(1000);

    #[tokio::test]
    async fn test_boundary_three_per_second() {
        let (limiter, clock) = limiter();
        let key = "email-verification:ada@example.com";

        for _ in 0..3 {
            limiter.check_limit(key, 3, WINDOW).await.unwrap();
            clock.advance(chrono::Duration::milliseconds(100));
        }

        let err = limiter.check_limit(key, 3, WINDOW).await.unwrap_err();
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap().timestamp_millis();
        match err {
            RateLimitError::Exceeded { retry_after_ms, .. } => {
                assert_eq!(retry_after_ms, start + 1000);
            }
            other => panic!("Expected Exceeded, got: {:?}", other),
        }

        clock.advance(chrono::Duration::milliseconds(1000));
        limiter.check_limit(key, 3, WINDOW).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_request_does_not_consume_slot() {
        let (limiter, _clock) = limiter();
        let key = "contribution:u:p";

        limiter.check_limit(key, 1, WINDOW).await.unwrap();
        for _ in 0..5 {
            assert!(limiter.check_limit(key, 1, WINDOW).await.is_err());
        }
        assert_eq!(limiter.get_remaining_requests(key, 1, WINDOW).await.unwrap(), 0);
        assert_eq!(limiter.get_remaining_requests(key, 3, WINDOW).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_entry_expires_exactly_at_window_end() {
        let (limiter, clock) = limiter();
        let key = "k";

        limiter.check_limit(key, 1, WINDOW).await.unwrap();
        clock.advance(chrono::Duration::milliseconds(999));
        assert!(limiter.check_limit(key, 1, WINDOW).await.is_err());
        clock.advance(chrono::Duration::milliseconds(1));
        assert!(limiter.check_limit(key, 1, WINDOW).await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_and_retry_after() {
        let (limiter, clock) = limiter();
        let key = "k";
        assert_eq!(limiter.get_retry_after(key, WINDOW).await.unwrap(), None);

        limiter.check_limit(key, 2, WINDOW).await.unwrap();
        let first = clock.now_millis();
        assert_eq!(
            limiter.get_retry_after(key, WINDOW).await.unwrap(),
            Some(first + 1000)
        );

        limiter.reset_limit(key).await.unwrap();
        assert_eq!(limiter.get_remaining_requests(key, 2, WINDOW).await.unwrap(), 2);
        assert_eq!(limiter.get_retry_after(key, WINDOW).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (limiter, _clock) = limiter();
        limiter.check_limit("a", 1, WINDOW).await.unwrap();
        limiter.check_limit("b", 1, WINDOW).await.unwrap();
        assert!(limiter.check_limit("a", 1, WINDOW).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_callers_never_exceed_limit() {
        let (limiter, _clock) = limiter();
        let limiter = Arc::new(limiter);

        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.check_limit("burst", 10, WINDOW).await.is_ok()
            }));
        }

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 10);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (limiter, clock) = limiter();
        limiter.check_limit("a", 5, WINDOW).await.unwrap();
        limiter.check_limit("b", 5, WINDOW).await.unwrap();
        clock.advance(chrono::Duration::milliseconds(2000));
        limiter.check_limit("b", 5, WINDOW).await.unwrap();

        assert_eq!(limiter.purge_expired(WINDOW).await.unwrap(), 2);
        assert_eq!(limiter.get_remaining_requests("b", 5, WINDOW).await.unwrap(), 4);
    }
}

//! Per-process rate limit store
//!
//! Every call runs inside one `tokio::sync::Mutex` critical section, which
//! gives the same atomicity the shared store gets from its SQL transaction.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::{RateLimitStore, RateLimitStoreError, WindowDecision};

type Window = BTreeSet<(i64, Uuid)>;

#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn prune(window: &mut Window, window_start_ms: i64) {
    // Everything strictly after window_start survives
    let keep = window.split_off(&(window_start_ms + 1, Uuid::nil()));
    *window = keep;
}

fn len(window: &Window) -> u32 {
    u32::try_from(window.len()).unwrap_or(u32::MAX)
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn check_and_insert(
        &self,
        key: &str,
        now_ms: i64,
        window_start_ms: i64,
        limit: u32,
    ) -> Result<WindowDecision, RateLimitStoreError> {
        let mut windows = self.windows.lock().await;
        let window = windows.entry(key.to_string()).or_default();

        prune(window, window_start_ms);

        let entry = (now_ms, Uuid::new_v4());
        window.insert(entry);

        let admitted = len(window) <= limit;
        if !admitted {
            window.remove(&entry);
        }

        Ok(WindowDecision {
            admitted,
            count: len(window),
            oldest_ms: window.first().map(|(ts, _)| *ts),
        })
    }

    async fn count(&self, key: &str, window_start_ms: i64) -> Result<u32, RateLimitStoreError> {
        let mut windows = self.windows.lock().await;
        Ok(match windows.get_mut(key) {
            Some(window) => {
                prune(window, window_start_ms);
                len(window)
            }
            None => 0,
        })
    }

    async fn oldest(
        &self,
        key: &str,
        window_start_ms: i64,
    ) -> Result<Option<i64>, RateLimitStoreError> {
        let windows = self.windows.lock().await;
        Ok(windows.get(key).and_then(|window| {
            window
                .iter()
                .map(|(ts, _)| *ts)
                .find(|ts| *ts > window_start_ms)
        }))
    }

    async fn clear(&self, key: &str) -> Result<(), RateLimitStoreError> {
        self.windows.lock().await.remove(key);
        Ok(())
    }

    async fn purge_before(&self, cutoff_ms: i64) -> Result<u64, RateLimitStoreError> {
        let mut windows = self.windows.lock().await;
        let mut removed = 0u64;
        for window in windows.values_mut() {
            let before = window.len();
            prune(window, cutoff_ms);
            removed += (before - window.len()) as u64;
        }
        windows.retain(|_, window| !window.is_empty());
        Ok(removed)
    }
}

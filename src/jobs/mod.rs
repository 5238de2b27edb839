//! Scheduled Jobs
//!
//! Background sweeps: scheduled contributions, reconciliation of stuck
//! transactions and rate limit housekeeping. The scheduler stops when the
//! shutdown channel flips to `true`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::domain::{Clock, OperationContext};
use crate::error::AppError;
use crate::handlers::{AutoSaveHandler, AutoSaveReport, ReconciliationHandler, ReconciliationReport};
use crate::rate_limit::{RateLimitError, RateLimiter};

// =========================================================================
// Jobs
// =========================================================================

/// Run every due auto-save once
pub async fn run_auto_save(
    handler: &AutoSaveHandler,
    shutdown: Option<&watch::Receiver<bool>>,
) -> Result<AutoSaveReport, JobError> {
    let report = handler
        .execute(&OperationContext::system(), shutdown)
        .await?;

    if report.processed_count > 0 {
        tracing::info!(
            processed = report.processed_count,
            succeeded = report.successful_transactions.len(),
            failed = report.failed_transactions.len(),
            cancelled = report.cancelled,
            "Auto-save sweep finished"
        );
    }

    Ok(report)
}

/// Settle transactions left pending past the reconciliation timeout
pub async fn reconcile_pending(
    handler: &ReconciliationHandler,
) -> Result<ReconciliationReport, JobError> {
    Ok(handler.execute(&OperationContext::system()).await?)
}

/// Drop rate limit entries older than `retention`
pub async fn cleanup_rate_limit_entries(
    limiter: &RateLimiter,
    retention: Duration,
) -> Result<u64, JobError> {
    let rows_deleted = limiter.purge_expired(retention).await?;

    if rows_deleted > 0 {
        tracing::info!(rows_deleted = rows_deleted, "Cleaned up expired rate limit entries");
    }

    Ok(rows_deleted)
}

// =========================================================================
// Job Scheduler
// =========================================================================

#[derive(Debug, Clone)]
pub struct JobSchedulerConfig {
    pub auto_save_interval: Duration,
    pub reconciliation_interval: Duration,
    pub rate_limit_cleanup_interval: Duration,
    /// Must cover the longest rate limit window in use
    pub rate_limit_retention: Duration,
}

impl Default for JobSchedulerConfig {
    fn default() -> Self {
        Self {
            auto_save_interval: Duration::from_secs(60),
            reconciliation_interval: Duration::from_secs(60),
            rate_limit_cleanup_interval: Duration::from_secs(60),
            rate_limit_retention: Duration::from_secs(120),
        }
    }
}

/// Runs the periodic sweeps until shutdown
pub struct JobScheduler {
    auto_save: AutoSaveHandler,
    reconciliation: ReconciliationHandler,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    config: JobSchedulerConfig,
    shutdown: watch::Receiver<bool>,
}

impl JobScheduler {
    pub fn new(
        auto_save: AutoSaveHandler,
        reconciliation: ReconciliationHandler,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            auto_save,
            reconciliation,
            limiter,
            clock,
            config: JobSchedulerConfig::default(),
            shutdown,
        }
    }

    pub fn with_config(mut self, config: JobSchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Start the scheduler in the background
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        tracing::info!(
            auto_save_secs = self.config.auto_save_interval.as_secs(),
            reconciliation_secs = self.config.reconciliation_interval.as_secs(),
            "Job scheduler started"
        );

        let mut shutdown = self.shutdown.clone();
        let mut auto_save_interval = interval(self.config.auto_save_interval);
        let mut reconciliation_interval = interval(self.config.reconciliation_interval);
        let mut rate_limit_interval = interval(self.config.rate_limit_cleanup_interval);
        for ticker in [
            &mut auto_save_interval,
            &mut reconciliation_interval,
            &mut rate_limit_interval,
        ] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = auto_save_interval.tick() => {
                    if let Err(e) = run_auto_save(&self.auto_save, Some(&shutdown)).await {
                        tracing::error!(error = %e, "Auto-save sweep failed");
                    }
                }
                _ = reconciliation_interval.tick() => {
                    if let Err(e) = reconcile_pending(&self.reconciliation).await {
                        tracing::error!(error = %e, "Reconciliation sweep failed");
                    }
                }
                _ = rate_limit_interval.tick() => {
                    if let Err(e) = cleanup_rate_limit_entries(&self.limiter, self.config.rate_limit_retention).await {
                        tracing::error!(error = %e, "Rate limit cleanup failed");
                    }
                }
            }
        }

        tracing::info!("Job scheduler stopped");
    }

    /// Run every job once (manual trigger or testing)
    pub async fn run_all_once(&self) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();

        match run_auto_save(&self.auto_save, Some(&self.shutdown)).await {
            Ok(result) => report.auto_save = Some(result),
            Err(e) => report.errors.push(format!("Auto-save: {}", e)),
        }

        match reconcile_pending(&self.reconciliation).await {
            Ok(result) => report.reconciliation = Some(result),
            Err(e) => report.errors.push(format!("Reconciliation: {}", e)),
        }

        match cleanup_rate_limit_entries(&self.limiter, self.config.rate_limit_retention).await {
            Ok(count) => report.rate_limit_entries_cleaned = count,
            Err(e) => report.errors.push(format!("Rate limit cleanup: {}", e)),
        }

        report.completed_at = self.clock.now();
        report
    }
}

/// Report from running the jobs once
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub auto_save: Option<AutoSaveReport>,
    pub reconciliation: Option<ReconciliationReport>,
    pub rate_limit_entries_cleaned: u64,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

/// Job execution errors
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Use case failed: {0}")]
    UseCase(#[from] AppError),

    #[error("Rate limit store: {0}")]
    RateLimit(#[from] RateLimitError),
}

// =========================================================================
// Tests
// =========================================================================

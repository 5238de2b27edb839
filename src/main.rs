//! Daily Savings - transactional core API server
//!
//! Serves the HTTP API and runs the auto-save, reconciliation and rate limit
//! sweeps in the background until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daily_savings::api::{self, AppState, Policies};
use daily_savings::audit::{AuditSink, PgAuditSink, TracingAuditSink};
use daily_savings::config::Config;
use daily_savings::db;
use daily_savings::domain::SystemClock;
use daily_savings::handlers::{AutoSaveHandler, Ports, ReconciliationHandler};
use daily_savings::jobs::{JobScheduler, JobSchedulerConfig};
use daily_savings::rate_limit::{PgRateLimitStore, RateLimiter};
use daily_savings::repository::postgres::{
    PgSavingsRepository, PgTransactionRepository, PgUserRepository, PgWalletRepository,
};
use daily_savings::services::LogNotifier;

/// Initialize tracing/logging; `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "daily_savings=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = config.bind_address().parse()?;

    tracing::info!(
        environment = %config.environment,
        production = config.is_production(),
        "Starting daily savings server"
    );
    tracing::info!("Connecting to database...");

    let pool = db::connect(&config).await?;
    db::verify_connection(&pool).await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let audit: Arc<dyn AuditSink> = if config.audit_hash_chain {
        Arc::new(PgAuditSink::new(pool.clone()))
    } else {
        Arc::new(TracingAuditSink)
    };

    let clock = Arc::new(SystemClock);
    let ports = Ports {
        plans: Arc::new(PgSavingsRepository::new(pool.clone())),
        wallets: Arc::new(PgWalletRepository::new(pool.clone())),
        transactions: Arc::new(PgTransactionRepository::new(pool.clone())),
        users: Arc::new(PgUserRepository::new(pool.clone())),
        notifier: Arc::new(LogNotifier),
        audit,
        clock: clock.clone(),
    };
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(PgRateLimitStore::new(pool.clone())),
        clock.clone(),
    ));
    let policies = Policies::from_config(&config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = JobScheduler::new(
        AutoSaveHandler::new(ports.clone()),
        ReconciliationHandler::new(ports.clone(), policies.reconciliation_timeout),
        limiter.clone(),
        clock,
        shutdown_rx,
    )
    .with_config(JobSchedulerConfig {
        auto_save_interval: config.auto_save_interval,
        reconciliation_interval: config.reconciliation_interval,
        rate_limit_retention: config
            .contribution_attempt_window
            .max(policies.request_limit.window)
            * 2,
        ..JobSchedulerConfig::default()
    })
    .start();

    let app = api::build_router(AppState::new(ports, limiter, policies));

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    shutdown_tx.send(true).ok();
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "Job scheduler ended abnormally");
    }

    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

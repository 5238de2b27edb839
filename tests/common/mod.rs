//! Common test utilities
#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tower::util::ServiceExt;
use uuid::Uuid;

use daily_savings::api::{self, AppState, Policies};
use daily_savings::audit::MemoryAuditSink;
use daily_savings::domain::{Clock, Currency, ManualClock, Money, PlanId, UserId};
use daily_savings::entities::{
    Entity, KycStatus, KycTier, NewSavingsPlan, PlanState, PlanStatus, SavingsPlan, User, Wallet,
};
use daily_savings::handlers::Ports;
use daily_savings::rate_limit::{MemoryRateLimitStore, RateLimiter};
use daily_savings::repository::memory::{
    MemorySavingsRepository, MemoryTransactionRepository, MemoryUserRepository,
    MemoryWalletRepository,
};
use daily_savings::services::LogNotifier;

// =========================================================================
// In-memory application
// =========================================================================

pub fn ngn(amount: Decimal) -> Money {
    Money::new(amount, Currency::ngn()).unwrap()
}

/// Router over the in-memory adapters with a manual clock
pub struct TestApp {
    pub router: Router,
    pub ports: Ports,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<MemoryAuditSink>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_policies(Policies::default())
    }

    pub fn with_policies(policies: Policies) -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        ));
        let audit = Arc::new(MemoryAuditSink::new());
        let ports = Ports {
            plans: Arc::new(MemorySavingsRepository::new()),
            wallets: Arc::new(MemoryWalletRepository::with_clock(clock.clone())),
            transactions: Arc::new(MemoryTransactionRepository::new()),
            users: Arc::new(MemoryUserRepository::new()),
            notifier: Arc::new(LogNotifier),
            audit: audit.clone(),
            clock: clock.clone(),
        };
        let limiter = Arc::new(RateLimiter::new(
            Arc::new(MemoryRateLimitStore::new()),
            clock.clone(),
        ));
        let router = api::build_router(AppState::new(ports.clone(), limiter, policies));

        Self {
            router,
            ports,
            clock,
            audit,
        }
    }

    /// Verified user with an empty wallet
    pub async fn user(&self, tier: KycTier) -> UserId {
        let id = UserId::new();
        let now = self.clock.now();
        let user = User::from_state(id, tier, KycStatus::Verified, true, false, None, false, 1, now, now);
        self.ports.users.create(&user).await.unwrap();
        self.ports
            .wallets
            .create(&Wallet::open(id, Currency::ngn(), now))
            .await
            .unwrap();
        id
    }

    pub async fn admin(&self) -> UserId {
        let id = UserId::new();
        let user = User::register(id, self.clock.now()).with_admin(true);
        self.ports.users.create(&user).await.unwrap();
        id
    }

    pub async fn fund(&self, user_id: UserId, amount: Decimal) {
        self.ports
            .wallets
            .credit(user_id, &ngn(amount), &format!("SEED-{}", Uuid::new_v4()))
            .await
            .unwrap();
    }

    pub async fn balance(&self, user_id: UserId) -> Decimal {
        self.ports.wallets.get_balance(user_id).await.unwrap().amount()
    }

    pub async fn plan(&self, user_id: UserId, daily: Decimal, target: Option<Decimal>) -> PlanId {
        let plan = SavingsPlan::create(
            NewSavingsPlan {
                user_id,
                plan_name: "Rent".to_string(),
                daily_amount: ngn(daily),
                target_amount: target.map(ngn),
                auto_save_time: None,
            },
            self.clock.now(),
        )
        .unwrap();
        self.ports.plans.create(&plan).await.unwrap();
        plan.id()
    }

    pub async fn finished_plan(&self, user_id: UserId, saved: Decimal) -> PlanId {
        let now = self.clock.now();
        let plan = SavingsPlan::from_state(PlanState {
            id: PlanId::new(),
            user_id,
            plan_name: "Emergency".to_string(),
            daily_amount: ngn(Decimal::from(100)),
            target_amount: Some(ngn(saved)),
            current_amount: ngn(saved),
            status: PlanStatus::Completed,
            contribution_streak: 0,
            total_contributions: 0,
            auto_save_enabled: false,
            auto_save_time: None,
            last_contribution_date: None,
            last_transaction_reference: None,
            version: 1,
            created_at: now,
            updated_at: now,
        })
        .unwrap();
        self.ports.plans.create(&plan).await.unwrap();
        plan.id()
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<UserId>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = caller {
            builder = builder.header("X-Request-User-Id", user_id.to_string());
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// Decimal out of a serialized `Money`
pub fn amount(money: &Value) -> Decimal {
    let raw = money["amount"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| money["amount"].to_string());
    Decimal::from_str(&raw).unwrap()
}

// =========================================================================
// PostgreSQL
// =========================================================================

/// Connect to `DATABASE_URL` and empty every table
pub async fn setup_test_db() -> PgPool {
    dotenvy::dotenv().ok();
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::query(
        "TRUNCATE TABLE audit_logs, rate_limit_entries, transactions, plan_entries, \
         savings_plans, wallet_entries, wallets, users CASCADE",
    )
    .execute(&pool)
    .await
    .expect("Failed to clean up DB");

    pool
}

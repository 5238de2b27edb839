//! Shared router state

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ConfigError};
use crate::domain::{Currency, Money};
use crate::handlers::{
    AnalyticsHandler, AutoSaveHandler, ContributionHandler, KycHandler, PlanHandler, Ports,
    ReconciliationHandler, SuspendUserHandler, WithdrawalHandler,
};
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::repository::UserRepository;
use crate::services::{ComplianceLimits, ComplianceService};

/// Business limits the handlers are built with
#[derive(Debug, Clone)]
pub struct Policies {
    pub currency: Currency,
    pub compliance: ComplianceLimits,
    /// Per-caller API budget
    pub request_limit: RateLimitPolicy,
    /// Per user and plan contribution attempts
    pub contribution_attempts: RateLimitPolicy,
    pub reconciliation_timeout: Duration,
    pub request_timeout: Duration,
}

impl Policies {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let currency = &config.platform_currency;
        let compliance = ComplianceLimits::from_money(
            limit(config.kyc_basic_limit, currency, "KYC_BASIC_LIMIT")?,
            limit(config.kyc_full_limit, currency, "KYC_FULL_LIMIT")?,
            limit(config.tax_threshold, currency, "TAX_THRESHOLD")?,
        );

        Ok(Self {
            currency: config.platform_currency.clone(),
            compliance,
            request_limit: RateLimitPolicy::per_minute(config.rate_limit_per_minute),
            contribution_attempts: RateLimitPolicy::new(
                config.contribution_attempt_limit,
                config.contribution_attempt_window,
            ),
            reconciliation_timeout: config.reconciliation_timeout,
            request_timeout: Duration::from_secs(30),
        })
    }
}

fn limit(amount: Decimal, currency: &Currency, name: &'static str) -> Result<Money, ConfigError> {
    Money::new(amount, currency.clone()).map_err(|_| ConfigError::InvalidValue(name))
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            currency: Currency::ngn(),
            compliance: ComplianceLimits::naira_defaults(),
            request_limit: RateLimitPolicy::per_minute(100),
            contribution_attempts: RateLimitPolicy::per_minute(5),
            reconciliation_timeout: Duration::from_secs(15 * 60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Handlers and limiter shared by every route
#[derive(Clone)]
pub struct AppState {
    pub contributions: ContributionHandler,
    pub plans: PlanHandler,
    pub withdrawals: WithdrawalHandler,
    pub analytics: AnalyticsHandler,
    pub kyc: KycHandler,
    pub suspensions: SuspendUserHandler,
    pub auto_save: AutoSaveHandler,
    pub reconciliation: ReconciliationHandler,
    pub limiter: Arc<RateLimiter>,
    pub users: Arc<dyn UserRepository>,
    pub request_limit: RateLimitPolicy,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(ports: Ports, limiter: Arc<RateLimiter>, policies: Policies) -> Self {
        let compliance = Arc::new(ComplianceService::new(
            ports.users.clone(),
            policies.compliance.clone(),
        ));

        Self {
            contributions: ContributionHandler::new(ports.clone(), policies.currency.clone())
                .with_rate_limit(limiter.clone(), policies.contribution_attempts),
            plans: PlanHandler::new(ports.clone()),
            withdrawals: WithdrawalHandler::new(
                ports.clone(),
                compliance,
                policies.currency.clone(),
            ),
            analytics: AnalyticsHandler::new(ports.clone(), policies.currency.clone()),
            kyc: KycHandler::new(ports.clone()),
            suspensions: SuspendUserHandler::new(ports.clone()),
            auto_save: AutoSaveHandler::new(ports.clone()),
            reconciliation: ReconciliationHandler::new(
                ports.clone(),
                policies.reconciliation_timeout,
            ),
            limiter,
            users: ports.users,
            request_limit: policies.request_limit,
            request_timeout: policies.request_timeout,
        }
    }
}

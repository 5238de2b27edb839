//! Command Handlers module
//!
//! Use cases that orchestrate business operations. Each handler loads
//! entities through the repository ports, asks the domain and compliance
//! services for permission, and persists in a fixed order that keeps a
//! partial failure recoverable.

mod analytics_handler;
mod auto_save_handler;
mod commands;
mod contribution_handler;
mod kyc_handler;
mod plan_handler;
mod reconciliation_handler;
mod settlement;
mod suspend_user_handler;
mod withdrawal_handler;


pub use analytics_handler::AnalyticsHandler;
pub use auto_save_handler::AutoSaveHandler;
pub use commands::*;
pub use contribution_handler::ContributionHandler;
pub use kyc_handler::KycHandler;
pub use plan_handler::PlanHandler;
pub use reconciliation_handler::ReconciliationHandler;
pub use suspend_user_handler::SuspendUserHandler;
pub use withdrawal_handler::WithdrawalHandler;

use std::sync::Arc;

use crate::audit::AuditSink;
use crate::domain::{Clock, Currency, Money, OperationContext, UserId};
use crate::entities::User;
use crate::error::{AppError, AppResult, RepoContext};
use crate::repository::{
    SavingsRepository, TransactionRepository, UserRepository, WalletRepository,
};
use crate::services::NotificationService;

/// Everything the handlers talk to, injected at construction
#[derive(Clone)]
pub struct Ports {
    pub plans: Arc<dyn SavingsRepository>,
    pub wallets: Arc<dyn WalletRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub notifier: Arc<dyn NotificationService>,
    pub audit: Arc<dyn AuditSink>,
    pub clock: Arc<dyn Clock>,
}

/// The caller must be acting for `user_id`
fn authorize_actor(context: &OperationContext, user_id: UserId) -> AppResult<()> {
    match context.request_user_id {
        Some(actor) if actor == user_id => Ok(()),
        Some(actor) => Err(AppError::authorization(format!(
            "user {} cannot act on behalf of user {}",
            actor, user_id
        ))),
        None => Err(AppError::MissingHeader("X-Request-User-Id".to_string())),
    }
}

/// Load the calling user and require the admin flag
pub async fn require_admin(
    users: &dyn UserRepository,
    context: &OperationContext,
) -> AppResult<User> {
    let actor_id = context
        .request_user_id
        .ok_or_else(|| AppError::MissingHeader("X-Request-User-Id".to_string()))?;

    let actor = users
        .find_by_id(actor_id)
        .await
        .db_context("find_by_id", "users")?
        .ok_or_else(|| AppError::authorization(format!("unknown actor {}", actor_id)))?;

    if !actor.is_admin() {
        return Err(AppError::authorization(format!(
            "user {} is not an administrator",
            actor_id
        )));
    }
    Ok(actor)
}

/// Parse a request amount in the platform currency
fn decode_amount(amount: &str, currency: &Currency) -> AppResult<Money> {
    let money = Money::parse(amount, currency.clone())
        .map_err(|e| AppError::validation("amount", e.to_string()))?;
    if money.is_zero() {
        return Err(AppError::validation("amount", "amount must be greater than zero"));
    }
    Ok(money)
}

/// No new side effect may start once the caller's deadline has passed
fn ensure_not_expired(context: &OperationContext, step: &str) -> AppResult<()> {
    if context.is_expired() {
        tracing::warn!(step = step, correlation_id = ?context.correlation_id, "Deadline exceeded");
        return Err(AppError::DeadlineExceeded(step.to_string()));
    }
    Ok(())
}

//! Contribution Handler
//!
//! Processes a user's daily contribution and offers the matching dry run.

use std::sync::Arc;

use crate::domain::{Currency, OperationContext};
use crate::entities::{Entity, TransactionType};
use crate::error::{AppError, AppResult};
use crate::rate_limit::{RateLimitPolicy, RateLimiter};

use super::settlement::Settlement;
use super::{
    authorize_actor, decode_amount, ContributionResult, Ports, ProcessContributionCommand,
    ValidateContributionResult,
};

/// Handler for user-initiated contributions
#[derive(Clone)]
pub struct ContributionHandler {
    settlement: Settlement,
    currency: Currency,
    attempt_limit: Option<(Arc<RateLimiter>, RateLimitPolicy)>,
}

impl ContributionHandler {
    pub fn new(ports: Ports, currency: Currency) -> Self {
        Self {
            settlement: Settlement::new(ports),
            currency,
            attempt_limit: None,
        }
    }

    /// Cap contribution attempts per user and plan
    pub fn with_rate_limit(mut self, limiter: Arc<RateLimiter>, policy: RateLimitPolicy) -> Self {
        self.attempt_limit = Some((limiter, policy));
        self
    }

    /// Execute the contribution command
    pub async fn execute(
        &self,
        command: ProcessContributionCommand,
        context: &OperationContext,
    ) -> AppResult<ContributionResult> {
        authorize_actor(context, command.user_id)?;
        let amount = decode_amount(&command.amount, &self.currency)?;

        if let Some((limiter, policy)) = &self.attempt_limit {
            let key = format!("contribution:{}:{}", command.user_id, command.plan_id);
            limiter.check(&key, *policy).await?;
        }

        let plan = self
            .settlement
            .preflight(command.user_id, command.plan_id, &amount, command.source)
            .await?;

        let settled = self
            .settlement
            .settle(
                plan,
                amount.clone(),
                command.source,
                TransactionType::Contribution,
                context,
            )
            .await?;

        Ok(ContributionResult {
            transaction_id: settled.transaction.id(),
            reference: settled.transaction.reference().to_string(),
            plan_id: settled.plan.id(),
            amount,
            plan_balance: settled.plan.current_amount().clone(),
            plan_status: settled.plan.status(),
            contribution_streak: settled.plan.contribution_streak(),
            wallet_balance: settled.wallet_balance,
        })
    }

    /// Run every check `execute` runs, without moving money.
    ///
    /// Business rejections come back as `is_valid = false`; storage and
    /// other infrastructure failures are still errors.
    pub async fn validate(
        &self,
        command: ProcessContributionCommand,
        context: &OperationContext,
    ) -> AppResult<ValidateContributionResult> {
        match self.check(&command, context).await {
            Ok(()) => Ok(ValidateContributionResult::valid()),
            Err(e) if is_rejection(&e) => {
                tracing::debug!(
                    user_id = %command.user_id,
                    plan_id = %command.plan_id,
                    error_code = e.error_code(),
                    "Contribution would be rejected"
                );
                Ok(ValidateContributionResult::invalid(e.error_code(), e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn check(
        &self,
        command: &ProcessContributionCommand,
        context: &OperationContext,
    ) -> AppResult<()> {
        authorize_actor(context, command.user_id)?;
        let amount = decode_amount(&command.amount, &self.currency)?;
        self.settlement
            .preflight(command.user_id, command.plan_id, &amount, command.source)
            .await
            .map(|_| ())
    }
}

/// Errors that describe the request rather than the system
fn is_rejection(err: &AppError) -> bool {
    !matches!(
        err,
        AppError::Database { .. }
            | AppError::Internal(_)
            | AppError::DeadlineExceeded(_)
            | AppError::MissingHeader(_)
            | AppError::RateLimitExceeded { .. }
    )
}

//! Analytics Handler
//!
//! Read-only savings summary for one user.

use chrono::Duration;
use rust_decimal::Decimal;

use crate::domain::{Currency, DomainError, Money, OperationContext, UserId};
use crate::entities::{PlanStatus, TransactionStatus};
use crate::error::{AppError, AppResult, RepoContext};

use super::{PlanCounts, PlanProgress, Ports, SavingsAnalytics};

/// Transactions scanned for the trailing contribution count
const RECENT_TRANSACTION_LIMIT: i64 = 1000;
const RECENT_DAYS: i64 = 30;

#[derive(Clone)]
pub struct AnalyticsHandler {
    ports: Ports,
    currency: Currency,
}

impl AnalyticsHandler {
    pub fn new(ports: Ports, currency: Currency) -> Self {
        Self { ports, currency }
    }

    pub async fn execute(
        &self,
        user_id: UserId,
        context: &OperationContext,
    ) -> AppResult<SavingsAnalytics> {
        self.authorize(user_id, context).await?;

        self.ports
            .users
            .find_by_id(user_id)
            .await
            .db_context("find_by_id", "users")?
            .ok_or_else(|| AppError::UserNotFound(user_id.to_string()))?;

        let plans = self
            .ports
            .plans
            .find_by_user_id(user_id)
            .await
            .db_context("find_by_user_id", "savings_plans")?;

        let mut counts = PlanCounts::default();
        let mut total_saved = Money::zero(self.currency.clone());
        let mut daily_commitment = Money::zero(self.currency.clone());
        let mut total_contributions = 0u64;
        let mut longest_streak = 0u32;
        let mut streak_sum = 0u64;

        for plan in &plans {
            counts.record(plan.status());
            total_saved = total_saved.add(plan.current_amount()).map_err(DomainError::from)?;
            if plan.status() == PlanStatus::Active {
                daily_commitment = daily_commitment
                    .add(plan.daily_amount())
                    .map_err(DomainError::from)?;
            }
            total_contributions += u64::from(plan.total_contributions());
            longest_streak = longest_streak.max(plan.contribution_streak());
            streak_sum += u64::from(plan.contribution_streak());
        }

        let average_streak = if plans.is_empty() {
            Decimal::ZERO
        } else {
            (Decimal::from(streak_sum) / Decimal::from(plans.len() as u64)).round_dp(2)
        };

        let since = self.ports.clock.now() - Duration::days(RECENT_DAYS);
        let recent_contributions = self
            .ports
            .transactions
            .find_by_user_id(user_id, RECENT_TRANSACTION_LIMIT)
            .await
            .db_context("find_by_user_id", "transactions")?
            .iter()
            .filter(|t| {
                t.status() == TransactionStatus::Completed
                    && t.transaction_type().is_plan_credit()
                    && t.created_at() >= since
            })
            .count();

        Ok(SavingsAnalytics {
            user_id,
            plan_counts: counts,
            total_saved,
            daily_commitment,
            total_contributions,
            longest_streak,
            average_streak,
            recent_contributions: u32::try_from(recent_contributions).unwrap_or(u32::MAX),
            plans: plans.iter().map(PlanProgress::from).collect(),
        })
    }

    /// The user themself or an administrator
    async fn authorize(&self, user_id: UserId, context: &OperationContext) -> AppResult<()> {
        match context.request_user_id {
            Some(actor) if actor == user_id => Ok(()),
            Some(_) => super::require_admin(self.ports.users.as_ref(), context)
                .await
                .map(|_| ()),
            None => Err(AppError::MissingHeader("X-Request-User-Id".to_string())),
        }
    }
}

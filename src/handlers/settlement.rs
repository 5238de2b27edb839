//! Contribution settlement
//!
//! Shared by the interactive and scheduled contribution paths. The order is
//! fixed: pending transaction, wallet debit, plan update, completion. Nothing
//! is rolled back when a later step fails; the pending row stays behind as
//! the anchor the reconciliation sweep works from.

use std::time::Duration;

use crate::domain::{Money, OperationContext, PlanId, ReferenceKind, TransactionReference, UserId};
use crate::entities::{Entity, PlanStatus, SavingsPlan, Transaction, TransactionSource, TransactionType};
use crate::error::{AppError, AppResult, RepoContext};
use crate::repository::RepositoryError;
use crate::services::{
    ensure_account_open, notify_best_effort, ContributionCheck, ContributionValidator, Notification,
};

use super::{ensure_not_expired, Ports};

/// Plan writes tried before giving up on a version conflict
const PLAN_UPDATE_ATTEMPTS: u32 = 3;
const PLAN_UPDATE_BACKOFF_MS: u64 = 50;

/// What one settlement produced
#[derive(Debug, Clone)]
pub(crate) struct Settled {
    pub transaction: Transaction,
    pub plan: SavingsPlan,
    pub wallet_balance: Option<Money>,
}

#[derive(Clone)]
pub(crate) struct Settlement {
    ports: Ports,
    validator: ContributionValidator,
}

impl Settlement {
    pub fn new(ports: Ports) -> Self {
        Self {
            ports,
            validator: ContributionValidator::new(),
        }
    }

    pub fn ports(&self) -> &Ports {
        &self.ports
    }

    pub async fn load_plan(&self, plan_id: PlanId) -> AppResult<SavingsPlan> {
        self.ports
            .plans
            .find_by_id(plan_id)
            .await
            .db_context("find_by_id", "savings_plans")?
            .ok_or_else(|| AppError::PlanNotFound(plan_id.to_string()))
    }

    /// Everything a contribution must pass before money moves.
    /// Used unchanged by the dry run, so both always agree.
    pub async fn preflight(
        &self,
        user_id: UserId,
        plan_id: PlanId,
        amount: &Money,
        source: TransactionSource,
    ) -> AppResult<SavingsPlan> {
        let plan = self.load_plan(plan_id).await?;

        let wallet_balance = if source == TransactionSource::Wallet {
            Some(
                self.ports
                    .wallets
                    .get_balance(user_id)
                    .await
                    .db_context("get_balance", "wallets")?,
            )
        } else {
            None
        };

        self.validator.validate(&ContributionCheck {
            user_id,
            amount,
            source,
            plan: &plan,
            wallet_balance: wallet_balance.as_ref(),
        })?;

        // Suspended or closed accounts stop saving, scheduled or not
        ensure_account_open(self.ports.users.as_ref(), user_id).await?;

        Ok(plan)
    }

    /// Move `amount` into `plan`
    pub async fn settle(
        &self,
        plan: SavingsPlan,
        amount: Money,
        source: TransactionSource,
        transaction_type: TransactionType,
        context: &OperationContext,
    ) -> AppResult<Settled> {
        ensure_not_expired(context, "save_transaction")?;

        let user_id = plan.user_id();
        let plan_id = plan.id();
        let kind = match transaction_type {
            TransactionType::AutoSave => ReferenceKind::AutoSave,
            _ => ReferenceKind::Contribution,
        };
        let reference = TransactionReference::generate(kind);

        // 1. Pending row first: the recovery anchor
        let pending = Transaction::new_pending(
            user_id,
            Some(plan_id),
            amount.clone(),
            transaction_type,
            source,
            reference.as_str(),
            self.ports.clock.now(),
        );
        self.ports
            .transactions
            .save(&pending)
            .await
            .db_context("save", "transactions")?;

        tracing::info!(
            user_id = %user_id,
            plan_id = %plan_id,
            reference = %reference,
            amount = %amount,
            correlation_id = ?context.correlation_id,
            "Contribution started"
        );

        // 2. Debit
        let wallet_balance = if source == TransactionSource::Wallet {
            match self
                .ports
                .wallets
                .debit(user_id, &amount, reference.as_str())
                .await
            {
                Ok(balance) => Some(balance),
                Err(RepositoryError::InsufficientBalance {
                    available,
                    required,
                }) => {
                    // Nothing moved, so the row can be closed right away
                    self.fail_quietly(&pending, "insufficient wallet balance").await;
                    return Err(AppError::InsufficientFunds {
                        available,
                        required,
                    });
                }
                Err(e) => return Err(AppError::from_repository(e, "debit", "wallets")),
            }
        } else {
            None
        };

        // 3. Plan
        let plan = self
            .apply_contribution(plan, &amount, reference.as_str())
            .await?;

        // 4. Complete
        let completed = pending.complete(self.ports.clock.now())?;
        self.ports
            .transactions
            .update(&completed)
            .await
            .db_context("update", "transactions")?;

        tracing::info!(
            user_id = %user_id,
            plan_id = %plan_id,
            reference = %reference,
            plan_status = %plan.status(),
            streak = plan.contribution_streak(),
            "Contribution completed"
        );

        notify_best_effort(
            self.ports.notifier.as_ref(),
            Notification::ContributionReceived {
                user_id,
                plan_id,
                amount,
                reference: reference.into_string(),
            },
        )
        .await;
        if plan.status() == PlanStatus::Completed {
            notify_best_effort(
                self.ports.notifier.as_ref(),
                Notification::PlanCompleted { user_id, plan_id },
            )
            .await;
        }

        Ok(Settled {
            transaction: completed,
            plan,
            wallet_balance,
        })
    }

    /// Versioned plan write, reloading and re-applying on conflict
    async fn apply_contribution(
        &self,
        mut plan: SavingsPlan,
        amount: &Money,
        reference: &str,
    ) -> AppResult<SavingsPlan> {
        let plan_id = plan.id();

        for attempt in 1..=PLAN_UPDATE_ATTEMPTS {
            let next = plan.make_contribution(amount, reference, self.ports.clock.now())?;

            match self.ports.plans.update(&next).await {
                Ok(stored) => return Ok(stored),
                Err(e) if e.is_version_conflict() => {
                    tracing::warn!(
                        plan_id = %plan_id,
                        reference = %reference,
                        attempt,
                        "Plan version conflict"
                    );
                    if attempt == PLAN_UPDATE_ATTEMPTS {
                        break;
                    }
                    let backoff = PLAN_UPDATE_BACKOFF_MS * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    plan = self.load_plan(plan_id).await?;
                }
                Err(e) => return Err(AppError::from_repository(e, "update", "savings_plans")),
            }
        }

        Err(AppError::ConcurrentWithdrawal {
            entity: SavingsPlan::entity_type().to_string(),
            id: plan_id.to_string(),
        })
    }

    async fn fail_quietly(&self, pending: &Transaction, reason: &str) {
        let result = match pending.fail(reason, self.ports.clock.now()) {
            Ok(failed) => self
                .ports
                .transactions
                .update(&failed)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = result {
            tracing::error!(
                reference = %pending.reference(),
                error = %e,
                "Failed to close transaction, left for reconciliation"
            );
        }
    }
}

//! Withdrawal Handler
//!
//! Moves savings out of a completed or cancelled plan into the owner's
//! wallet. Order: pending transaction, plan update, wallet credit,
//! completion. A plan that was reduced but whose wallet credit never landed
//! is finished by the reconciliation sweep.

use std::sync::Arc;

use crate::domain::{Currency, OperationContext, ReferenceKind, TransactionReference};
use crate::entities::{Entity, Transaction, TransactionSource, TransactionType};
use crate::error::{AppError, AppResult, RepoContext};
use crate::services::{notify_best_effort, ComplianceService, Notification};

use super::{
    authorize_actor, decode_amount, ensure_not_expired, Ports, WithdrawFromPlanCommand,
    WithdrawalResult,
};

#[derive(Clone)]
pub struct WithdrawalHandler {
    ports: Ports,
    compliance: Arc<ComplianceService>,
    currency: Currency,
}

impl WithdrawalHandler {
    pub fn new(ports: Ports, compliance: Arc<ComplianceService>, currency: Currency) -> Self {
        Self {
            ports,
            compliance,
            currency,
        }
    }

    pub async fn execute(
        &self,
        command: WithdrawFromPlanCommand,
        context: &OperationContext,
    ) -> AppResult<WithdrawalResult> {
        authorize_actor(context, command.user_id)?;
        let amount = decode_amount(&command.amount, &self.currency)?;

        let plan = self
            .ports
            .plans
            .find_by_id(command.plan_id)
            .await
            .db_context("find_by_id", "savings_plans")?
            .ok_or_else(|| AppError::PlanNotFound(command.plan_id.to_string()))?;

        if plan.user_id() != command.user_id {
            return Err(AppError::authorization(format!(
                "plan {} does not belong to user {}",
                command.plan_id, command.user_id
            )));
        }

        // Pure state change first, so a refused withdrawal has no side effects
        let reference = TransactionReference::generate(ReferenceKind::Withdrawal);
        let reduced = plan.withdraw(&amount, reference.as_str(), self.ports.clock.now())?;

        self.compliance
            .check_compliance(command.user_id, &amount)
            .await?;
        let tax_warning = self.compliance.tax_warning(&amount);

        ensure_not_expired(context, "save_transaction")?;

        let pending = Transaction::new_pending(
            command.user_id,
            Some(command.plan_id),
            amount.clone(),
            TransactionType::Withdrawal,
            TransactionSource::Wallet,
            reference.as_str(),
            self.ports.clock.now(),
        );
        self.ports
            .transactions
            .save(&pending)
            .await
            .db_context("save", "transactions")?;

        tracing::info!(
            user_id = %command.user_id,
            plan_id = %command.plan_id,
            reference = %reference,
            amount = %amount,
            correlation_id = ?context.correlation_id,
            "Withdrawal started"
        );

        let stored_plan = self
            .ports
            .plans
            .update(&reduced)
            .await
            .db_context("update", "savings_plans")?;

        let wallet_balance = self
            .ports
            .wallets
            .credit(command.user_id, &amount, reference.as_str())
            .await
            .db_context("credit", "wallets")?;

        let completed = pending.complete(self.ports.clock.now())?;
        self.ports
            .transactions
            .update(&completed)
            .await
            .db_context("update", "transactions")?;

        if let Some(warning) = &tax_warning {
            tracing::info!(user_id = %command.user_id, reference = %reference, "{}", warning);
        }
        tracing::info!(
            user_id = %command.user_id,
            plan_id = %command.plan_id,
            reference = %reference,
            "Withdrawal completed"
        );

        notify_best_effort(
            self.ports.notifier.as_ref(),
            Notification::WithdrawalProcessed {
                user_id: command.user_id,
                plan_id: command.plan_id,
                amount: amount.clone(),
                reference: reference.as_str().to_string(),
            },
        )
        .await;

        Ok(WithdrawalResult {
            transaction_id: completed.id(),
            reference: reference.into_string(),
            plan_id: stored_plan.id(),
            amount,
            plan_balance: stored_plan.current_amount().clone(),
            wallet_balance,
            tax_warning,
        })
    }
}

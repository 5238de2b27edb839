//! Auto-save Handler
//!
//! Scheduled sweep over plans whose auto-save time has come. One plan's
//! failure never aborts the sweep; the report lists both outcomes.

use tokio::sync::watch;

use crate::domain::{Money, OperationContext};
use crate::entities::{Entity, SavingsPlan, TransactionSource, TransactionType};
use crate::error::{AppResult, RepoContext};
use crate::services::{notify_best_effort, Notification};

use super::settlement::{Settled, Settlement};
use super::{AutoSaveFailure, AutoSaveReport, AutoSaveSuccess, Ports};

#[derive(Clone)]
pub struct AutoSaveHandler {
    settlement: Settlement,
}

impl AutoSaveHandler {
    pub fn new(ports: Ports) -> Self {
        Self {
            settlement: Settlement::new(ports),
        }
    }

    /// Run one sweep. A raised `shutdown` flag stops the sweep between
    /// plans, never in the middle of one.
    pub async fn execute(
        &self,
        context: &OperationContext,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> AppResult<AutoSaveReport> {
        let ports = self.settlement.ports();
        let now = ports.clock.now();

        let due: Vec<SavingsPlan> = ports
            .plans
            .find_plans_for_auto_save()
            .await
            .db_context("find_plans_for_auto_save", "savings_plans")?
            .into_iter()
            .filter(|plan| plan.is_auto_save_due(now))
            .collect();

        tracing::info!(due = due.len(), "Auto-save sweep started");

        let mut report = AutoSaveReport::default();
        for plan in due {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                tracing::info!(processed = report.processed_count, "Auto-save sweep interrupted");
                report.cancelled = true;
                break;
            }

            report.processed_count += 1;
            let plan_id = plan.id();
            let user_id = plan.user_id();

            match self.save_plan(plan, context).await {
                Ok(settled) => report.successful_transactions.push(AutoSaveSuccess {
                    plan_id,
                    user_id,
                    transaction_id: settled.transaction.id(),
                    reference: settled.transaction.reference().to_string(),
                }),
                Err(e) => {
                    tracing::warn!(
                        plan_id = %plan_id,
                        user_id = %user_id,
                        error = %e,
                        "Auto-save failed for plan"
                    );
                    notify_best_effort(
                        ports.notifier.as_ref(),
                        Notification::AutoSaveFailed {
                            user_id,
                            plan_id,
                            reason: e.to_string(),
                        },
                    )
                    .await;
                    report.failed_transactions.push(AutoSaveFailure {
                        plan_id,
                        user_id,
                        reason: e.to_string(),
                        error_code: e.error_code().to_string(),
                    });
                }
            }
        }

        tracing::info!(
            processed = report.processed_count,
            succeeded = report.successful_transactions.len(),
            failed = report.failed_transactions.len(),
            "Auto-save sweep finished"
        );
        Ok(report)
    }

    async fn save_plan(&self, plan: SavingsPlan, context: &OperationContext) -> AppResult<Settled> {
        let amount: Money = plan.daily_amount().clone();

        // Same admission as an interactive contribution, against fresh state
        let plan = self
            .settlement
            .preflight(plan.user_id(), plan.id(), &amount, TransactionSource::Wallet)
            .await?;

        self.settlement
            .settle(
                plan,
                amount,
                TransactionSource::Wallet,
                TransactionType::AutoSave,
                context,
            )
            .await
    }
}

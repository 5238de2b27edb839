//! Reconciliation Handler
//!
//! Settles transactions left pending by an interrupted movement. The
//! references recorded by the plan and wallet stores tell how far the
//! movement got:
//!
//! | type                    | plan applied | wallet entry | outcome                      |
//! |-------------------------|--------------|--------------|------------------------------|
//! | contribution / auto-save| yes          | any          | completed                    |
//! | contribution / auto-save| no           | yes          | debit reversed, failed       |
//! | contribution / auto-save| no           | no           | failed                       |
//! | withdrawal              | yes          | yes          | completed                    |
//! | withdrawal              | yes          | no           | wallet credited, completed   |
//! | withdrawal              | no           | any          | failed                       |
//!
//! Only rows older than the timeout are touched, which keeps the sweep away
//! from movements that are still in flight.

use std::time::Duration;

use crate::audit::{record_best_effort, AuditAction, AuditEntry};
use crate::domain::{OperationContext, TransactionReference};
use crate::entities::{Transaction, TransactionSource, TransactionType};
use crate::error::{AppError, AppResult, RepoContext};

use super::{Ports, ReconciliationReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Reversed,
    Failed,
}

#[derive(Clone)]
pub struct ReconciliationHandler {
    ports: Ports,
    timeout: Duration,
}

impl ReconciliationHandler {
    pub fn new(ports: Ports, timeout: Duration) -> Self {
        Self { ports, timeout }
    }

    pub async fn execute(&self, context: &OperationContext) -> AppResult<ReconciliationReport> {
        let timeout = chrono::Duration::from_std(self.timeout)
            .map_err(|e| AppError::Internal(format!("reconciliation timeout: {}", e)))?;
        let cutoff = self.ports.clock.now() - timeout;

        let pending = self
            .ports
            .transactions
            .find_pending_older_than(cutoff)
            .await
            .db_context("find_pending_older_than", "transactions")?;

        let mut report = ReconciliationReport::default();
        for transaction in &pending {
            report.examined += 1;
            match self.reconcile(transaction, context).await {
                Ok(Outcome::Completed) => report.completed += 1,
                Ok(Outcome::Reversed) => report.reversed += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Err(e) => {
                    tracing::error!(
                        reference = %transaction.reference(),
                        error = %e,
                        "Could not reconcile transaction"
                    );
                    report.record_issue(transaction, e);
                }
            }
        }

        if report.examined > 0 {
            tracing::info!(
                examined = report.examined,
                completed = report.completed,
                reversed = report.reversed,
                failed = report.failed,
                errors = report.errors.len(),
                "Reconciliation finished"
            );
        }
        Ok(report)
    }

    async fn reconcile(
        &self,
        transaction: &Transaction,
        context: &OperationContext,
    ) -> AppResult<Outcome> {
        let reference = transaction.reference();

        match transaction.transaction_type() {
            TransactionType::Contribution | TransactionType::AutoSave => {
                if self.plan_applied(reference).await? {
                    self.complete(transaction).await?;
                    return Ok(Outcome::Completed);
                }
                if self.wallet_moved(reference).await? {
                    self.reverse(transaction, context).await?;
                    self.fail(transaction, "plan update never applied, debit reversed")
                        .await?;
                    return Ok(Outcome::Reversed);
                }
                self.fail(transaction, "no side effects were applied").await?;
                Ok(Outcome::Failed)
            }
            TransactionType::Withdrawal => {
                if !self.plan_applied(reference).await? {
                    self.fail(transaction, "plan was never debited").await?;
                    return Ok(Outcome::Failed);
                }
                if !self.wallet_moved(reference).await? {
                    self.ports
                        .wallets
                        .credit(transaction.user_id(), transaction.amount(), reference)
                        .await
                        .db_context("credit", "wallets")?;
                    tracing::info!(reference = %reference, "Withdrawal credit replayed");
                }
                self.complete(transaction).await?;
                Ok(Outcome::Completed)
            }
            TransactionType::Reversal => {
                if self.wallet_moved(reference).await? {
                    self.complete(transaction).await?;
                    Ok(Outcome::Completed)
                } else {
                    self.fail(transaction, "reversal credit never applied").await?;
                    Ok(Outcome::Failed)
                }
            }
        }
    }

    /// Credit the debit back and record the compensating transaction
    async fn reverse(&self, original: &Transaction, context: &OperationContext) -> AppResult<()> {
        let reversal_reference = TransactionReference::reversal_of(original.reference());

        self.ports
            .wallets
            .credit(
                original.user_id(),
                original.amount(),
                reversal_reference.as_str(),
            )
            .await
            .db_context("credit", "wallets")?;

        // A previous sweep may have stored it before being interrupted
        let existing = self
            .ports
            .transactions
            .find_by_reference(reversal_reference.as_str())
            .await
            .db_context("find_by_reference", "transactions")?;

        if existing.is_none() {
            let now = self.ports.clock.now();
            let reversal = Transaction::new_pending(
                original.user_id(),
                original.plan_id(),
                original.amount().clone(),
                TransactionType::Reversal,
                TransactionSource::Wallet,
                reversal_reference.as_str(),
                now,
            )
            .complete(now)?;
            self.ports
                .transactions
                .save(&reversal)
                .await
                .db_context("save", "transactions")?;
        }

        tracing::warn!(
            user_id = %original.user_id(),
            reference = %original.reference(),
            reversal = %reversal_reference,
            amount = %original.amount(),
            "Debit reversed"
        );

        record_best_effort(
            self.ports.audit.as_ref(),
            AuditEntry::new(
                AuditAction::TransactionReversed,
                "Transaction",
                original.id(),
                format!(
                    "Debit {} of {} reversed under {}",
                    original.reference(),
                    original.amount(),
                    reversal_reference
                ),
            )
            .context(context)
            .details(&serde_json::json!({
                "user_id": original.user_id(),
                "reference": original.reference(),
                "reversal_reference": reversal_reference,
                "amount": original.amount(),
            })),
        )
        .await;

        Ok(())
    }

    async fn plan_applied(&self, reference: &str) -> AppResult<bool> {
        self.ports
            .plans
            .has_applied(reference)
            .await
            .db_context("has_applied", "plan_entries")
    }

    async fn wallet_moved(&self, reference: &str) -> AppResult<bool> {
        self.ports
            .wallets
            .has_entry(reference)
            .await
            .db_context("has_entry", "wallet_entries")
    }

    async fn complete(&self, transaction: &Transaction) -> AppResult<()> {
        let completed = transaction.complete(self.ports.clock.now())?;
        self.ports
            .transactions
            .update(&completed)
            .await
            .db_context("update", "transactions")?;
        tracing::info!(reference = %transaction.reference(), "Pending transaction completed");
        Ok(())
    }

    async fn fail(&self, transaction: &Transaction, reason: &str) -> AppResult<()> {
        let failed = transaction.fail(reason, self.ports.clock.now())?;
        self.ports
            .transactions
            .update(&failed)
            .await
            .db_context("update", "transactions")?;
        tracing::info!(reference = %transaction.reference(), reason = reason, "Pending transaction failed");
        Ok(())
    }
}

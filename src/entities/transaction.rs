//! Transaction entity
//!
//! Two-phase record of a money movement. A transaction is written as
//! `pending` before any balance changes and is then moved to `completed` or
//! `failed`; rows are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::{DomainError, Money, PlanId, TransactionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Contribution,
    AutoSave,
    Withdrawal,
    Reversal,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Contribution => "contribution",
            TransactionType::AutoSave => "auto_save",
            TransactionType::Withdrawal => "withdrawal",
            TransactionType::Reversal => "reversal",
        }
    }

    /// Movements that take money from the wallet into a plan
    pub fn is_plan_credit(&self) -> bool {
        matches!(self, TransactionType::Contribution | TransactionType::AutoSave)
    }
}

impl FromStr for TransactionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contribution" => Ok(TransactionType::Contribution),
            "auto_save" => Ok(TransactionType::AutoSave),
            "withdrawal" => Ok(TransactionType::Withdrawal),
            "reversal" => Ok(TransactionType::Reversal),
            other => Err(DomainError::InvalidInput(format!(
                "unknown transaction type '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the money for a contribution comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    Wallet,
    BankTransfer,
    DebitCard,
}

impl TransactionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionSource::Wallet => "wallet",
            TransactionSource::BankTransfer => "bank_transfer",
            TransactionSource::DebitCard => "debit_card",
        }
    }
}

impl FromStr for TransactionSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wallet" => Ok(TransactionSource::Wallet),
            "bank_transfer" => Ok(TransactionSource::BankTransfer),
            "debit_card" => Ok(TransactionSource::DebitCard),
            other => Err(DomainError::InvalidInput(format!(
                "unknown transaction source '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransactionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(DomainError::InvalidInput(format!(
                "unknown transaction status '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    user_id: UserId,
    plan_id: Option<PlanId>,
    amount: Money,
    transaction_type: TransactionType,
    source: TransactionSource,
    reference: String,
    status: TransactionStatus,
    failure_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Transaction {
    /// New pending transaction
    pub fn new_pending(
        user_id: UserId,
        plan_id: Option<PlanId>,
        amount: Money,
        transaction_type: TransactionType,
        source: TransactionSource,
        reference: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            plan_id,
            amount,
            transaction_type,
            source,
            reference: reference.into(),
            status: TransactionStatus::Pending,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild from a stored row
    #[allow(clippy::too_many_arguments)]
    pub fn from_state(
        id: TransactionId,
        user_id: UserId,
        plan_id: Option<PlanId>,
        amount: Money,
        transaction_type: TransactionType,
        source: TransactionSource,
        reference: String,
        status: TransactionStatus,
        failure_reason: Option<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            plan_id,
            amount,
            transaction_type,
            source,
            reference,
            status,
            failure_reason,
            created_at,
            updated_at,
        }
    }

    pub fn complete(&self, now: DateTime<Utc>) -> Result<Transaction, DomainError> {
        self.settle(TransactionStatus::Completed, None, now)
    }

    pub fn fail(
        &self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Transaction, DomainError> {
        self.settle(TransactionStatus::Failed, Some(reason.into()), now)
    }

    fn settle(
        &self,
        to: TransactionStatus,
        failure_reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Transaction, DomainError> {
        if self.status != TransactionStatus::Pending {
            return Err(DomainError::InvalidTransactionState {
                current: self.status.to_string(),
                attempted: to.to_string(),
            });
        }

        let mut tx = self.clone();
        tx.status = to;
        tx.failure_reason = failure_reason;
        tx.updated_at = now;
        Ok(tx)
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn plan_id(&self) -> Option<PlanId> {
        self.plan_id
    }

    pub fn amount(&self) -> &Money {
        &self.amount
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction_type
    }

    pub fn source(&self) -> TransactionSource {
        self.source
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

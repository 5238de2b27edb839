//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use thiserror::Error;

use super::{Money, MoneyError};

/// Business rule violations raised by entities.
///
/// These errors are independent of the web/infrastructure layer and are
/// converted into `AppError` at the use-case boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// A plan lifecycle transition that the state machine does not allow
    #[error("Cannot move plan from {current_state} to {attempted_state}: {reason}")]
    InvalidPlanState {
        current_state: String,
        attempted_state: String,
        reason: String,
    },

    /// A contribution rejected by the plan itself
    #[error("Invalid contribution: {reason}")]
    InvalidContribution {
        reason: String,
        expected: Option<Money>,
        actual: Option<Money>,
    },

    /// Debit would take a balance below zero
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { available: Money, required: Money },

    /// KYC tier change that skips or reverses a step
    #[error("Invalid KYC transition from {current} to {requested}")]
    InvalidKycTransition { current: String, requested: String },

    /// User lifecycle rule violation
    #[error("Invalid user state: {0}")]
    InvalidUserState(String),

    /// Transaction status change outside pending → completed|failed
    #[error("Transaction is {current}, cannot mark {attempted}")]
    InvalidTransactionState { current: String, attempted: String },

    /// Malformed value handed to an entity
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Money(#[from] MoneyError),
}

impl DomainError {
    pub fn invalid_plan_state(
        current_state: impl Into<String>,
        attempted_state: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidPlanState {
            current_state: current_state.into(),
            attempted_state: attempted_state.into(),
            reason: reason.into(),
        }
    }

    pub fn insufficient_funds(available: Money, required: Money) -> Self {
        Self::InsufficientFunds {
            available,
            required,
        }
    }
}

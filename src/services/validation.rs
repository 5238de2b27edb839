//! Contribution validation
//!
//! Pure admission check shared by the validate-only and the processing
//! paths, so a preview can never disagree with the real outcome.

use serde::Serialize;

use crate::domain::{Money, PlanId, UserId};
use crate::entities::{PlanStatus, SavingsPlan, TransactionSource};
use crate::error::AppError;

/// Why a contribution was refused
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContributionRejection {
    #[error("plan does not belong to user")]
    PlanNotOwned { plan_id: PlanId, user_id: UserId },

    #[error("plan is {status}, contributions require an active plan")]
    PlanNotActive { status: PlanStatus },

    #[error("amount must equal the plan's daily amount")]
    AmountMismatch { expected: Money, actual: Money },

    #[error("contribution would exceed the target amount")]
    ExceedsTarget {
        target: Money,
        current: Money,
        amount: Money,
    },

    #[error("insufficient wallet balance")]
    InsufficientWalletBalance { available: Money, required: Money },
}

impl From<ContributionRejection> for AppError {
    fn from(rejection: ContributionRejection) -> Self {
        let reason = rejection.to_string();
        match rejection {
            ContributionRejection::PlanNotOwned { .. } => AppError::Authorization { reason },
            ContributionRejection::InsufficientWalletBalance {
                available,
                required,
            } => AppError::InsufficientFunds {
                available,
                required,
            },
            ContributionRejection::PlanNotActive { .. } => AppError::InvalidContribution {
                reason,
                expected: None,
                actual: None,
            },
            ContributionRejection::AmountMismatch { expected, actual } => {
                AppError::InvalidContribution {
                    reason,
                    expected: Some(expected),
                    actual: Some(actual),
                }
            }
            ContributionRejection::ExceedsTarget {
                target,
                current,
                amount,
            } => AppError::InvalidContribution {
                reason,
                expected: target.subtract(&current).ok(),
                actual: Some(amount),
            },
        }
    }
}

/// Snapshot a contribution is judged against
#[derive(Debug, Clone, Copy)]
pub struct ContributionCheck<'a> {
    pub user_id: UserId,
    pub amount: &'a Money,
    pub source: TransactionSource,
    pub plan: &'a SavingsPlan,
    /// Required when `source` is the wallet
    pub wallet_balance: Option<&'a Money>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContributionValidator;

impl ContributionValidator {
    pub fn new() -> Self {
        Self
    }

    /// Ordered checks, first failure wins:
    /// ownership, plan status, exact daily amount, target ceiling, wallet funds.
    pub fn validate(&self, check: &ContributionCheck<'_>) -> Result<(), ContributionRejection> {
        let plan = check.plan;

        if plan.user_id() != check.user_id {
            return Err(ContributionRejection::PlanNotOwned {
                plan_id: crate::entities::Entity::id(plan),
                user_id: check.user_id,
            });
        }

        if plan.status() != PlanStatus::Active {
            return Err(ContributionRejection::PlanNotActive {
                status: plan.status(),
            });
        }

        // A different currency is never equal to the daily amount
        if !check.amount.equals(plan.daily_amount()).unwrap_or(false) {
            return Err(ContributionRejection::AmountMismatch {
                expected: plan.daily_amount().clone(),
                actual: check.amount.clone(),
            });
        }

        if let Some(target) = plan.target_amount() {
            let exceeds = plan
                .current_amount()
                .add(check.amount)
                .and_then(|total| total.is_greater_than(target))
                .unwrap_or(true);
            if exceeds {
                return Err(ContributionRejection::ExceedsTarget {
                    target: target.clone(),
                    current: plan.current_amount().clone(),
                    amount: check.amount.clone(),
                });
            }
        }

        if check.source == TransactionSource::Wallet {
            let available = check
                .wallet_balance
                .cloned()
                .unwrap_or_else(|| Money::zero(check.amount.currency().clone()));
            let short = check.amount.is_greater_than(&available).unwrap_or(true);
            if short {
                return Err(ContributionRejection::InsufficientWalletBalance {
                    available,
                    required: check.amount.clone(),
                });
            }
        }

        Ok(())
    }
}

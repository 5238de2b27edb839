//! Command definitions
//!
//! Commands represent intentions to change the system state. Amounts travel
//! as strings so no precision is lost before they reach `Money`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Money, PlanId, TransactionId, UserId};
use crate::entities::{
    AutoSaveTime, Entity, KycStatus, KycTier, PlanStatus, SavingsPlan, Transaction,
    TransactionSource, User,
};

// =========================================================================
// Contributions
// =========================================================================

/// Command to pay one daily amount into a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessContributionCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    /// Amount to contribute (as string for precise decimal)
    pub amount: String,
    pub source: TransactionSource,
}

impl ProcessContributionCommand {
    pub fn new(user_id: UserId, plan_id: PlanId, amount: impl Into<String>) -> Self {
        Self {
            user_id,
            plan_id,
            amount: amount.into(),
            source: TransactionSource::Wallet,
        }
    }

    pub fn with_source(mut self, source: TransactionSource) -> Self {
        self.source = source;
        self
    }
}

/// Result of a settled contribution
#[derive(Debug, Clone, Serialize)]
pub struct ContributionResult {
    pub transaction_id: TransactionId,
    pub reference: String,
    pub plan_id: PlanId,
    pub amount: Money,
    pub plan_balance: Money,
    pub plan_status: PlanStatus,
    pub contribution_streak: u32,
    /// Present for wallet-sourced contributions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_balance: Option<Money>,
}

/// Dry-run verdict for a contribution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidateContributionResult {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ValidateContributionResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            error_code: None,
            reason: None,
        }
    }

    pub fn invalid(error_code: &str, reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error_code: Some(error_code.to_string()),
            reason: Some(reason.into()),
        }
    }
}

// =========================================================================
// Auto-save
// =========================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AutoSaveSuccess {
    pub plan_id: PlanId,
    pub user_id: UserId,
    pub transaction_id: TransactionId,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoSaveFailure {
    pub plan_id: PlanId,
    pub user_id: UserId,
    pub reason: String,
    pub error_code: String,
}

/// Partial-success report of one auto-save sweep
#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoSaveReport {
    pub processed_count: usize,
    pub successful_transactions: Vec<AutoSaveSuccess>,
    pub failed_transactions: Vec<AutoSaveFailure>,
    /// The sweep stopped early on shutdown
    pub cancelled: bool,
}

// =========================================================================
// Plan lifecycle
// =========================================================================

/// One transition requested by the plan owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlanAction {
    Pause,
    Resume,
    Cancel,
    UpdateAutoSave {
        enabled: bool,
        #[serde(default)]
        time: Option<AutoSaveTime>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSavingsPlanCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub action: PlanAction,
}

impl UpdateSavingsPlanCommand {
    pub fn new(user_id: UserId, plan_id: PlanId, action: PlanAction) -> Self {
        Self {
            user_id,
            plan_id,
            action,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanUpdateResult {
    pub plan: SavingsPlan,
    pub audit_message: String,
}

// =========================================================================
// Administration
// =========================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateKycStatusCommand {
    pub user_id: UserId,
    pub kyc_tier: KycTier,
    /// Required when the tier does not change
    #[serde(default)]
    pub kyc_status: Option<KycStatus>,
}

impl UpdateKycStatusCommand {
    pub fn new(user_id: UserId, kyc_tier: KycTier) -> Self {
        Self {
            user_id,
            kyc_tier,
            kyc_status: None,
        }
    }

    pub fn with_status(mut self, status: KycStatus) -> Self {
        self.kyc_status = Some(status);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendUserCommand {
    pub user_id: UserId,
    pub reason: String,
}

impl SuspendUserCommand {
    pub fn new(user_id: UserId, reason: impl Into<String>) -> Self {
        Self {
            user_id,
            reason: reason.into(),
        }
    }
}

/// Result of an administrative change to a user
#[derive(Debug, Clone, Serialize)]
pub struct UserUpdateResult {
    pub user: User,
    pub audit_message: String,
}

// =========================================================================
// Withdrawals
// =========================================================================

/// Command to move savings from a finished plan back to the wallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawFromPlanCommand {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub amount: String,
}

impl WithdrawFromPlanCommand {
    pub fn new(user_id: UserId, plan_id: PlanId, amount: impl Into<String>) -> Self {
        Self {
            user_id,
            plan_id,
            amount: amount.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalResult {
    pub transaction_id: TransactionId,
    pub reference: String,
    pub plan_id: PlanId,
    pub amount: Money,
    pub plan_balance: Money,
    pub wallet_balance: Money,
    /// Advisory, the withdrawal went through regardless
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_warning: Option<String>,
}

// =========================================================================
// Analytics
// =========================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub active: u32,
    pub paused: u32,
    pub completed: u32,
    pub cancelled: u32,
}

impl PlanCounts {
    pub fn record(&mut self, status: PlanStatus) {
        match status {
            PlanStatus::Active => self.active += 1,
            PlanStatus::Paused => self.paused += 1,
            PlanStatus::Completed => self.completed += 1,
            PlanStatus::Cancelled => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.active + self.paused + self.completed + self.cancelled
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanProgress {
    pub plan_id: PlanId,
    pub plan_name: String,
    pub status: PlanStatus,
    pub current_amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_amount: Option<Money>,
    pub progress_percentage: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_to_target: Option<Money>,
    pub contribution_streak: u32,
}

impl From<&SavingsPlan> for PlanProgress {
    fn from(plan: &SavingsPlan) -> Self {
        Self {
            plan_id: plan.id(),
            plan_name: plan.plan_name().to_string(),
            status: plan.status(),
            current_amount: plan.current_amount().clone(),
            target_amount: plan.target_amount().cloned(),
            progress_percentage: plan.progress_percentage(),
            remaining_to_target: plan.remaining_to_target(),
            contribution_streak: plan.contribution_streak(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SavingsAnalytics {
    pub user_id: UserId,
    pub plan_counts: PlanCounts,
    pub total_saved: Money,
    /// Sum of daily amounts over active plans
    pub daily_commitment: Money,
    pub total_contributions: u64,
    pub longest_streak: u32,
    pub average_streak: Decimal,
    /// Completed contributions in the trailing 30 days
    pub recent_contributions: u32,
    pub plans: Vec<PlanProgress>,
}

// =========================================================================
// Reconciliation
// =========================================================================

/// A pending transaction the sweep could not settle this round
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationIssue {
    pub transaction_id: TransactionId,
    pub reference: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconciliationReport {
    pub examined: usize,
    pub completed: usize,
    pub reversed: usize,
    pub failed: usize,
    pub errors: Vec<ReconciliationIssue>,
}

impl ReconciliationReport {
    pub fn record_issue(&mut self, transaction: &Transaction, error: impl ToString) {
        self.errors.push(ReconciliationIssue {
            transaction_id: transaction.id(),
            reference: transaction.reference().to_string(),
            error: error.to_string(),
        });
    }
}

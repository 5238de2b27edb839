//! Repository module
//!
//! Persistence ports consumed by the use cases, plus a PostgreSQL adapter
//! and an in-memory adapter for each.
//!
//! Every `update` is conditional on the version the entity was loaded at and
//! returns the stored entity with its new version. Wallet movements and plan
//! updates record the transaction reference they applied, which is what lets
//! the reconciler decide how far an interrupted movement got.

mod error;
pub mod memory;
pub mod postgres;

pub use error::{RepoResult, RepositoryError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Money, PlanId, TransactionId, UserId};
use crate::entities::{SavingsPlan, Transaction, User, Wallet};

#[async_trait]
pub trait SavingsRepository: Send + Sync {
    async fn create(&self, plan: &SavingsPlan) -> RepoResult<()>;

    async fn find_by_id(&self, id: PlanId) -> RepoResult<Option<SavingsPlan>>;

    async fn find_by_user_id(&self, user_id: UserId) -> RepoResult<Vec<SavingsPlan>>;

    /// Active plans with auto-save switched on
    async fn find_plans_for_auto_save(&self) -> RepoResult<Vec<SavingsPlan>>;

    /// Store `plan` if the stored version still equals `plan.version()`.
    ///
    /// The plan's `last_transaction_reference`, when set, is recorded as
    /// applied in the same write.
    async fn update(&self, plan: &SavingsPlan) -> RepoResult<SavingsPlan>;

    /// Whether an update carrying this reference has been stored
    async fn has_applied(&self, reference: &str) -> RepoResult<bool>;
}

#[async_trait]
pub trait WalletRepository: Send + Sync {
    async fn create(&self, wallet: &Wallet) -> RepoResult<()>;

    async fn find_by_user_id(&self, user_id: UserId) -> RepoResult<Option<Wallet>>;

    async fn get_balance(&self, user_id: UserId) -> RepoResult<Money>;

    async fn has_sufficient_balance(&self, user_id: UserId, amount: &Money) -> RepoResult<bool>;

    /// Conditional debit: fails with `InsufficientBalance` rather than going
    /// below zero. Applying the same reference twice is a no-op.
    async fn debit(&self, user_id: UserId, amount: &Money, reference: &str) -> RepoResult<Money>;

    /// Credit the wallet. Applying the same reference twice is a no-op.
    async fn credit(&self, user_id: UserId, amount: &Money, reference: &str) -> RepoResult<Money>;

    /// Whether a debit or credit with this reference has been applied
    async fn has_entry(&self, reference: &str) -> RepoResult<bool>;
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn save(&self, transaction: &Transaction) -> RepoResult<()>;

    /// Persist a status change. Only a stored pending row may be settled, so
    /// two settlers racing on the same row cannot both win.
    async fn update(&self, transaction: &Transaction) -> RepoResult<()>;

    async fn find_by_id(&self, id: TransactionId) -> RepoResult<Option<Transaction>>;

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Transaction>>;

    /// Most recent first
    async fn find_by_user_id(&self, user_id: UserId, limit: i64) -> RepoResult<Vec<Transaction>>;

    async fn find_pending_older_than(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Transaction>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> RepoResult<()>;

    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>>;

    /// Versioned update, see [`SavingsRepository::update`]
    async fn update(&self, user: &User) -> RepoResult<User>;
}

//! Entities module
//!
//! Immutable domain entities. Every state change returns a new value; the
//! repositories persist whole entities, guarded by the version counter.

pub mod savings_plan;
pub mod transaction;
pub mod user;
pub mod wallet;

pub use savings_plan::{AutoSaveTime, NewSavingsPlan, PlanState, PlanStatus, SavingsPlan};
pub use transaction::{
    Transaction, TransactionSource, TransactionStatus, TransactionType,
};
pub use user::{KycStatus, KycTier, User};
pub use wallet::Wallet;

/// Trait shared by all persisted entities
pub trait Entity {
    type Id: Copy + std::fmt::Display;

    /// Entity type name (for storage and error context)
    fn entity_type() -> &'static str;

    fn id(&self) -> Self::Id;

    /// Version the entity was loaded at (optimistic locking)
    fn version(&self) -> i64;
}

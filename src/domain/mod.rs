//! Domain module
//!
//! Value objects, time source and pure domain errors.

pub mod clock;
pub mod context;
pub mod error;
pub mod ids;
pub mod money;
pub mod reference;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::OperationContext;
pub use error::DomainError;
pub use ids::{PlanId, TransactionId, UserId};
pub use money::{Currency, Money, MoneyError};
pub use reference::{ReferenceKind, TransactionReference};

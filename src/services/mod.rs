//! Domain services
//!
//! Contribution admission, KYC compliance and the notification port.

pub mod compliance;
pub mod notification;
pub mod validation;

pub use compliance::{ensure_account_open, ComplianceLimits, ComplianceService};
pub use notification::{
    notify_best_effort, LogNotifier, Notification, NotificationError, NotificationService,
};
pub use validation::{ContributionCheck, ContributionRejection, ContributionValidator};

//! Notification port
//!
//! Users hear about completed movements through this capability. Delivery
//! is best effort: a failed notification is logged and never undoes money
//! that has already moved.

use async_trait::async_trait;
use serde::Serialize;

use crate::domain::{Money, PlanId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    ContributionReceived {
        user_id: UserId,
        plan_id: PlanId,
        amount: Money,
        reference: String,
    },
    PlanCompleted {
        user_id: UserId,
        plan_id: PlanId,
    },
    AutoSaveFailed {
        user_id: UserId,
        plan_id: PlanId,
        reason: String,
    },
    WithdrawalProcessed {
        user_id: UserId,
        plan_id: PlanId,
        amount: Money,
        reference: String,
    },
    KycUpdated {
        user_id: UserId,
        kyc_tier: String,
    },
    AccountSuspended {
        user_id: UserId,
        reason: String,
    },
}

impl Notification {
    pub fn user_id(&self) -> UserId {
        match self {
            Notification::ContributionReceived { user_id, .. }
            | Notification::PlanCompleted { user_id, .. }
            | Notification::AutoSaveFailed { user_id, .. }
            | Notification::WithdrawalProcessed { user_id, .. }
            | Notification::KycUpdated { user_id, .. }
            | Notification::AccountSuspended { user_id, .. } => *user_id,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotificationError(pub String);

#[async_trait]
pub trait NotificationService: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Send and swallow failures
pub async fn notify_best_effort(service: &dyn NotificationService, notification: Notification) {
    if let Err(e) = service.notify(&notification).await {
        tracing::warn!(
            user_id = %notification.user_id(),
            error = %e,
            "Notification not delivered"
        );
    }
}

/// Writes notifications to the log; the default when no provider is wired
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationService for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotificationError> {
        let payload = serde_json::to_string(notification)
            .map_err(|e| NotificationError(e.to_string()))?;
        tracing::info!(user_id = %notification.user_id(), payload = %payload, "Notification");
        Ok(())
    }
}

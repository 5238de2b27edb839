//! Suspend User Handler

use crate::audit::{record_best_effort, AuditAction, AuditEntry};
use crate::domain::OperationContext;
use crate::entities::{Entity, User};
use crate::error::{AppError, AppResult, RepoContext};
use crate::services::{notify_best_effort, Notification};

use super::{require_admin, Ports, SuspendUserCommand, UserUpdateResult};

/// Handler for administrative account suspension
#[derive(Clone)]
pub struct SuspendUserHandler {
    ports: Ports,
}

impl SuspendUserHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn execute(
        &self,
        command: SuspendUserCommand,
        context: &OperationContext,
    ) -> AppResult<UserUpdateResult> {
        let admin = require_admin(self.ports.users.as_ref(), context).await?;

        if admin.id() == command.user_id {
            return Err(AppError::authorization("administrators cannot suspend themselves"));
        }

        let user = self
            .ports
            .users
            .find_by_id(command.user_id)
            .await
            .db_context("find_by_id", "users")?
            .ok_or_else(|| AppError::UserNotFound(command.user_id.to_string()))?;

        let suspended = user.suspend(&command.reason, self.ports.clock.now())?;
        let stored = self
            .ports
            .users
            .update(&suspended)
            .await
            .db_context("update", "users")?;

        let reason = stored.suspension_reason().unwrap_or_default().to_string();
        let audit_message = format!(
            "User {} suspended by {}: {}",
            stored.id(),
            admin.id(),
            reason
        );
        tracing::warn!(
            user_id = %stored.id(),
            admin_id = %admin.id(),
            reason = %reason,
            "User suspended"
        );

        record_best_effort(
            self.ports.audit.as_ref(),
            AuditEntry::new(
                AuditAction::UserSuspended,
                User::entity_type(),
                stored.id(),
                audit_message.clone(),
            )
            .context(context)
            .details(&serde_json::json!({ "reason": reason })),
        )
        .await;

        notify_best_effort(
            self.ports.notifier.as_ref(),
            Notification::AccountSuspended {
                user_id: stored.id(),
                reason,
            },
        )
        .await;

        Ok(UserUpdateResult {
            user: stored,
            audit_message,
        })
    }
}

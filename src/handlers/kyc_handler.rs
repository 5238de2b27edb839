//! KYC Handler
//!
//! Administrator-driven KYC changes. Tiers only move forward one step.

use crate::audit::{record_best_effort, AuditAction, AuditEntry};
use crate::domain::OperationContext;
use crate::entities::{Entity, User};
use crate::error::{AppError, AppResult, RepoContext};
use crate::services::{notify_best_effort, Notification};

use super::{require_admin, Ports, UpdateKycStatusCommand, UserUpdateResult};

#[derive(Clone)]
pub struct KycHandler {
    ports: Ports,
}

impl KycHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn execute(
        &self,
        command: UpdateKycStatusCommand,
        context: &OperationContext,
    ) -> AppResult<UserUpdateResult> {
        let admin = require_admin(self.ports.users.as_ref(), context).await?;

        let user = self
            .ports
            .users
            .find_by_id(command.user_id)
            .await
            .db_context("find_by_id", "users")?
            .ok_or_else(|| AppError::UserNotFound(command.user_id.to_string()))?;

        let updated = user.update_kyc(command.kyc_tier, command.kyc_status, self.ports.clock.now())?;
        let stored = self
            .ports
            .users
            .update(&updated)
            .await
            .db_context("update", "users")?;

        let audit_message = format!(
            "KYC for user {} changed from {}/{} to {}/{} by {}",
            stored.id(),
            user.kyc_tier(),
            user.kyc_status(),
            stored.kyc_tier(),
            stored.kyc_status(),
            admin.id()
        );
        tracing::info!(
            user_id = %stored.id(),
            admin_id = %admin.id(),
            kyc_tier = %stored.kyc_tier(),
            kyc_status = %stored.kyc_status(),
            "KYC updated"
        );

        record_best_effort(
            self.ports.audit.as_ref(),
            AuditEntry::new(
                AuditAction::KycUpdated,
                User::entity_type(),
                stored.id(),
                audit_message.clone(),
            )
            .context(context)
            .details(&serde_json::json!({
                "previous_tier": user.kyc_tier(),
                "previous_status": user.kyc_status(),
                "kyc_tier": stored.kyc_tier(),
                "kyc_status": stored.kyc_status(),
            })),
        )
        .await;

        notify_best_effort(
            self.ports.notifier.as_ref(),
            Notification::KycUpdated {
                user_id: stored.id(),
                kyc_tier: stored.kyc_tier().to_string(),
            },
        )
        .await;

        Ok(UserUpdateResult {
            user: stored,
            audit_message,
        })
    }
}

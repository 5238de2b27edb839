//! Plan Handler
//!
//! Owner-driven lifecycle changes: pause, resume, cancel and auto-save
//! settings. Exactly one transition per command.

use crate::audit::{record_best_effort, AuditAction, AuditEntry};
use crate::domain::OperationContext;
use crate::entities::{Entity, SavingsPlan};
use crate::error::{AppError, AppResult, RepoContext};

use super::{authorize_actor, PlanAction, PlanUpdateResult, Ports, UpdateSavingsPlanCommand};

#[derive(Clone)]
pub struct PlanHandler {
    ports: Ports,
}

impl PlanHandler {
    pub fn new(ports: Ports) -> Self {
        Self { ports }
    }

    pub async fn execute(
        &self,
        command: UpdateSavingsPlanCommand,
        context: &OperationContext,
    ) -> AppResult<PlanUpdateResult> {
        authorize_actor(context, command.user_id)?;

        let plan = self
            .ports
            .plans
            .find_by_id(command.plan_id)
            .await
            .db_context("find_by_id", "savings_plans")?
            .ok_or_else(|| AppError::PlanNotFound(command.plan_id.to_string()))?;

        if plan.user_id() != command.user_id {
            return Err(AppError::authorization(format!(
                "plan {} does not belong to user {}",
                command.plan_id, command.user_id
            )));
        }

        let now = self.ports.clock.now();
        let (next, action) = match &command.action {
            PlanAction::Pause => (plan.pause(now)?, AuditAction::PlanPaused),
            PlanAction::Resume => (plan.resume(now)?, AuditAction::PlanResumed),
            PlanAction::Cancel => (plan.cancel(now)?, AuditAction::PlanCancelled),
            PlanAction::UpdateAutoSave { enabled, time } => (
                plan.update_auto_save(*enabled, *time, now)?,
                AuditAction::AutoSaveUpdated,
            ),
        };

        let stored = self
            .ports
            .plans
            .update(&next)
            .await
            .db_context("update", "savings_plans")?;

        let audit_message = describe(&plan, &stored, action);
        tracing::info!(
            plan_id = %stored.id(),
            user_id = %stored.user_id(),
            action = %action,
            version = stored.version(),
            "{}",
            audit_message
        );

        record_best_effort(
            self.ports.audit.as_ref(),
            AuditEntry::new(
                action,
                SavingsPlan::entity_type(),
                stored.id(),
                audit_message.clone(),
            )
            .context(context)
            .details(&serde_json::json!({
                "from_status": plan.status(),
                "to_status": stored.status(),
                "auto_save_enabled": stored.auto_save_enabled(),
                "auto_save_time": stored.auto_save_time(),
            })),
        )
        .await;

        Ok(PlanUpdateResult {
            plan: stored,
            audit_message,
        })
    }
}

fn describe(before: &SavingsPlan, after: &SavingsPlan, action: AuditAction) -> String {
    match action {
        AuditAction::AutoSaveUpdated => match after.auto_save_time() {
            Some(time) if after.auto_save_enabled() => format!(
                "Auto-save for plan '{}' enabled at {}",
                after.plan_name(),
                time
            ),
            _ => format!("Auto-save for plan '{}' disabled", after.plan_name()),
        },
        _ => format!(
            "Plan '{}' moved from {} to {}",
            after.plan_name(),
            before.status(),
            after.status()
        ),
    }
}

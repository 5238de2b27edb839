//! API Routes
//!
//! HTTP endpoint definitions. Handlers translate JSON into commands and
//! leave every rule to the use cases.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::domain::{OperationContext, PlanId, UserId};
use crate::entities::{Entity, KycStatus, KycTier, TransactionSource};
use crate::error::{AppError, AppResult};
use crate::handlers::{
    require_admin, AutoSaveReport, ContributionResult, PlanAction, PlanUpdateResult,
    ProcessContributionCommand, ReconciliationReport, SavingsAnalytics, SuspendUserCommand,
    UpdateKycStatusCommand, UpdateSavingsPlanCommand, UserUpdateResult,
    ValidateContributionResult, WithdrawFromPlanCommand, WithdrawalResult,
};

use super::AppState;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct ContributionRequest {
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub amount: String,
    #[serde(default)]
    pub source: Option<TransactionSource>,
}

impl From<ContributionRequest> for ProcessContributionCommand {
    fn from(request: ContributionRequest) -> Self {
        let command = ProcessContributionCommand::new(request.user_id, request.plan_id, request.amount);
        match request.source {
            Some(source) => command.with_source(source),
            None => command,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WithdrawalRequest {
    pub user_id: UserId,
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct KycRequest {
    pub kyc_tier: KycTier,
    #[serde(default)]
    pub kyc_status: Option<KycStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct RateLimitStatus {
    pub key: String,
    pub limit: u32,
    pub remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<i64>,
}

// =========================================================================
// API Router
// =========================================================================

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/contributions", post(process_contribution))
        .route("/contributions/validate", post(validate_contribution))
        .route("/plans/:plan_id", patch(update_plan))
        .route("/plans/:plan_id/withdrawals", post(withdraw_from_plan))
        .route("/users/:user_id/analytics", get(get_analytics))
        .route("/admin/users/:user_id/kyc", post(update_kyc))
        .route("/admin/users/:user_id/suspend", post(suspend_user))
        .route("/admin/auto-save/run", post(run_auto_save))
        .route("/admin/reconciliation/run", post(run_reconciliation))
        .route(
            "/admin/rate-limits/:key",
            get(get_rate_limit).delete(reset_rate_limit),
        )
}

// =========================================================================
// Contributions
// =========================================================================

async fn process_contribution(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<ContributionRequest>,
) -> AppResult<(StatusCode, Json<ContributionResult>)> {
    let result = state.contributions.execute(request.into(), &context).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Dry run: business rejections come back as 200 with `is_valid = false`
async fn validate_contribution(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Json(request): Json<ContributionRequest>,
) -> AppResult<Json<ValidateContributionResult>> {
    let result = state.contributions.validate(request.into(), &context).await?;
    Ok(Json(result))
}

// =========================================================================
// Plans
// =========================================================================

/// The plan owner is the caller named in `X-Request-User-Id`
async fn update_plan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(plan_id): Path<PlanId>,
    Json(action): Json<PlanAction>,
) -> AppResult<Json<PlanUpdateResult>> {
    let user_id = caller(&context)?;
    let result = state
        .plans
        .execute(UpdateSavingsPlanCommand::new(user_id, plan_id, action), &context)
        .await?;
    Ok(Json(result))
}

async fn withdraw_from_plan(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(plan_id): Path<PlanId>,
    Json(request): Json<WithdrawalRequest>,
) -> AppResult<(StatusCode, Json<WithdrawalResult>)> {
    let command = WithdrawFromPlanCommand::new(request.user_id, plan_id, request.amount);
    let result = state.withdrawals.execute(command, &context).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn get_analytics(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(user_id): Path<UserId>,
) -> AppResult<Json<SavingsAnalytics>> {
    let result = state.analytics.execute(user_id, &context).await?;
    Ok(Json(result))
}

// =========================================================================
// Admin
// =========================================================================

async fn update_kyc(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(user_id): Path<UserId>,
    Json(request): Json<KycRequest>,
) -> AppResult<Json<UserUpdateResult>> {
    let mut command = UpdateKycStatusCommand::new(user_id, request.kyc_tier);
    if let Some(status) = request.kyc_status {
        command = command.with_status(status);
    }
    let result = state.kyc.execute(command, &context).await?;
    Ok(Json(result))
}

async fn suspend_user(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(user_id): Path<UserId>,
    Json(request): Json<SuspendRequest>,
) -> AppResult<Json<UserUpdateResult>> {
    let result = state
        .suspensions
        .execute(SuspendUserCommand::new(user_id, request.reason), &context)
        .await?;
    Ok(Json(result))
}

async fn run_auto_save(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<Json<AutoSaveReport>> {
    require_admin(state.users.as_ref(), &context).await?;
    let report = state.auto_save.execute(&context, None).await?;
    Ok(Json(report))
}

async fn run_reconciliation(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
) -> AppResult<Json<ReconciliationReport>> {
    require_admin(state.users.as_ref(), &context).await?;
    let report = state.reconciliation.execute(&context).await?;
    Ok(Json(report))
}

async fn get_rate_limit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(key): Path<String>,
) -> AppResult<Json<RateLimitStatus>> {
    require_admin(state.users.as_ref(), &context).await?;
    let policy = state.request_limit;

    let remaining = state
        .limiter
        .get_remaining_requests(&key, policy.limit, policy.window)
        .await?;
    let retry_after_ms = if remaining == 0 {
        state.limiter.get_retry_after(&key, policy.window).await?
    } else {
        None
    };

    Ok(Json(RateLimitStatus {
        key,
        limit: policy.limit,
        remaining,
        retry_after_ms,
    }))
}

async fn reset_rate_limit(
    State(state): State<AppState>,
    Extension(context): Extension<OperationContext>,
    Path(key): Path<String>,
) -> AppResult<StatusCode> {
    let admin = require_admin(state.users.as_ref(), &context).await?;
    state.limiter.reset_limit(&key).await?;
    tracing::info!(key = %key, admin_id = %admin.id(), "Rate limit reset by administrator");
    Ok(StatusCode::NO_CONTENT)
}

fn caller(context: &OperationContext) -> AppResult<UserId> {
    context
        .request_user_id
        .ok_or_else(|| AppError::MissingHeader("X-Request-User-Id".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_request_defaults_to_wallet() {
        let json = r#"{
            "user_id": "550e8400-e29b-41d4-a716-446655440000",
            "plan_id": "550e8400-e29b-41d4-a716-446655440001",
            "amount": "500.00"
        }"#;

        let request: ContributionRequest = serde_json::from_str(json).unwrap();
        let command = ProcessContributionCommand::from(request);
        assert_eq!(command.amount, "500.00");
        assert_eq!(command.source, TransactionSource::Wallet);
    }

    #[test]
    fn test_contribution_request_with_source() {
        let json = r#"{
            "user_id": "550e8400-e29b-41d4-a716-446655440000",
            "plan_id": "550e8400-e29b-41d4-a716-446655440001",
            "amount": "500",
            "source": "bank_transfer"
        }"#;

        let request: ContributionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.source, Some(TransactionSource::BankTransfer));
    }

    #[test]
    fn test_plan_action_body() {
        let action: PlanAction =
            serde_json::from_str(r#"{"action": "update_auto_save", "enabled": true, "time": "06:45"}"#)
                .unwrap();
        match action {
            PlanAction::UpdateAutoSave { enabled, time } => {
                assert!(enabled);
                assert_eq!(time.unwrap().to_string(), "06:45");
            }
            other => panic!("Expected UpdateAutoSave, got: {:?}", other),
        }
    }

    #[test]
    fn test_kyc_request_status_optional() {
        let request: KycRequest = serde_json::from_str(r#"{"kyc_tier": "basic"}"#).unwrap();
        assert_eq!(request.kyc_tier, KycTier::Basic);
        assert!(request.kyc_status.is_none());
    }
}

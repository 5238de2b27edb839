//! Error handling module
//!
//! Centralized error types and HTTP response conversion.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use crate::domain::{DomainError, Money};
use crate::repository::RepositoryError;

/// Application-wide Result type
pub type AppResult<T> = Result<T, AppError>;

/// Application error types
///
/// Every variant carries the structured context a client needs to render an
/// actionable message; the display string is supplementary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // Client errors (4xx)
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Missing required header: {0}")]
    MissingHeader(String),

    #[error("Savings plan not found: {0}")]
    PlanNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Not authorized: {reason}")]
    Authorization { reason: String },

    #[error("Invalid contribution: {reason}")]
    InvalidContribution {
        reason: String,
        expected: Option<Money>,
        actual: Option<Money>,
    },

    #[error("Cannot move plan from {current_state} to {attempted_state}: {reason}")]
    InvalidPlanState {
        current_state: String,
        attempted_state: String,
        reason: String,
    },

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { available: Money, required: Money },

    #[error("Compliance limit exceeded: {reason}")]
    ComplianceViolation {
        limit_amount: Money,
        requested_amount: Money,
        kyc_tier: String,
        reason: String,
    },

    #[error("Rate limit exceeded for {key}")]
    RateLimitExceeded {
        key: String,
        /// Epoch milliseconds at which a new request will be admitted
        retry_after_ms: i64,
    },

    #[error("Concurrent modification of {entity} {id}")]
    ConcurrentWithdrawal { entity: String, id: String },

    #[error("Invalid KYC transition from {current} to {requested}")]
    InvalidKycTransition { current: String, requested: String },

    #[error("Invalid user state: {0}")]
    InvalidUserState(String),

    #[error("Deadline exceeded before {0}")]
    DeadlineExceeded(String),

    // Server errors (5xx)
    #[error("Database error during {operation} on {table}: {message}")]
    Database {
        operation: String,
        table: String,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn authorization(reason: impl Into<String>) -> Self {
        AppError::Authorization {
            reason: reason.into(),
        }
    }

    pub fn database(operation: &str, table: &str, message: impl ToString) -> Self {
        AppError::Database {
            operation: operation.to_string(),
            table: table.to_string(),
            message: message.to_string(),
        }
    }

    /// Wrap a storage failure with the step it happened in
    pub fn from_repository(err: RepositoryError, operation: &str, table: &str) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => match entity {
                "SavingsPlan" => AppError::PlanNotFound(id),
                "User" => AppError::UserNotFound(id),
                "Transaction" => AppError::TransactionNotFound(id),
                "Wallet" => AppError::validation("wallet", format!("user {} has no wallet", id)),
                _ => AppError::database(operation, table, format!("{} not found: {}", entity, id)),
            },
            RepositoryError::VersionConflict { entity, id, .. } => AppError::ConcurrentWithdrawal {
                entity: entity.to_string(),
                id,
            },
            RepositoryError::InsufficientBalance {
                available,
                required,
            } => AppError::InsufficientFunds {
                available,
                required,
            },
            other => AppError::database(operation, table, other),
        }
    }

    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "validation_error",
            AppError::MissingHeader(_) => "missing_header",
            AppError::PlanNotFound(_) => "plan_not_found",
            AppError::UserNotFound(_) => "user_not_found",
            AppError::TransactionNotFound(_) => "transaction_not_found",
            AppError::Authorization { .. } => "authorization_error",
            AppError::InvalidContribution { .. } => "invalid_contribution",
            AppError::InvalidPlanState { .. } => "invalid_plan_state",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::ComplianceViolation { .. } => "compliance_violation",
            AppError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            AppError::ConcurrentWithdrawal { .. } => "concurrent_modification",
            AppError::InvalidKycTransition { .. } => "invalid_kyc_transition",
            AppError::InvalidUserState(_) => "invalid_user_state",
            AppError::DeadlineExceeded(_) => "deadline_exceeded",
            AppError::Database { .. } => "database_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            AppError::PlanNotFound(_)
            | AppError::UserNotFound(_)
            | AppError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Authorization { .. } => StatusCode::FORBIDDEN,
            AppError::InvalidContribution { .. }
            | AppError::InsufficientFunds { .. }
            | AppError::ComplianceViolation { .. }
            | AppError::InvalidKycTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidPlanState { .. }
            | AppError::ConcurrentWithdrawal { .. }
            | AppError::InvalidUserState(_) => StatusCode::CONFLICT,
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Database { .. } | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Structured context for the response body
    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation { field, message } => {
                Some(json!({ "field": field, "message": message }))
            }
            AppError::MissingHeader(name) => Some(json!({ "header": name })),
            AppError::PlanNotFound(id) => Some(json!({ "plan_id": id })),
            AppError::UserNotFound(id) => Some(json!({ "user_id": id })),
            AppError::TransactionNotFound(id) => Some(json!({ "transaction_id": id })),
            AppError::Authorization { reason } => Some(json!({ "reason": reason })),
            AppError::InvalidContribution {
                reason,
                expected,
                actual,
            } => Some(json!({ "reason": reason, "expected": expected, "actual": actual })),
            AppError::InvalidPlanState {
                current_state,
                attempted_state,
                reason,
            } => Some(json!({
                "current_state": current_state,
                "attempted_state": attempted_state,
                "reason": reason,
            })),
            AppError::InsufficientFunds {
                available,
                required,
            } => Some(json!({ "available": available, "required": required })),
            AppError::ComplianceViolation {
                limit_amount,
                requested_amount,
                kyc_tier,
                reason,
            } => Some(json!({
                "limit_amount": limit_amount,
                "requested_amount": requested_amount,
                "kyc_tier": kyc_tier,
                "reason": reason,
            })),
            AppError::RateLimitExceeded {
                key,
                retry_after_ms,
            } => Some(json!({ "key": key, "retry_after_ms": retry_after_ms })),
            AppError::ConcurrentWithdrawal { entity, id } => {
                Some(json!({ "entity": entity, "id": id }))
            }
            AppError::InvalidKycTransition { current, requested } => {
                Some(json!({ "current": current, "requested": requested }))
            }
            AppError::InvalidUserState(reason) => Some(json!({ "reason": reason })),
            AppError::DeadlineExceeded(step) => Some(json!({ "step": step })),
            // Storage details stay in the logs
            AppError::Database {
                operation, table, ..
            } => Some(json!({ "operation": operation, "table": table })),
            AppError::Internal(_) => None,
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidPlanState {
                current_state,
                attempted_state,
                reason,
            } => AppError::InvalidPlanState {
                current_state,
                attempted_state,
                reason,
            },
            DomainError::InvalidContribution {
                reason,
                expected,
                actual,
            } => AppError::InvalidContribution {
                reason,
                expected,
                actual,
            },
            DomainError::InsufficientFunds {
                available,
                required,
            } => AppError::InsufficientFunds {
                available,
                required,
            },
            DomainError::InvalidKycTransition { current, requested } => {
                AppError::InvalidKycTransition { current, requested }
            }
            DomainError::InvalidUserState(reason) => AppError::InvalidUserState(reason),
            DomainError::InvalidInput(message) => AppError::validation("input", message),
            DomainError::Money(e) => AppError::validation("amount", e.to_string()),
            e @ DomainError::InvalidTransactionState { .. } => AppError::Internal(e.to_string()),
        }
    }
}

/// Attach the failing step to repository errors
pub trait RepoContext<T> {
    fn db_context(self, operation: &str, table: &str) -> AppResult<T>;
}

impl<T> RepoContext<T> for Result<T, RepositoryError> {
    fn db_context(self, operation: &str, table: &str) -> AppResult<T> {
        self.map_err(|e| AppError::from_repository(e, operation, table))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Database { .. } => tracing::error!("Database error: {}", self),
            AppError::Internal(msg) => tracing::error!("Internal error: {}", msg),
            _ => {}
        }

        let error = match &self {
            AppError::Database { .. } => "Database error".to_string(),
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            error,
            error_code: self.error_code().to_string(),
            details: self.details(),
        };

        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimitExceeded { retry_after_ms, .. } = &self {
            let wait_ms = (retry_after_ms - chrono::Utc::now().timestamp_millis()).max(0);
            let secs = ((wait_ms + 999) / 1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

//! Audit Log
//!
//! Administrative and plan lifecycle changes are reported through the
//! `AuditSink` port. The default sink writes structured log lines; the
//! PostgreSQL sink keeps a tamper-evident SHA-256 hash chain.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{OperationContext, UserId};

/// Audit action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    PlanPaused,
    PlanResumed,
    PlanCancelled,
    AutoSaveUpdated,
    KycUpdated,
    UserSuspended,
    TransactionReversed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::PlanPaused => "plan.paused",
            AuditAction::PlanResumed => "plan.resumed",
            AuditAction::PlanCancelled => "plan.cancelled",
            AuditAction::AutoSaveUpdated => "plan.auto_save_updated",
            AuditAction::KycUpdated => "user.kyc_updated",
            AuditAction::UserSuspended => "user.suspended",
            AuditAction::TransactionReversed => "transaction.reversed",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One audit record
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub resource_type: &'static str,
    pub resource_id: String,
    pub message: String,
    /// Who performed the change
    pub actor: Option<UserId>,
    pub correlation_id: Option<Uuid>,
    pub details: serde_json::Value,
}

impl AuditEntry {
    pub fn new(
        action: AuditAction,
        resource_type: &'static str,
        resource_id: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action,
            resource_type,
            resource_id: resource_id.to_string(),
            message: message.into(),
            actor: None,
            correlation_id: None,
            details: serde_json::Value::Null,
        }
    }

    /// Take actor and correlation id from the request context
    pub fn context(mut self, context: &OperationContext) -> Self {
        self.actor = context.request_user_id;
        self.correlation_id = context.correlation_id;
        self
    }

    pub fn details<T: Serialize>(mut self, details: &T) -> Self {
        self.details = serde_json::to_value(details).unwrap_or(serde_json::Value::Null);
        self
    }
}

/// Audit log errors
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// The change is already committed; a failed audit write is logged only.
pub async fn record_best_effort(sink: &dyn AuditSink, entry: AuditEntry) {
    if let Err(e) = sink.record(&entry).await {
        tracing::error!(
            action = %entry.action,
            resource_id = %entry.resource_id,
            error = %e,
            "Failed to write audit entry"
        );
    }
}

// =========================================================================
// Tracing sink
// =========================================================================

/// Writes entries to the `audit` log target
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            action = %entry.action,
            resource_type = entry.resource_type,
            resource_id = %entry.resource_id,
            actor = ?entry.actor,
            correlation_id = ?entry.correlation_id,
            details = %entry.details,
            "{}",
            entry.message
        );
        Ok(())
    }
}

// =========================================================================
// In-memory sink
// =========================================================================

/// Keeps entries in memory, used by tests to assert what was audited
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.clone());
        Ok(())
    }
}

// =========================================================================
// PostgreSQL hash-chain sink
// =========================================================================

/// Hash linking the first entry of the chain
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hash of one entry, chained to the previous entry's hash
pub fn chain_hash(
    id: Uuid,
    action: &str,
    resource_type: &str,
    resource_id: &str,
    message: &str,
    details: &serde_json::Value,
    previous_hash: &str,
) -> String {
    let input = format!(
        "{}|{}|{}|{}|{}|{}|{}",
        id, action, resource_type, resource_id, message, details, previous_hash
    );
    sha256_hex(&input)
}

/// Calculate SHA-256 hash and return as hex string
fn sha256_hex(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Result of hash chain verification
#[derive(Debug, Clone, PartialEq)]
pub struct ChainVerificationResult {
    pub is_valid: bool,
    pub entries_checked: u64,
    pub first_invalid_entry: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Walk the chain in insertion order, recomputing every hash
    pub async fn verify_hash_chain(&self, limit: i64) -> Result<ChainVerificationResult, AuditError> {
        let rows: Vec<(Uuid, String, String, String, String, serde_json::Value, String, String)> =
            sqlx::query_as(
                r#"
                SELECT id, action, resource_type, resource_id, message, details,
                       previous_hash, current_hash
                FROM audit_logs
                ORDER BY sequence_number ASC
                LIMIT $1
                "#,
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(verify_rows(&rows))
    }
}

type AuditRow = (Uuid, String, String, String, String, serde_json::Value, String, String);

fn verify_rows(rows: &[AuditRow]) -> ChainVerificationResult {
    let mut expected_previous = GENESIS_HASH.to_string();

    for (checked, (id, action, resource_type, resource_id, message, details, previous, current)) in
        rows.iter().enumerate()
    {
        let recomputed = chain_hash(
            *id,
            action,
            resource_type,
            resource_id,
            message,
            details,
            previous,
        );
        if previous != &expected_previous || &recomputed != current {
            return ChainVerificationResult {
                is_valid: false,
                entries_checked: checked as u64,
                first_invalid_entry: Some(*id),
            };
        }
        expected_previous = current.clone();
    }

    ChainVerificationResult {
        is_valid: true,
        entries_checked: rows.len() as u64,
        first_invalid_entry: None,
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        // One writer extends the chain at a time
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext('audit_logs'))")
            .execute(&mut *tx)
            .await?;

        let previous: Option<String> = sqlx::query_scalar(
            "SELECT current_hash FROM audit_logs ORDER BY sequence_number DESC LIMIT 1",
        )
        .fetch_optional(&mut *tx)
        .await?;
        let previous = previous.unwrap_or_else(|| GENESIS_HASH.to_string());

        let current = chain_hash(
            id,
            entry.action.as_str(),
            entry.resource_type,
            &entry.resource_id,
            &entry.message,
            &entry.details,
            &previous,
        );

        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, user_id, action, resource_type, resource_id, message,
                details, correlation_id, previous_hash, current_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(entry.actor.map(|a| a.as_uuid()))
        .bind(entry.action.as_str())
        .bind(entry.resource_type)
        .bind(&entry.resource_id)
        .bind(&entry.message)
        .bind(&entry.details)
        .bind(entry.correlation_id)
        .bind(&previous)
        .bind(&current)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(audit_id = %id, action = %entry.action, "Audit log entry created");
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: Uuid, message: &str, previous: &str) -> AuditRow {
        let details = json!({ "reason": "fraud" });
        let current = chain_hash(id, "user.suspended", "User", "u-1", message, &details, previous);
        (
            id,
            "user.suspended".to_string(),
            "User".to_string(),
            "u-1".to_string(),
            message.to_string(),
            details,
            previous.to_string(),
            current,
        )
    }

    #[test]
    fn test_audit_action_as_str() {
        assert_eq!(AuditAction::PlanPaused.as_str(), "plan.paused");
        assert_eq!(AuditAction::KycUpdated.as_str(), "user.kyc_updated");
    }

    #[test]
    fn test_sha256_hex() {
        let hash = sha256_hex("test input");
        assert_eq!(hash.len(), 64); // SHA-256 produces 64 hex characters
    }

    #[test]
    fn test_chain_verifies() {
        let first = row(Uuid::new_v4(), "suspended", GENESIS_HASH);
        let second = row(Uuid::new_v4(), "suspended again", &first.7);

        let result = verify_rows(&[first, second]);
        assert!(result.is_valid);
        assert_eq!(result.entries_checked, 2);
    }

    #[test]
    fn test_tampered_message_detected() {
        let first = row(Uuid::new_v4(), "suspended", GENESIS_HASH);
        let mut second = row(Uuid::new_v4(), "suspended again", &first.7);
        second.4 = "nothing happened".to_string();
        let tampered_id = second.0;

        let result = verify_rows(&[first, second]);
        assert!(!result.is_valid);
        assert_eq!(result.entries_checked, 1);
        assert_eq!(result.first_invalid_entry, Some(tampered_id));
    }

    #[tokio::test]
    async fn test_memory_sink_records() {
        let sink = MemoryAuditSink::new();
        record_best_effort(
            &sink,
            AuditEntry::new(AuditAction::PlanPaused, "SavingsPlan", "p-1", "Plan paused"),
        )
        .await;

        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::PlanPaused);
    }

    #[tokio::test]
    async fn test_tracing_sink_accepts_entries() {
        let entry = AuditEntry::new(AuditAction::UserSuspended, "User", "u-1", "User suspended")
            .details(&json!({ "reason": "fraud" }));
        tokio_test::assert_ok!(TracingAuditSink.record(&entry).await);
    }
}

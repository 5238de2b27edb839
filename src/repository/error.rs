//! Repository Errors

use crate::domain::{DomainError, Money};

/// Errors raised by storage adapters
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Optimistic concurrency conflict
    #[error("Version conflict for {entity} {id}: expected version {expected}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        expected: i64,
    },

    /// Conditional debit refused because the balance is too low
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { available: Money, required: Money },

    /// Unique key already taken (e.g. a transaction reference)
    #[error("Duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored row could not be turned back into an entity
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn version_conflict(entity: &'static str, id: impl ToString, expected: i64) -> Self {
        Self::VersionConflict {
            entity,
            id: id.to_string(),
            expected,
        }
    }

    /// Check if this error is a concurrency conflict
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, RepositoryError::VersionConflict { .. })
    }
}

impl From<DomainError> for RepositoryError {
    fn from(err: DomainError) -> Self {
        RepositoryError::Corrupt(err.to_string())
    }
}

impl From<crate::domain::MoneyError> for RepositoryError {
    fn from(err: crate::domain::MoneyError) -> Self {
        RepositoryError::Corrupt(err.to_string())
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

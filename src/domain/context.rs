//! Operation Context
//!
//! Contains metadata about the current operation for audit and tracing,
//! plus the caller-supplied deadline.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::{Duration, Instant};
use uuid::Uuid;

use super::UserId;

/// Context for an operation, used for auditing, tracing and cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationContext {
    /// User ID from X-Request-User-Id header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_user_id: Option<UserId>,

    /// Correlation ID for request tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<Uuid>,

    /// Client IP address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<IpAddr>,

    /// Point after which the use case must not start new side effects
    #[serde(skip)]
    pub deadline: Option<Instant>,
}

impl OperationContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self {
            request_user_id: None,
            correlation_id: None,
            client_ip: None,
            deadline: None,
        }
    }

    /// Context for work started by the scheduler rather than a caller
    pub fn system() -> Self {
        Self::new().with_correlation_id(Uuid::new_v4())
    }

    pub fn with_request_user(mut self, user_id: UserId) -> Self {
        self.request_user_id = Some(user_id);
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    pub fn with_client_ip(mut self, ip: IpAddr) -> Self {
        self.client_ip = Some(ip);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Generate a new correlation ID if not present
    pub fn ensure_correlation_id(&mut self) -> Uuid {
        *self.correlation_id.get_or_insert_with(Uuid::new_v4)
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let user_id = UserId::new();
        let correlation_id = Uuid::new_v4();

        let context = OperationContext::new()
            .with_request_user(user_id)
            .with_correlation_id(correlation_id);

        assert_eq!(context.request_user_id, Some(user_id));
        assert_eq!(context.correlation_id, Some(correlation_id));
        assert!(!context.is_expired());
    }

    #[test]
    fn test_ensure_correlation_id() {
        let mut context = OperationContext::new();
        assert!(context.correlation_id.is_none());

        let id = context.ensure_correlation_id();
        assert_eq!(context.correlation_id, Some(id));

        // Calling again should return the same ID
        assert_eq!(context.ensure_correlation_id(), id);
    }

    #[test]
    fn test_zero_timeout_is_expired() {
        let context = OperationContext::new().with_timeout(Duration::ZERO);
        assert!(context.is_expired());
    }
}

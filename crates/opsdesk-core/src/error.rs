//! Core error types shared across opsdesk crates.

use crate::ids::TenantId;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by the shared foundation: session resolution and
/// tenant-boundary checks.
///
/// Serializes with a `type` tag so route collaborators can forward the
/// tagged `{error, message}` shape directly.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreError {
    /// No session, or the session is invalid or expired. Hard stop,
    /// never retried.
    #[error("unauthenticated{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    Unauthenticated {
        /// Optional context; never includes resource information.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// An operation crossed a tenant boundary. This is a critical
    /// isolation violation, not a user-facing condition.
    #[error("tenant mismatch: expected {expected}, got {actual}")]
    TenantMismatch {
        /// Tenant the operation was scoped to.
        expected: TenantId,
        /// Tenant the data actually belongs to.
        actual: TenantId,
    },

    /// Input failed a validation rule.
    #[error("validation error on field '{field}': {message}")]
    Validation {
        /// The field that failed.
        field: String,
        /// What was wrong with it.
        message: String,
    },
}

impl CoreError {
    /// Shorthand for an [`CoreError::Unauthenticated`] without context.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated { message: None }
    }
}

/// Result alias for fallible core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthenticated_display() {
        assert_eq!(
            CoreError::unauthenticated().to_string(),
            "unauthenticated"
        );
        let err = CoreError::Unauthenticated {
            message: Some("session expired".to_string()),
        };
        assert_eq!(err.to_string(), "unauthenticated: session expired");
    }

    #[test]
    fn test_tenant_mismatch_names_both_tenants() {
        let expected = TenantId::new();
        let actual = TenantId::new();
        let display = CoreError::TenantMismatch { expected, actual }.to_string();
        assert!(display.contains(&expected.to_string()));
        assert!(display.contains(&actual.to_string()));
    }

    #[test]
    fn test_serializes_tagged() {
        let json = serde_json::to_string(&CoreError::unauthenticated()).unwrap();
        assert!(json.contains("\"type\":\"unauthenticated\""));
        assert!(!json.contains("message"));

        let json = serde_json::to_string(&CoreError::Validation {
            field: "title".to_string(),
            message: "must not be empty".to_string(),
        })
        .unwrap();
        assert!(json.contains("\"type\":\"validation\""));
        assert!(json.contains("\"field\":\"title\""));
    }
}

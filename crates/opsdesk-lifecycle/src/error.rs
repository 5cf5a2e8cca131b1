//! Error types for the lifecycle engine.

use opsdesk_core::UserId;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the engine's public operations.
///
/// Serializes with a `type` tag so route collaborators can forward the
/// tagged `{error: kind, message}` shape without translation.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleError {
    /// Authenticated but out of scope. Deliberately carries no resource
    /// detail so callers cannot learn whether the resource exists.
    #[error("access denied")]
    AccessDenied,

    /// The resource does not exist within the caller's tenant.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Resource type, e.g. "ticket".
        resource: &'static str,
        /// Identifier the caller asked for.
        id: String,
    },

    /// The requested status change is not in the kind's transition table.
    /// Both statuses are included so the caller can resynchronize its view.
    #[error("invalid transition from '{current}' to '{attempted}'")]
    InvalidTransition {
        /// Status the caller asked for.
        attempted: String,
        /// Status the ticket actually has.
        current: String,
    },

    /// The proposed assignee is outside the assignable population.
    #[error("user {user_id} is not assignable to this ticket")]
    NotAssignable {
        /// The rejected assignee.
        user_id: UserId,
    },

    /// Input failed a validation rule.
    #[error("validation error on field '{field}': {message}")]
    Validation {
        /// The field that failed.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Store-level failure. Idempotent reads may be retried once by the
    /// services; writes are never retried and always surface.
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl LifecycleError {
    /// Shorthand for a ticket-not-found error.
    #[must_use]
    pub fn ticket_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            resource: "ticket",
            id: id.to_string(),
        }
    }

    /// Shorthand for an invalid transition between two statuses.
    #[must_use]
    pub fn invalid_transition(attempted: impl ToString, current: impl ToString) -> Self {
        Self::InvalidTransition {
            attempted: attempted.to_string(),
            current: current.to_string(),
        }
    }
}

impl From<sqlx::Error> for LifecycleError {
    fn from(e: sqlx::Error) -> Self {
        Self::Persistence(e.to_string())
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, LifecycleError>;

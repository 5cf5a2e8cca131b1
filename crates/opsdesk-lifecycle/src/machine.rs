//! Ticket state machines.
//!
//! One transition table per ticket kind, checked against the *persisted*
//! current status — never a client-supplied expected-previous-status. The
//! check is pure; the ticket service interprets the resulting
//! [`Transition`] and applies side effects atomically with the status
//! write.

use crate::error::{LifecycleError, Result};
use crate::types::{ChangeStatus, IncidentStatus, ServiceRequestStatus, TicketStatus};

/// Outcome of a transition check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// Requested status equals the current one: succeed without mutating
    /// anything.
    NoOp,
    /// A legal move, with its side-effect classes.
    Apply(Transition),
}

/// A legal status move and what it implies for SLA bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Status being left.
    pub from: TicketStatus,
    /// Status being entered.
    pub to: TicketStatus,
    /// Entering the resolved class: record `resolved_at`.
    pub enters_resolved: bool,
    /// Leaving the resolved class (reopen): clear `resolved_at`.
    pub leaves_resolved: bool,
    /// Entering a response status: record `first_response_at` (set-once,
    /// enforced by the tracking record itself).
    pub records_response: bool,
    /// Only legal while the reopen window is still open.
    pub needs_reopen_window: bool,
}

impl IncidentStatus {
    /// Incident table: open → in_progress → resolved → closed, force-close
    /// from any non-terminal state, reopen from resolved.
    #[must_use]
    pub fn can_transition_to(self, to: IncidentStatus) -> bool {
        use IncidentStatus::*;
        matches!(
            (self, to),
            (Open, InProgress)
                | (Open, Closed)
                | (InProgress, Resolved)
                | (InProgress, Closed)
                | (Resolved, Closed)
                | (Resolved, InProgress)
        )
    }
}

impl ChangeStatus {
    /// Change table: draft → pending_approval → {approved, rejected};
    /// approved → {implemented, failed}. No reopen of any terminal state.
    #[must_use]
    pub fn can_transition_to(self, to: ChangeStatus) -> bool {
        use ChangeStatus::*;
        matches!(
            (self, to),
            (Draft, PendingApproval)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
                | (Approved, Implemented)
                | (Approved, Failed)
        )
    }
}

impl ServiceRequestStatus {
    /// Service request table: open → in_progress → {resolved, cancelled};
    /// resolved → closed.
    #[must_use]
    pub fn can_transition_to(self, to: ServiceRequestStatus) -> bool {
        use ServiceRequestStatus::*;
        matches!(
            (self, to),
            (Open, InProgress)
                | (InProgress, Resolved)
                | (InProgress, Cancelled)
                | (Resolved, Closed)
        )
    }
}

/// Check a requested status change against the kind's transition table.
///
/// # Errors
///
/// [`LifecycleError::InvalidTransition`] when the move is not in the
/// table or the requested status belongs to a different kind. The error
/// names both the attempted and the current status.
pub fn check_transition(current: TicketStatus, requested: TicketStatus) -> Result<TransitionCheck> {
    if current == requested {
        return Ok(TransitionCheck::NoOp);
    }

    let allowed = match (current, requested) {
        (TicketStatus::Incident(from), TicketStatus::Incident(to)) => from.can_transition_to(to),
        (TicketStatus::Change(from), TicketStatus::Change(to)) => from.can_transition_to(to),
        (TicketStatus::ServiceRequest(from), TicketStatus::ServiceRequest(to)) => {
            from.can_transition_to(to)
        }
        // Kind mismatch is never legal.
        _ => false,
    };

    if !allowed {
        return Err(LifecycleError::invalid_transition(
            requested.as_str(),
            current.as_str(),
        ));
    }

    let needs_reopen_window = matches!(
        (current, requested),
        (
            TicketStatus::Incident(IncidentStatus::Resolved),
            TicketStatus::Incident(IncidentStatus::InProgress),
        )
    );

    Ok(TransitionCheck::Apply(Transition {
        from: current,
        to: requested,
        enters_resolved: !current.is_resolved_class() && requested.is_resolved_class(),
        leaves_resolved: current.is_resolved_class() && !requested.is_resolved_class(),
        records_response: requested.is_response(),
        needs_reopen_window,
    }))
}

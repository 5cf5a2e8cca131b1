//! Type definitions for the ticket lifecycle domain.
//!
//! Kind-specific status enums plus the tagged [`TicketStatus`] union that
//! lets one generic repository serve all three ticket kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three ticket kinds handled by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// Unplanned interruption or degradation of a service.
    Incident,
    /// Proposed change that moves through an approval chain.
    ChangeRequest,
    /// Routine request for something from the service catalog.
    ServiceRequest,
}

impl TicketKind {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incident => "incident",
            Self::ChangeRequest => "change_request",
            Self::ServiceRequest => "service_request",
        }
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket priority, ordered from least to most urgent.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "ticket_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Incident lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    /// Reported, nobody working on it yet.
    Open,
    /// Being actively worked.
    InProgress,
    /// Fix applied, awaiting closure (or reopen).
    Resolved,
    /// Done. No further transitions.
    Closed,
}

impl IncidentStatus {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Whether no further transition is permitted from here.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether entering this status records a resolution.
    #[must_use]
    pub fn is_resolved_class(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Whether entering this status counts as the first response.
    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

/// Change request lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    /// Being drafted by the requester. The only deletable state.
    Draft,
    /// Submitted, waiting for an approval decision.
    PendingApproval,
    /// Approved for implementation.
    Approved,
    /// Declined. Terminal.
    Rejected,
    /// Implemented successfully. Terminal.
    Implemented,
    /// Implementation attempted and failed. Terminal.
    Failed,
}

impl ChangeStatus {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Implemented => "implemented",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transition is permitted from here.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Implemented | Self::Failed)
    }

    /// Whether entering this status records a resolution.
    #[must_use]
    pub fn is_resolved_class(&self) -> bool {
        matches!(self, Self::Implemented)
    }

    /// Whether entering this status counts as the first response.
    ///
    /// For changes the approval decision is the response; moving a draft
    /// into the approval queue is requester activity.
    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Service request lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRequestStatus {
    /// Submitted, not yet picked up.
    Open,
    /// Being fulfilled.
    InProgress,
    /// Fulfilled, awaiting closure.
    Resolved,
    /// Withdrawn before fulfilment. Terminal.
    Cancelled,
    /// Done. Terminal.
    Closed,
}

impl ServiceRequestStatus {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Cancelled => "cancelled",
            Self::Closed => "closed",
        }
    }

    /// Whether no further transition is permitted from here.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Closed)
    }

    /// Whether entering this status records a resolution.
    ///
    /// Cancellation stops the SLA clock, so it records a completion
    /// timestamp like resolution does.
    #[must_use]
    pub fn is_resolved_class(&self) -> bool {
        matches!(self, Self::Resolved | Self::Cancelled | Self::Closed)
    }

    /// Whether entering this status counts as the first response.
    #[must_use]
    pub fn is_response(&self) -> bool {
        matches!(self, Self::InProgress)
    }
}

/// Kind-tagged ticket status.
///
/// Always serializes as the bare snake_case status name; parsing requires
/// the kind, since names like `open` exist for more than one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketStatus {
    Incident(IncidentStatus),
    Change(ChangeStatus),
    ServiceRequest(ServiceRequestStatus),
}

impl TicketStatus {
    /// The status every ticket of the given kind starts in.
    #[must_use]
    pub fn initial(kind: TicketKind) -> Self {
        match kind {
            TicketKind::Incident => Self::Incident(IncidentStatus::Open),
            TicketKind::ChangeRequest => Self::Change(ChangeStatus::Draft),
            TicketKind::ServiceRequest => Self::ServiceRequest(ServiceRequestStatus::Open),
        }
    }

    /// The kind this status belongs to.
    #[must_use]
    pub fn kind(&self) -> TicketKind {
        match self {
            Self::Incident(_) => TicketKind::Incident,
            Self::Change(_) => TicketKind::ChangeRequest,
            Self::ServiceRequest(_) => TicketKind::ServiceRequest,
        }
    }

    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Incident(s) => s.as_str(),
            Self::Change(s) => s.as_str(),
            Self::ServiceRequest(s) => s.as_str(),
        }
    }

    /// Parse a status name in the context of a kind.
    #[must_use]
    pub fn parse(kind: TicketKind, s: &str) -> Option<Self> {
        match kind {
            TicketKind::Incident => match s {
                "open" => Some(Self::Incident(IncidentStatus::Open)),
                "in_progress" => Some(Self::Incident(IncidentStatus::InProgress)),
                "resolved" => Some(Self::Incident(IncidentStatus::Resolved)),
                "closed" => Some(Self::Incident(IncidentStatus::Closed)),
                _ => None,
            },
            TicketKind::ChangeRequest => match s {
                "draft" => Some(Self::Change(ChangeStatus::Draft)),
                "pending_approval" => Some(Self::Change(ChangeStatus::PendingApproval)),
                "approved" => Some(Self::Change(ChangeStatus::Approved)),
                "rejected" => Some(Self::Change(ChangeStatus::Rejected)),
                "implemented" => Some(Self::Change(ChangeStatus::Implemented)),
                "failed" => Some(Self::Change(ChangeStatus::Failed)),
                _ => None,
            },
            TicketKind::ServiceRequest => match s {
                "open" => Some(Self::ServiceRequest(ServiceRequestStatus::Open)),
                "in_progress" => Some(Self::ServiceRequest(ServiceRequestStatus::InProgress)),
                "resolved" => Some(Self::ServiceRequest(ServiceRequestStatus::Resolved)),
                "cancelled" => Some(Self::ServiceRequest(ServiceRequestStatus::Cancelled)),
                "closed" => Some(Self::ServiceRequest(ServiceRequestStatus::Closed)),
                _ => None,
            },
        }
    }

    /// Whether no further transition is permitted from here.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Incident(s) => s.is_terminal(),
            Self::Change(s) => s.is_terminal(),
            Self::ServiceRequest(s) => s.is_terminal(),
        }
    }

    /// Whether this status carries a resolution timestamp.
    #[must_use]
    pub fn is_resolved_class(&self) -> bool {
        match self {
            Self::Incident(s) => s.is_resolved_class(),
            Self::Change(s) => s.is_resolved_class(),
            Self::ServiceRequest(s) => s.is_resolved_class(),
        }
    }

    /// Whether entering this status counts as the first response.
    #[must_use]
    pub fn is_response(&self) -> bool {
        match self {
            Self::Incident(s) => s.is_response(),
            Self::Change(s) => s.is_response(),
            Self::ServiceRequest(s) => s.is_response(),
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TicketStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Derived SLA state of a ticket at a point in time. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlaStatus {
    /// Within all deadlines with comfortable margin.
    OnTrack,
    /// Inside the configured tail of the resolution window.
    AtRisk,
    /// No first response and the response deadline has passed.
    ResponseBreached,
    /// The resolution deadline has passed.
    Breached,
    /// Resolved within the resolution deadline.
    ResolvedOnTime,
    /// Resolved after the resolution deadline.
    ResolvedLate,
    /// Past the escalation deadline while unresolved.
    Escalated,
    /// No applicable policy; tracking is degraded.
    NoPolicy,
}

impl SlaStatus {
    /// Stable snake_case name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnTrack => "on_track",
            Self::AtRisk => "at_risk",
            Self::ResponseBreached => "response_breached",
            Self::Breached => "breached",
            Self::ResolvedOnTime => "resolved_on_time",
            Self::ResolvedLate => "resolved_late",
            Self::Escalated => "escalated",
            Self::NoPolicy => "no_policy",
        }
    }
}

impl fmt::Display for SlaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

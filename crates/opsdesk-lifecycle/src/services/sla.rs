//! SLA tracking.
//!
//! Every ticket carries exactly one [`SlaTracking`] record, created in the
//! same transaction as the ticket. Deadlines are computed once at creation
//! from the resolved policy; the current SLA state is always derived by
//! [`compute_status`] from the record and an explicit `now` — never
//! stored, so a cached label can't drift from actual elapsed time.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use opsdesk_core::{PolicyId, TenantId, TicketId};

use crate::error::Result;
use crate::services::policy::SlaPolicyStore;
use crate::services::ticket::Ticket;
use crate::types::SlaStatus;

/// SLA bookkeeping attached 1:1 to a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaTracking {
    /// The ticket this record tracks.
    pub ticket_id: TicketId,
    /// Tenant of the ticket.
    pub tenant_id: TenantId,
    /// The policy the deadlines were computed from, if one resolved.
    pub policy_id: Option<PolicyId>,
    /// Ticket creation time; anchor for all deadlines.
    pub created_at: DateTime<Utc>,
    /// When the first response is due. `None` when no policy resolved.
    pub response_due_at: Option<DateTime<Utc>>,
    /// When resolution is due. `None` when no policy resolved.
    pub resolution_due_at: Option<DateTime<Utc>>,
    /// When the ticket escalates if still unresolved.
    pub escalation_due_at: Option<DateTime<Utc>>,
    /// First qualifying response, recorded once and kept through reopens.
    pub first_response_at: Option<DateTime<Utc>>,
    /// Resolution time; cleared if the ticket is reopened.
    pub resolved_at: Option<DateTime<Utc>>,
    /// One-way escalation flag, flipped by the sweep.
    pub is_escalated: bool,
}

impl SlaTracking {
    /// Record the first response. Set-once: later calls are no-ops.
    ///
    /// Returns whether the timestamp was newly recorded.
    pub fn record_first_response(&mut self, at: DateTime<Utc>) -> bool {
        if self.first_response_at.is_some() {
            return false;
        }
        self.first_response_at = Some(at);
        true
    }

    /// Record the resolution time. Set-once until cleared by a reopen.
    ///
    /// Returns whether the timestamp was newly recorded.
    pub fn record_resolution(&mut self, at: DateTime<Utc>) -> bool {
        if self.resolved_at.is_some() {
            return false;
        }
        self.resolved_at = Some(at);
        true
    }

    /// Clear the resolution on reopen. The first response survives.
    pub fn clear_resolution(&mut self) {
        self.resolved_at = None;
    }

    /// Flip the escalation flag. Monotonic: returns whether this call
    /// performed the flip.
    pub fn mark_escalated(&mut self) -> bool {
        if self.is_escalated {
            return false;
        }
        self.is_escalated = true;
        true
    }
}

/// Derive the SLA state of a tracking record at `now`.
///
/// Pure: identical inputs always yield identical output. Precedence:
/// resolved, breached, response breached, escalated, at risk, on track —
/// with a degraded `NoPolicy` short-circuit when no deadlines exist.
#[must_use]
pub fn compute_status(
    tracking: &SlaTracking,
    now: DateTime<Utc>,
    at_risk_fraction: f64,
) -> SlaStatus {
    let (Some(response_due), Some(resolution_due)) =
        (tracking.response_due_at, tracking.resolution_due_at)
    else {
        return SlaStatus::NoPolicy;
    };

    if let Some(resolved_at) = tracking.resolved_at {
        return if resolved_at <= resolution_due {
            SlaStatus::ResolvedOnTime
        } else {
            SlaStatus::ResolvedLate
        };
    }

    if now > resolution_due {
        return SlaStatus::Breached;
    }

    if tracking.first_response_at.is_none() && now > response_due {
        return SlaStatus::ResponseBreached;
    }

    if let Some(escalation_due) = tracking.escalation_due_at {
        if now > escalation_due {
            return SlaStatus::Escalated;
        }
    }

    // At risk inside the final fraction of the resolution window.
    let window_secs = (resolution_due - tracking.created_at).num_seconds();
    if window_secs > 0 {
        let lead_secs = (window_secs as f64 * at_risk_fraction) as i64;
        let threshold = resolution_due - Duration::seconds(lead_secs);
        if now >= threshold {
            return SlaStatus::AtRisk;
        }
    }

    SlaStatus::OnTrack
}

/// Computes tracking records for new tickets.
///
/// Resolution order: team-specific policy for (category, priority), then
/// the tenant-global policy. A missing policy is a warning, never an
/// error — ticket creation must not be blocked by missing configuration.
pub struct SlaTracker {
    policies: Arc<dyn SlaPolicyStore>,
}

impl SlaTracker {
    /// Create a tracker over a policy store.
    #[must_use]
    pub fn new(policies: Arc<dyn SlaPolicyStore>) -> Self {
        Self { policies }
    }

    /// Build the tracking record for a freshly created ticket.
    ///
    /// The caller persists it atomically with the ticket.
    pub async fn prepare_tracking(&self, ticket: &Ticket) -> Result<SlaTracking> {
        let policy = match self
            .policies
            .find_active(
                ticket.tenant_id,
                Some(ticket.team_id),
                &ticket.category,
                ticket.priority,
            )
            .await?
        {
            Some(policy) => Some(policy),
            None => {
                self.policies
                    .find_active(ticket.tenant_id, None, &ticket.category, ticket.priority)
                    .await?
            }
        };

        let tracking = match policy {
            Some(policy) => SlaTracking {
                ticket_id: ticket.id,
                tenant_id: ticket.tenant_id,
                policy_id: Some(policy.id),
                created_at: ticket.created_at,
                response_due_at: Some(
                    ticket.created_at + Duration::hours(policy.response_time_hours),
                ),
                resolution_due_at: Some(
                    ticket.created_at + Duration::hours(policy.resolution_time_hours),
                ),
                escalation_due_at: policy
                    .escalation_after_hours
                    .map(|h| ticket.created_at + Duration::hours(h)),
                first_response_at: None,
                resolved_at: None,
                is_escalated: false,
            },
            None => {
                warn!(
                    ticket_id = %ticket.id,
                    category = %ticket.category,
                    priority = %ticket.priority,
                    "no SLA policy resolved; tracking created degraded"
                );
                SlaTracking {
                    ticket_id: ticket.id,
                    tenant_id: ticket.tenant_id,
                    policy_id: None,
                    created_at: ticket.created_at,
                    response_due_at: None,
                    resolution_due_at: None,
                    escalation_due_at: None,
                    first_response_at: None,
                    resolved_at: None,
                    is_escalated: false,
                }
            }
        };

        Ok(tracking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::policy::{InMemorySlaPolicyStore, SlaPolicy};
    use crate::services::ticket::{CreateTicketInput, Ticket};
    use crate::types::{Priority, TicketKind};
    use opsdesk_core::{TeamId, UserId};

    const FRACTION: f64 = 0.20;

    fn tracking_at(created_at: DateTime<Utc>) -> SlaTracking {
        SlaTracking {
            ticket_id: TicketId::new(),
            tenant_id: TenantId::new(),
            policy_id: Some(PolicyId::new()),
            created_at,
            response_due_at: Some(created_at + Duration::hours(4)),
            resolution_due_at: Some(created_at + Duration::hours(24)),
            escalation_due_at: Some(created_at + Duration::hours(8)),
            first_response_at: None,
            resolved_at: None,
            is_escalated: false,
        }
    }

    fn test_ticket(tenant_id: TenantId, team_id: TeamId) -> Ticket {
        Ticket::new(
            CreateTicketInput {
                kind: TicketKind::Incident,
                team_id,
                title: "database latency spike".to_string(),
                description: "p99 above 2s since 09:00".to_string(),
                category: "network".to_string(),
                priority: Priority::High,
                metadata: None,
            },
            tenant_id,
            UserId::new(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_deadlines_are_creation_plus_policy_hours() {
        let policies = Arc::new(InMemorySlaPolicyStore::new());
        let tenant_id = TenantId::new();
        let team_id = TeamId::new();
        let now = Utc::now();
        policies
            .insert(SlaPolicy {
                id: PolicyId::new(),
                tenant_id,
                team_id: Some(team_id),
                category: "network".to_string(),
                priority: Priority::High,
                response_time_hours: 4,
                resolution_time_hours: 24,
                escalation_after_hours: Some(8),
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let ticket = test_ticket(tenant_id, team_id);
        let tracking = SlaTracker::new(policies)
            .prepare_tracking(&ticket)
            .await
            .unwrap();

        assert_eq!(
            tracking.response_due_at,
            Some(ticket.created_at + Duration::hours(4))
        );
        assert_eq!(
            tracking.resolution_due_at,
            Some(ticket.created_at + Duration::hours(24))
        );
        assert_eq!(
            tracking.escalation_due_at,
            Some(ticket.created_at + Duration::hours(8))
        );
        assert!(!tracking.is_escalated);
    }

    #[tokio::test]
    async fn test_falls_back_to_global_policy() {
        let policies = Arc::new(InMemorySlaPolicyStore::new());
        let tenant_id = TenantId::new();
        let now = Utc::now();
        let global_id = PolicyId::new();
        policies
            .insert(SlaPolicy {
                id: global_id,
                tenant_id,
                team_id: None,
                category: "network".to_string(),
                priority: Priority::High,
                response_time_hours: 8,
                resolution_time_hours: 48,
                escalation_after_hours: None,
                is_active: true,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let ticket = test_ticket(tenant_id, TeamId::new());
        let tracking = SlaTracker::new(policies)
            .prepare_tracking(&ticket)
            .await
            .unwrap();

        assert_eq!(tracking.policy_id, Some(global_id));
        assert_eq!(tracking.escalation_due_at, None);
    }

    #[tokio::test]
    async fn test_missing_policy_degrades_instead_of_failing() {
        let policies = Arc::new(InMemorySlaPolicyStore::new());
        let ticket = test_ticket(TenantId::new(), TeamId::new());
        let tracking = SlaTracker::new(policies)
            .prepare_tracking(&ticket)
            .await
            .unwrap();

        assert_eq!(tracking.policy_id, None);
        assert_eq!(tracking.response_due_at, None);
        assert_eq!(
            compute_status(&tracking, Utc::now(), FRACTION),
            SlaStatus::NoPolicy
        );
    }

    #[test]
    fn test_first_response_is_set_once() {
        let created = Utc::now();
        let mut tracking = tracking_at(created);

        assert!(tracking.record_first_response(created + Duration::hours(5)));
        assert!(!tracking.record_first_response(created + Duration::hours(6)));
        assert_eq!(
            tracking.first_response_at,
            Some(created + Duration::hours(5))
        );
    }

    #[test]
    fn test_reopen_clears_resolution_but_keeps_response() {
        let created = Utc::now();
        let mut tracking = tracking_at(created);
        tracking.record_first_response(created + Duration::hours(1));
        tracking.record_resolution(created + Duration::hours(10));

        tracking.clear_resolution();

        assert_eq!(tracking.resolved_at, None);
        assert_eq!(
            tracking.first_response_at,
            Some(created + Duration::hours(1))
        );
    }

    #[test]
    fn test_status_pre_response_breach_then_resolved_on_time() {
        // First response at T+5h (response due T+4h), resolved at T+20h
        // (resolution due T+24h).
        let created = Utc::now() - Duration::hours(30);
        let mut tracking = tracking_at(created);

        // At T+5h, no response recorded yet: the response deadline is blown.
        assert_eq!(
            compute_status(&tracking, created + Duration::hours(5), FRACTION),
            SlaStatus::ResponseBreached
        );

        tracking.record_first_response(created + Duration::hours(5));
        tracking.record_resolution(created + Duration::hours(20));

        assert_eq!(
            compute_status(&tracking, created + Duration::hours(21), FRACTION),
            SlaStatus::ResolvedOnTime
        );
    }

    #[test]
    fn test_status_resolved_late() {
        let created = Utc::now() - Duration::hours(40);
        let mut tracking = tracking_at(created);
        tracking.record_first_response(created + Duration::hours(1));
        tracking.record_resolution(created + Duration::hours(30));

        assert_eq!(
            compute_status(&tracking, created + Duration::hours(31), FRACTION),
            SlaStatus::ResolvedLate
        );
    }

    #[test]
    fn test_status_precedence_breach_beats_escalation() {
        let created = Utc::now() - Duration::hours(48);
        let mut tracking = tracking_at(created);
        tracking.record_first_response(created + Duration::hours(1));

        // Past both escalation (T+8h) and resolution (T+24h) deadlines:
        // breached wins.
        assert_eq!(
            compute_status(&tracking, created + Duration::hours(25), FRACTION),
            SlaStatus::Breached
        );
        // Past escalation only: escalated.
        assert_eq!(
            compute_status(&tracking, created + Duration::hours(9), FRACTION),
            SlaStatus::Escalated
        );
    }

    #[test]
    fn test_status_at_risk_window() {
        let created = Utc::now();
        let mut tracking = tracking_at(created);
        tracking.record_first_response(created + Duration::hours(1));
        tracking.escalation_due_at = None;

        // Resolution window is 24h; the final 20% starts at T+19.2h.
        assert_eq!(
            compute_status(&tracking, created + Duration::hours(19), FRACTION),
            SlaStatus::OnTrack
        );
        assert_eq!(
            compute_status(&tracking, created + Duration::hours(20), FRACTION),
            SlaStatus::AtRisk
        );
    }

    #[test]
    fn test_status_is_pure_and_monotonic_while_unresolved() {
        let created = Utc::now();
        let mut tracking = tracking_at(created);
        tracking.record_first_response(created + Duration::minutes(30));
        tracking.escalation_due_at = None;

        let at = created + Duration::hours(12);
        assert_eq!(
            compute_status(&tracking, at, FRACTION),
            compute_status(&tracking, at, FRACTION)
        );

        // Severity never regresses as now advances.
        fn severity(status: SlaStatus) -> u8 {
            match status {
                SlaStatus::OnTrack => 0,
                SlaStatus::AtRisk => 1,
                SlaStatus::Escalated => 2,
                SlaStatus::ResponseBreached => 3,
                SlaStatus::Breached => 4,
                _ => u8::MAX,
            }
        }
        let mut last = 0u8;
        for hour in 0..30 {
            let status = compute_status(&tracking, created + Duration::hours(hour), FRACTION);
            let rank = severity(status);
            assert!(rank >= last, "severity regressed at hour {hour}: {status}");
            last = rank;
        }
    }
}

//! Cross-kind aggregation view.
//!
//! Merges the three ticket kinds into one uniform, paginated stream for
//! dashboards. Scoping happens strictly before filtering and pagination,
//! so a page total reflects exactly what the caller may see.

use std::sync::Arc;

use serde::Serialize;

use chrono::{DateTime, Utc};
use opsdesk_core::{Scope, TeamId, TicketId, UserId};

use crate::authorization::scope_filter;
use crate::error::Result;
use crate::services::ticket::{Page, Ticket, TicketFilter, TicketRepository};
use crate::types::{Priority, TicketKind, TicketStatus};

/// The uniform shape shared by all ticket kinds in listings.
#[derive(Debug, Clone, Serialize)]
pub struct TicketSummary {
    /// Ticket identifier.
    pub id: TicketId,
    /// Which lifecycle the ticket follows.
    pub kind: TicketKind,
    /// Short summary.
    pub title: String,
    /// Priority.
    pub priority: Priority,
    /// Current status.
    pub status: TicketStatus,
    /// Who opened the ticket.
    pub created_by: UserId,
    /// Current assignee, if any.
    pub assigned_to: Option<UserId>,
    /// When the ticket was opened.
    pub created_at: DateTime<Utc>,
    /// Owning team.
    pub team_id: TeamId,
}

impl From<Ticket> for TicketSummary {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            kind: ticket.kind,
            title: ticket.title,
            priority: ticket.priority,
            status: ticket.status,
            created_by: ticket.created_by,
            assigned_to: ticket.assigned_to,
            created_at: ticket.created_at,
            team_id: ticket.team_id,
        }
    }
}

/// Unified listing over all ticket kinds.
pub struct AggregationService {
    repo: Arc<dyn TicketRepository>,
}

impl AggregationService {
    /// Create an aggregation service.
    #[must_use]
    pub fn new(repo: Arc<dyn TicketRepository>) -> Self {
        Self { repo }
    }

    /// List tickets visible to the caller.
    ///
    /// `filter.kind = None` spans all three kinds. Ordering is
    /// deterministic: `created_at` descending, ties broken by `id`
    /// ascending. Returns the page plus the total count of matching rows.
    pub async fn list(
        &self,
        scope: &Scope,
        filter: TicketFilter,
        page: Page,
    ) -> Result<(Vec<TicketSummary>, i64)> {
        let scoped = scope_filter(scope, filter)?;
        let total = self.repo.count(&scoped).await?;
        let items = self
            .repo
            .list(&scoped, page)
            .await?
            .into_iter()
            .map(TicketSummary::from)
            .collect();
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ticket::{CreateTicketInput, InMemoryTicketRepository};
    use crate::services::sla::SlaTracking;
    use opsdesk_core::{TenantId, TicketId};

    async fn seed(
        repo: &InMemoryTicketRepository,
        tenant_id: TenantId,
        team_id: TeamId,
        kind: TicketKind,
        title: &str,
        created_at: DateTime<Utc>,
    ) -> Ticket {
        let ticket = Ticket::new(
            CreateTicketInput {
                kind,
                team_id,
                title: title.to_string(),
                description: String::new(),
                category: "general".to_string(),
                priority: Priority::Medium,
                metadata: None,
            },
            tenant_id,
            UserId::new(),
            created_at,
        );
        let tracking = SlaTracking {
            ticket_id: ticket.id,
            tenant_id,
            policy_id: None,
            created_at,
            response_due_at: None,
            resolution_due_at: None,
            escalation_due_at: None,
            first_response_at: None,
            resolved_at: None,
            is_escalated: false,
        };
        let (ticket, _) = repo.create_pair(ticket, tracking).await.unwrap();
        ticket
    }

    #[tokio::test]
    async fn test_team_member_sees_only_own_team_with_exact_total() {
        let repo = Arc::new(InMemoryTicketRepository::new());
        let tenant_id = TenantId::new();
        let team_a = TeamId::new();
        let team_b = TeamId::new();
        let now = Utc::now();

        for (i, kind) in [
            TicketKind::Incident,
            TicketKind::ServiceRequest,
            TicketKind::ChangeRequest,
        ]
        .iter()
        .enumerate()
        {
            seed(
                &repo,
                tenant_id,
                team_a,
                *kind,
                &format!("team a #{i}"),
                now - chrono::Duration::minutes(i as i64),
            )
            .await;
        }
        for i in 0..2 {
            seed(
                &repo,
                tenant_id,
                team_b,
                TicketKind::Incident,
                &format!("team b #{i}"),
                now,
            )
            .await;
        }

        let service = AggregationService::new(repo);
        let scope = Scope::member(UserId::new(), tenant_id, team_a);
        let (items, total) = service
            .list(&scope, TicketFilter::default(), Page::default())
            .await
            .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(total, 3);
        assert!(items.iter().all(|s| s.team_id == team_a));
    }

    #[tokio::test]
    async fn test_ordering_is_created_desc_then_id_asc() {
        let repo = Arc::new(InMemoryTicketRepository::new());
        let tenant_id = TenantId::new();
        let team_id = TeamId::new();
        let now = Utc::now();

        let older = seed(
            &repo,
            tenant_id,
            team_id,
            TicketKind::Incident,
            "older",
            now - chrono::Duration::hours(1),
        )
        .await;
        let tie_a = seed(&repo, tenant_id, team_id, TicketKind::Incident, "tie", now).await;
        let tie_b = seed(&repo, tenant_id, team_id, TicketKind::Incident, "tie", now).await;

        let service = AggregationService::new(repo);
        let scope = Scope::member(UserId::new(), tenant_id, team_id);
        let (items, _) = service
            .list(&scope, TicketFilter::default(), Page::default())
            .await
            .unwrap();

        let (first_tie, second_tie) = if tie_a.id < tie_b.id {
            (tie_a.id, tie_b.id)
        } else {
            (tie_b.id, tie_a.id)
        };
        let ids: Vec<TicketId> = items.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first_tie, second_tie, older.id]);
    }

    #[tokio::test]
    async fn test_kind_filter_and_pagination_after_scoping() {
        let repo = Arc::new(InMemoryTicketRepository::new());
        let tenant_id = TenantId::new();
        let team_id = TeamId::new();
        let now = Utc::now();

        for i in 0..4i64 {
            seed(
                &repo,
                tenant_id,
                team_id,
                TicketKind::Incident,
                &format!("inc {i}"),
                now - chrono::Duration::minutes(i),
            )
            .await;
        }
        seed(&repo, tenant_id, team_id, TicketKind::ServiceRequest, "sr", now).await;

        let service = AggregationService::new(repo);
        let scope = Scope::member(UserId::new(), tenant_id, team_id);
        let filter = TicketFilter {
            kind: Some(TicketKind::Incident),
            ..TicketFilter::default()
        };
        let (items, total) = service
            .list(&scope, filter, Page { limit: 2, offset: 2 })
            .await
            .unwrap();

        assert_eq!(total, 4);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|s| s.kind == TicketKind::Incident));
    }
}

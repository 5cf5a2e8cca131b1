//! Tickets: the model, the generic repository, and the service that
//! drives every mutation through the authorization filter and the state
//! machine.
//!
//! One repository serves all three kinds, parameterized by the tagged
//! [`TicketStatus`] — there are no per-kind data-access modules. A ticket
//! and its SLA tracking record form an atomic pair: they are created and
//! saved together, and the repository contract requires both writes to
//! land in one transaction.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use opsdesk_core::{Scope, TeamId, TenantId, TicketId, UserId};

use crate::authorization::{authorize, Access};
use crate::config::EngineConfig;
use crate::error::{LifecycleError, Result};
use crate::events::{EventSink, TicketEvent};
use crate::machine::{check_transition, TransitionCheck};
use crate::services::assignment::AssignmentResolver;
use crate::services::sla::{compute_status, SlaTracker, SlaTracking};
use crate::types::{ChangeStatus, Priority, SlaStatus, TicketKind, TicketStatus};

// ============================================================================
// Domain Types
// ============================================================================

/// A ticket of any kind.
#[derive(Debug, Clone, Serialize)]
pub struct Ticket {
    /// Unique identifier.
    pub id: TicketId,
    /// Which lifecycle this ticket follows.
    pub kind: TicketKind,
    /// Tenant this ticket belongs to.
    pub tenant_id: TenantId,
    /// Owning team within the tenant.
    pub team_id: TeamId,
    /// Short summary.
    pub title: String,
    /// Full description.
    pub description: String,
    /// Category, used for SLA policy resolution.
    pub category: String,
    /// Priority, used for SLA policy resolution.
    pub priority: Priority,
    /// Current lifecycle status.
    pub status: TicketStatus,
    /// Who opened the ticket.
    pub created_by: UserId,
    /// Current assignee. Must be on the ticket's team or a platform admin.
    pub assigned_to: Option<UserId>,
    /// When the ticket was opened.
    pub created_at: DateTime<Utc>,
    /// When the ticket was last changed.
    pub updated_at: DateTime<Utc>,
    /// Set iff the status is in the kind's resolved class.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Free-form extension data.
    pub metadata: serde_json::Value,
}

impl Ticket {
    /// Build a new ticket in its kind's initial status.
    #[must_use]
    pub fn new(
        input: CreateTicketInput,
        tenant_id: TenantId,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TicketId::new(),
            kind: input.kind,
            tenant_id,
            team_id: input.team_id,
            title: input.title,
            description: input.description,
            category: input.category,
            priority: input.priority,
            status: TicketStatus::initial(input.kind),
            created_by,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            metadata: input
                .metadata
                .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
        }
    }
}

impl opsdesk_core::TenantScoped for Ticket {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Input for creating a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicketInput {
    /// Which lifecycle the ticket follows.
    pub kind: TicketKind,
    /// Owning team.
    pub team_id: TeamId,
    /// Short summary.
    pub title: String,
    /// Full description.
    #[serde(default)]
    pub description: String,
    /// Category for SLA policy resolution.
    pub category: String,
    /// Priority.
    pub priority: Priority,
    /// Free-form extension data.
    pub metadata: Option<serde_json::Value>,
}

/// Input for updating non-status ticket fields.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTicketInput {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New priority. Does not re-anchor SLA deadlines.
    pub priority: Option<Priority>,
    /// New metadata, replacing the old map.
    pub metadata: Option<serde_json::Value>,
}

/// Filter options for listing tickets.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    /// Restrict to a tenant.
    pub tenant_id: Option<TenantId>,
    /// Restrict to a team.
    pub team_id: Option<TeamId>,
    /// Restrict to one kind; `None` spans all three.
    pub kind: Option<TicketKind>,
    /// Match the snake_case status name across kinds.
    pub status: Option<String>,
    /// Restrict to a priority.
    pub priority: Option<Priority>,
    /// Restrict to an assignee.
    pub assigned_to: Option<UserId>,
    /// Restrict to a creator.
    pub created_by: Option<UserId>,
}

impl TicketFilter {
    fn matches(&self, ticket: &Ticket) -> bool {
        self.tenant_id.is_none_or(|t| ticket.tenant_id == t)
            && self.team_id.is_none_or(|t| ticket.team_id == t)
            && self.kind.is_none_or(|k| ticket.kind == k)
            && self
                .status
                .as_deref()
                .is_none_or(|s| ticket.status.as_str() == s)
            && self.priority.is_none_or(|p| ticket.priority == p)
            && self.assigned_to.is_none_or(|u| ticket.assigned_to == Some(u))
            && self.created_by.is_none_or(|u| ticket.created_by == u)
    }
}

/// Pagination window.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// Maximum number of rows.
    pub limit: i64,
    /// Rows to skip.
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

// ============================================================================
// Repository Trait
// ============================================================================

/// Storage contract for tickets and their tracking records.
///
/// `create_pair` and `save_pair` MUST be atomic: an observer never sees a
/// ticket without its tracking, or a resolved ticket whose tracking lacks
/// `resolved_at`. Listing is ordered `created_at` descending with ties
/// broken by `id` ascending, so pagination is deterministic.
#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Persist a new ticket with its tracking record, atomically.
    async fn create_pair(
        &self,
        ticket: Ticket,
        tracking: SlaTracking,
    ) -> Result<(Ticket, SlaTracking)>;

    /// Fetch a ticket within a tenant.
    async fn get(&self, tenant_id: TenantId, id: TicketId) -> Result<Option<Ticket>>;

    /// Fetch the tracking record for a ticket within a tenant.
    async fn get_tracking(&self, tenant_id: TenantId, id: TicketId)
        -> Result<Option<SlaTracking>>;

    /// Save a ticket (non-status fields, assignment).
    async fn save(&self, ticket: Ticket) -> Result<Ticket>;

    /// Save a ticket and its tracking record, atomically.
    async fn save_pair(
        &self,
        ticket: Ticket,
        tracking: SlaTracking,
    ) -> Result<(Ticket, SlaTracking)>;

    /// Delete a ticket and its tracking record. Returns whether a row
    /// existed.
    async fn delete_pair(&self, tenant_id: TenantId, id: TicketId) -> Result<bool>;

    /// List tickets matching a filter, deterministically ordered.
    async fn list(&self, filter: &TicketFilter, page: Page) -> Result<Vec<Ticket>>;

    /// Count tickets matching a filter.
    async fn count(&self, filter: &TicketFilter) -> Result<i64>;

    /// Unresolved trackings past their escalation deadline and not yet
    /// flagged, oldest deadline first.
    async fn escalation_candidates(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SlaTracking>>;

    /// Flip the one-way escalation flag. Returns whether this call
    /// performed the flip, so concurrent sweeps stay idempotent.
    async fn mark_escalated(&self, tenant_id: TenantId, ticket_id: TicketId) -> Result<bool>;
}

// ============================================================================
// In-Memory Repository (for testing)
// ============================================================================

/// In-memory repository for testing.
#[derive(Debug, Default)]
pub struct InMemoryTicketRepository {
    tickets: Arc<RwLock<HashMap<TicketId, Ticket>>>,
    trackings: Arc<RwLock<HashMap<TicketId, SlaTracking>>>,
}

impl InMemoryTicketRepository {
    /// Create an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tickets.
    pub async fn ticket_count(&self) -> usize {
        self.tickets.read().await.len()
    }

    /// Number of stored tracking records.
    pub async fn tracking_count(&self) -> usize {
        self.trackings.read().await.len()
    }
}

#[async_trait]
impl TicketRepository for InMemoryTicketRepository {
    async fn create_pair(
        &self,
        ticket: Ticket,
        tracking: SlaTracking,
    ) -> Result<(Ticket, SlaTracking)> {
        let mut tickets = self.tickets.write().await;
        let mut trackings = self.trackings.write().await;
        tickets.insert(ticket.id, ticket.clone());
        trackings.insert(tracking.ticket_id, tracking.clone());
        Ok((ticket, tracking))
    }

    async fn get(&self, tenant_id: TenantId, id: TicketId) -> Result<Option<Ticket>> {
        let tickets = self.tickets.read().await;
        Ok(tickets
            .get(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn get_tracking(
        &self,
        tenant_id: TenantId,
        id: TicketId,
    ) -> Result<Option<SlaTracking>> {
        let trackings = self.trackings.read().await;
        Ok(trackings
            .get(&id)
            .filter(|t| t.tenant_id == tenant_id)
            .cloned())
    }

    async fn save(&self, ticket: Ticket) -> Result<Ticket> {
        self.tickets.write().await.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn save_pair(
        &self,
        ticket: Ticket,
        tracking: SlaTracking,
    ) -> Result<(Ticket, SlaTracking)> {
        let mut tickets = self.tickets.write().await;
        let mut trackings = self.trackings.write().await;
        tickets.insert(ticket.id, ticket.clone());
        trackings.insert(tracking.ticket_id, tracking.clone());
        Ok((ticket, tracking))
    }

    async fn delete_pair(&self, tenant_id: TenantId, id: TicketId) -> Result<bool> {
        let mut tickets = self.tickets.write().await;
        let mut trackings = self.trackings.write().await;
        match tickets.get(&id) {
            Some(t) if t.tenant_id == tenant_id => {
                tickets.remove(&id);
                trackings.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, filter: &TicketFilter, page: Page) -> Result<Vec<Ticket>> {
        let tickets = self.tickets.read().await;
        let mut rows: Vec<Ticket> = tickets.values().filter(|t| filter.matches(t)).cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(rows
            .into_iter()
            .skip(page.offset.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, filter: &TicketFilter) -> Result<i64> {
        let tickets = self.tickets.read().await;
        Ok(tickets.values().filter(|t| filter.matches(t)).count() as i64)
    }

    async fn escalation_candidates(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<SlaTracking>> {
        let trackings = self.trackings.read().await;
        let mut rows: Vec<SlaTracking> = trackings
            .values()
            .filter(|t| {
                !t.is_escalated
                    && t.resolved_at.is_none()
                    && t.escalation_due_at.is_some_and(|due| due < now)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.escalation_due_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_escalated(&self, tenant_id: TenantId, ticket_id: TicketId) -> Result<bool> {
        let mut trackings = self.trackings.write().await;
        match trackings.get_mut(&ticket_id) {
            Some(t) if t.tenant_id == tenant_id => Ok(t.mark_escalated()),
            _ => Ok(false),
        }
    }
}

// ============================================================================
// Service
// ============================================================================

/// Drives every ticket mutation: authorization filter first, then the
/// state machine, then SLA bookkeeping, then one atomic store write.
pub struct TicketService {
    repo: Arc<dyn TicketRepository>,
    tracker: SlaTracker,
    assignment: AssignmentResolver,
    events: Arc<dyn EventSink>,
    config: EngineConfig,
}

impl TicketService {
    /// Create a ticket service.
    pub fn new(
        repo: Arc<dyn TicketRepository>,
        tracker: SlaTracker,
        assignment: AssignmentResolver,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            repo,
            tracker,
            assignment,
            events,
            config,
        }
    }

    fn ensure_tenant(scope: &Scope, tenant_id: TenantId) -> Result<()> {
        if scope.is_platform_admin() || scope.tenant_id() == Some(tenant_id) {
            Ok(())
        } else {
            Err(LifecycleError::AccessDenied)
        }
    }

    /// Read with one transparent retry; reads are idempotent, writes are
    /// never retried.
    async fn get_ticket(&self, tenant_id: TenantId, id: TicketId) -> Result<Option<Ticket>> {
        match self.repo.get(tenant_id, id).await {
            Err(LifecycleError::Persistence(_)) => self.repo.get(tenant_id, id).await,
            other => other,
        }
    }

    async fn emit(&self, event: TicketEvent) {
        // Events feed notification collaborators; a publish failure must
        // not roll back already committed state.
        if let Err(e) = self.events.publish(event).await {
            warn!(error = %e, "failed to publish ticket event");
        }
    }

    /// Create a ticket together with its SLA tracking record.
    pub async fn create(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        input: CreateTicketInput,
    ) -> Result<(Ticket, SlaTracking)> {
        Self::ensure_tenant(scope, tenant_id)?;
        if !scope.is_platform_admin() && scope.team_id() != Some(input.team_id) {
            return Err(LifecycleError::AccessDenied);
        }
        if input.title.trim().is_empty() {
            return Err(LifecycleError::Validation {
                field: "title".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        let ticket = Ticket::new(input, tenant_id, scope.user_id(), Utc::now());
        let tracking = self.tracker.prepare_tracking(&ticket).await?;
        let (ticket, tracking) = self.repo.create_pair(ticket, tracking).await?;

        info!(
            ticket_id = %ticket.id,
            kind = %ticket.kind,
            tenant_id = %ticket.tenant_id,
            "ticket created"
        );
        self.emit(TicketEvent::TicketCreated {
            ticket_id: ticket.id,
            kind: ticket.kind,
            tenant_id: ticket.tenant_id,
            team_id: ticket.team_id,
            created_by: ticket.created_by,
        })
        .await;

        Ok((ticket, tracking))
    }

    /// Fetch a ticket the caller may read.
    pub async fn get(&self, scope: &Scope, tenant_id: TenantId, id: TicketId) -> Result<Ticket> {
        Self::ensure_tenant(scope, tenant_id)?;
        let ticket = self
            .get_ticket(tenant_id, id)
            .await?
            .ok_or_else(|| LifecycleError::ticket_not_found(id))?;
        authorize(scope, Access::Read, &ticket)?;
        Ok(ticket)
    }

    /// Fetch a ticket's tracking record and its SLA state at `now`.
    pub async fn sla_status(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        id: TicketId,
        now: DateTime<Utc>,
    ) -> Result<(SlaTracking, SlaStatus)> {
        let _ticket = self.get(scope, tenant_id, id).await?;
        let tracking = self
            .repo
            .get_tracking(tenant_id, id)
            .await?
            .ok_or_else(|| {
                LifecycleError::Persistence(format!("tracking record missing for ticket {id}"))
            })?;
        let status = compute_status(&tracking, now, self.config.at_risk_fraction);
        Ok((tracking, status))
    }

    /// Move a ticket to a new status.
    ///
    /// Validates against the persisted current status; a transition to
    /// the current status succeeds without mutating anything. Status and
    /// SLA timestamps are written as one atomic pair.
    pub async fn transition(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        id: TicketId,
        requested: TicketStatus,
    ) -> Result<Ticket> {
        Self::ensure_tenant(scope, tenant_id)?;
        let mut ticket = self
            .get_ticket(tenant_id, id)
            .await?
            .ok_or_else(|| LifecycleError::ticket_not_found(id))?;
        authorize(scope, Access::Write, &ticket)?;

        let transition = match check_transition(ticket.status, requested)? {
            TransitionCheck::NoOp => return Ok(ticket),
            TransitionCheck::Apply(t) => t,
        };

        let now = Utc::now();
        if transition.needs_reopen_window {
            let window = Duration::hours(self.config.reopen_window_hours);
            let reopenable = ticket
                .resolved_at
                .is_some_and(|resolved_at| now <= resolved_at + window);
            if !reopenable {
                return Err(LifecycleError::invalid_transition(
                    requested.as_str(),
                    ticket.status.as_str(),
                ));
            }
        }

        let mut tracking = self
            .repo
            .get_tracking(tenant_id, id)
            .await?
            .ok_or_else(|| {
                LifecycleError::Persistence(format!("tracking record missing for ticket {id}"))
            })?;

        let from = ticket.status;
        ticket.status = transition.to;
        ticket.updated_at = now;
        if transition.enters_resolved {
            ticket.resolved_at = Some(now);
            tracking.record_resolution(now);
        }
        if transition.leaves_resolved {
            ticket.resolved_at = None;
            tracking.clear_resolution();
        }
        if transition.records_response {
            tracking.record_first_response(now);
        }

        let (ticket, _tracking) = self.repo.save_pair(ticket, tracking).await?;

        info!(
            ticket_id = %ticket.id,
            from = from.as_str(),
            to = ticket.status.as_str(),
            "ticket transitioned"
        );
        self.emit(TicketEvent::TicketTransitioned {
            ticket_id: ticket.id,
            kind: ticket.kind,
            tenant_id: ticket.tenant_id,
            from: from.as_str().to_string(),
            to: ticket.status.as_str().to_string(),
            actor: scope.user_id(),
        })
        .await;

        Ok(ticket)
    }

    /// Assign or unassign a ticket.
    ///
    /// Unassigning is always permitted for anyone with write access;
    /// assigning validates the assignee against the resolver.
    pub async fn assign(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        id: TicketId,
        assignee: Option<UserId>,
    ) -> Result<Ticket> {
        Self::ensure_tenant(scope, tenant_id)?;
        let mut ticket = self
            .get_ticket(tenant_id, id)
            .await?
            .ok_or_else(|| LifecycleError::ticket_not_found(id))?;
        authorize(scope, Access::Write, &ticket)?;

        if ticket.status.is_terminal() {
            return Err(LifecycleError::Validation {
                field: "assigned_to".to_string(),
                message: "ticket is in a terminal status".to_string(),
            });
        }

        if let Some(user_id) = assignee {
            self.assignment
                .check_assignable(scope, &ticket, user_id)
                .await?;
        }

        ticket.assigned_to = assignee;
        ticket.updated_at = Utc::now();
        let ticket = self.repo.save(ticket).await?;

        self.emit(TicketEvent::TicketAssigned {
            ticket_id: ticket.id,
            kind: ticket.kind,
            tenant_id: ticket.tenant_id,
            assignee,
            actor: scope.user_id(),
        })
        .await;

        Ok(ticket)
    }

    /// Update non-status fields.
    pub async fn update(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        id: TicketId,
        input: UpdateTicketInput,
    ) -> Result<Ticket> {
        Self::ensure_tenant(scope, tenant_id)?;
        let mut ticket = self
            .get_ticket(tenant_id, id)
            .await?
            .ok_or_else(|| LifecycleError::ticket_not_found(id))?;
        authorize(scope, Access::Write, &ticket)?;

        if let Some(title) = input.title {
            if title.trim().is_empty() {
                return Err(LifecycleError::Validation {
                    field: "title".to_string(),
                    message: "must not be empty".to_string(),
                });
            }
            ticket.title = title;
        }
        if let Some(description) = input.description {
            ticket.description = description;
        }
        if let Some(priority) = input.priority {
            ticket.priority = priority;
        }
        if let Some(metadata) = input.metadata {
            ticket.metadata = metadata;
        }
        ticket.updated_at = Utc::now();

        self.repo.save(ticket).await
    }

    /// Delete a ticket. Only change requests still in draft are
    /// deletable; everything else is kept for the record.
    pub async fn delete(&self, scope: &Scope, tenant_id: TenantId, id: TicketId) -> Result<()> {
        Self::ensure_tenant(scope, tenant_id)?;
        let ticket = self
            .get_ticket(tenant_id, id)
            .await?
            .ok_or_else(|| LifecycleError::ticket_not_found(id))?;
        authorize(scope, Access::Write, &ticket)?;

        if ticket.status != TicketStatus::Change(ChangeStatus::Draft) {
            return Err(LifecycleError::Validation {
                field: "status".to_string(),
                message: "only draft change requests may be deleted".to_string(),
            });
        }

        self.repo.delete_pair(tenant_id, id).await?;
        info!(ticket_id = %id, "draft change request deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemoryEventSink;
    use crate::services::assignment::InMemoryDirectoryStore;
    use crate::services::policy::{InMemorySlaPolicyStore, SlaPolicy};
    use crate::types::{IncidentStatus, ServiceRequestStatus};
    use opsdesk_core::PolicyId;

    struct Fixture {
        service: TicketService,
        repo: Arc<InMemoryTicketRepository>,
        directory: Arc<InMemoryDirectoryStore>,
        policies: Arc<InMemorySlaPolicyStore>,
        events: Arc<InMemoryEventSink>,
        tenant_id: TenantId,
        team_id: TeamId,
        agent: UserId,
    }

    async fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryTicketRepository::new());
        let directory = Arc::new(InMemoryDirectoryStore::new());
        let policies = Arc::new(InMemorySlaPolicyStore::new());
        let events = Arc::new(InMemoryEventSink::new());
        let tenant_id = TenantId::new();
        let team_id = TeamId::new();
        let agent = UserId::new();
        directory.add_member(tenant_id, team_id, agent).await;

        let service = TicketService::new(
            repo.clone(),
            SlaTracker::new(policies.clone()),
            AssignmentResolver::new(directory.clone()),
            events.clone(),
            EngineConfig::default(),
        );

        Fixture {
            service,
            repo,
            directory,
            policies,
            events,
            tenant_id,
            team_id,
            agent,
        }
    }

    fn incident_input(team_id: TeamId) -> CreateTicketInput {
        CreateTicketInput {
            kind: TicketKind::Incident,
            team_id,
            title: "VPN down in Berlin office".to_string(),
            description: "no tunnel since 08:30".to_string(),
            category: "network".to_string(),
            priority: Priority::High,
            metadata: None,
        }
    }

    async fn seed_policy(fx: &Fixture) {
        let now = Utc::now();
        fx.policies
            .insert(SlaPolicy {
                id: PolicyId::new(),
                tenant_id: fx.tenant_id,
                team_id: Some(fx.team_id),
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
    }

    #[tokio::test]
    async fn test_create_persists_ticket_and_tracking_together() {
        let fx = fixture().await;
        seed_policy(&fx).await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);

        let (ticket, tracking) = fx
            .service
            .create(&scope, fx.tenant_id, incident_input(fx.team_id))
            .await
            .unwrap();

        assert_eq!(ticket.status, TicketStatus::Incident(IncidentStatus::Open));
        assert_eq!(tracking.ticket_id, ticket.id);
        assert_eq!(fx.repo.ticket_count().await, 1);
        assert_eq!(fx.repo.tracking_count().await, 1);
        assert_eq!(fx.events.count().await, 1);
    }

    #[tokio::test]
    async fn test_create_outside_own_team_is_denied() {
        let fx = fixture().await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);
        let err = fx
            .service
            .create(&scope, fx.tenant_id, incident_input(TeamId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::AccessDenied));
        assert_eq!(fx.repo.ticket_count().await, 0);
    }

    #[tokio::test]
    async fn test_transition_records_response_and_resolution() {
        let fx = fixture().await;
        seed_policy(&fx).await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);
        let (ticket, _) = fx
            .service
            .create(&scope, fx.tenant_id, incident_input(fx.team_id))
            .await
            .unwrap();

        let ticket = fx
            .service
            .transition(
                &scope,
                fx.tenant_id,
                ticket.id,
                TicketStatus::Incident(IncidentStatus::InProgress),
            )
            .await
            .unwrap();
        let tracking = fx
            .repo
            .get_tracking(fx.tenant_id, ticket.id)
            .await
            .unwrap()
            .unwrap();
        assert!(tracking.first_response_at.is_some());
        let first_response = tracking.first_response_at;

        let ticket = fx
            .service
            .transition(
                &scope,
                fx.tenant_id,
                ticket.id,
                TicketStatus::Incident(IncidentStatus::Resolved),
            )
            .await
            .unwrap();
        assert!(ticket.resolved_at.is_some());
        let tracking = fx
            .repo
            .get_tracking(fx.tenant_id, ticket.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tracking.resolved_at, ticket.resolved_at);
        // First response is permanent once recorded.
        assert_eq!(tracking.first_response_at, first_response);
    }

    #[tokio::test]
    async fn test_self_transition_is_idempotent_success() {
        let fx = fixture().await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);
        let (ticket, _) = fx
            .service
            .create(&scope, fx.tenant_id, incident_input(fx.team_id))
            .await
            .unwrap();
        let before = fx.events.count().await;

        let unchanged = fx
            .service
            .transition(
                &scope,
                fx.tenant_id,
                ticket.id,
                TicketStatus::Incident(IncidentStatus::Open),
            )
            .await
            .unwrap();

        assert_eq!(unchanged.status, ticket.status);
        assert_eq!(unchanged.updated_at, ticket.updated_at);
        // No event for a no-op.
        assert_eq!(fx.events.count().await, before);
    }

    #[tokio::test]
    async fn test_invalid_transition_leaves_ticket_unchanged() {
        let fx = fixture().await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);
        let (ticket, _) = fx
            .service
            .create(&scope, fx.tenant_id, incident_input(fx.team_id))
            .await
            .unwrap();

        let err = fx
            .service
            .transition(
                &scope,
                fx.tenant_id,
                ticket.id,
                TicketStatus::Incident(IncidentStatus::Resolved),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

        let persisted = fx.service.get(&scope, fx.tenant_id, ticket.id).await.unwrap();
        assert_eq!(persisted.status, TicketStatus::Incident(IncidentStatus::Open));
    }

    #[tokio::test]
    async fn test_reopen_clears_resolution_within_window() {
        let fx = fixture().await;
        seed_policy(&fx).await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);
        let (ticket, _) = fx
            .service
            .create(&scope, fx.tenant_id, incident_input(fx.team_id))
            .await
            .unwrap();

        for status in [IncidentStatus::InProgress, IncidentStatus::Resolved] {
            fx.service
                .transition(&scope, fx.tenant_id, ticket.id, TicketStatus::Incident(status))
                .await
                .unwrap();
        }

        let reopened = fx
            .service
            .transition(
                &scope,
                fx.tenant_id,
                ticket.id,
                TicketStatus::Incident(IncidentStatus::InProgress),
            )
            .await
            .unwrap();
        assert_eq!(reopened.resolved_at, None);

        let tracking = fx
            .repo
            .get_tracking(fx.tenant_id, ticket.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tracking.resolved_at, None);
        assert!(tracking.first_response_at.is_some());
    }

    #[tokio::test]
    async fn test_assign_validates_population_and_unassign_is_free() {
        let fx = fixture().await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);
        let (ticket, _) = fx
            .service
            .create(&scope, fx.tenant_id, incident_input(fx.team_id))
            .await
            .unwrap();

        let stranger = UserId::new();
        let err = fx
            .service
            .assign(&scope, fx.tenant_id, ticket.id, Some(stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::NotAssignable { .. }));

        let teammate = UserId::new();
        fx.directory
            .add_member(fx.tenant_id, fx.team_id, teammate)
            .await;
        let assigned = fx
            .service
            .assign(&scope, fx.tenant_id, ticket.id, Some(teammate))
            .await
            .unwrap();
        assert_eq!(assigned.assigned_to, Some(teammate));

        let unassigned = fx
            .service
            .assign(&scope, fx.tenant_id, ticket.id, None)
            .await
            .unwrap();
        assert_eq!(unassigned.assigned_to, None);
    }

    #[tokio::test]
    async fn test_delete_is_draft_change_only() {
        let fx = fixture().await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);

        let (incident, _) = fx
            .service
            .create(&scope, fx.tenant_id, incident_input(fx.team_id))
            .await
            .unwrap();
        let err = fx
            .service
            .delete(&scope, fx.tenant_id, incident.id)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::Validation { .. }));

        let (draft, _) = fx
            .service
            .create(
                &scope,
                fx.tenant_id,
                CreateTicketInput {
                    kind: TicketKind::ChangeRequest,
                    team_id: fx.team_id,
                    title: "rotate TLS certificates".to_string(),
                    description: String::new(),
                    category: "security".to_string(),
                    priority: Priority::Medium,
                    metadata: None,
                },
            )
            .await
            .unwrap();
        fx.service.delete(&scope, fx.tenant_id, draft.id).await.unwrap();
        assert_eq!(fx.repo.ticket_count().await, 1);
        assert_eq!(fx.repo.tracking_count().await, 1);
    }

    #[tokio::test]
    async fn test_service_request_cancellation_stops_the_clock() {
        let fx = fixture().await;
        let scope = Scope::member(fx.agent, fx.tenant_id, fx.team_id);
        let (ticket, _) = fx
            .service
            .create(
                &scope,
                fx.tenant_id,
                CreateTicketInput {
                    kind: TicketKind::ServiceRequest,
                    team_id: fx.team_id,
                    title: "access to billing dashboard".to_string(),
                    description: String::new(),
                    category: "access".to_string(),
                    priority: Priority::Low,
                    metadata: None,
                },
            )
            .await
            .unwrap();

        fx.service
            .transition(
                &scope,
                fx.tenant_id,
                ticket.id,
                TicketStatus::ServiceRequest(ServiceRequestStatus::InProgress),
            )
            .await
            .unwrap();
        let cancelled = fx
            .service
            .transition(
                &scope,
                fx.tenant_id,
                ticket.id,
                TicketStatus::ServiceRequest(ServiceRequestStatus::Cancelled),
            )
            .await
            .unwrap();
        assert!(cancelled.resolved_at.is_some());
        assert!(cancelled.status.is_terminal());
    }
}

//! Shared fixtures for lifecycle integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;

use opsdesk_core::{PolicyId, Scope, TeamId, TenantId, UserId};
use opsdesk_lifecycle::{
    AggregationService, AssignmentResolver, CommentService, CreateTicketInput, EngineConfig,
    InMemoryCommentStore, InMemoryDirectoryStore, InMemoryEventSink, InMemorySlaPolicyStore,
    InMemoryTicketRepository, Priority, SlaPolicy, SlaTracker, TicketKind, TicketService,
};

/// Fully wired engine over in-memory stores.
pub struct TestEnv {
    pub tickets: TicketService,
    pub aggregation: AggregationService,
    pub comments: CommentService,
    pub repo: Arc<InMemoryTicketRepository>,
    pub directory: Arc<InMemoryDirectoryStore>,
    pub policies: Arc<InMemorySlaPolicyStore>,
    pub events: Arc<InMemoryEventSink>,
}

impl TestEnv {
    pub fn new() -> Self {
        let repo = Arc::new(InMemoryTicketRepository::new());
        let directory = Arc::new(InMemoryDirectoryStore::new());
        let policies = Arc::new(InMemorySlaPolicyStore::new());
        let events = Arc::new(InMemoryEventSink::new());

        let tickets = TicketService::new(
            repo.clone(),
            SlaTracker::new(policies.clone()),
            AssignmentResolver::new(directory.clone()),
            events.clone(),
            EngineConfig::default(),
        );
        let aggregation = AggregationService::new(repo.clone());
        let comments = CommentService::new(Arc::new(InMemoryCommentStore::new()), repo.clone());

        Self {
            tickets,
            aggregation,
            comments,
            repo,
            directory,
            policies,
            events,
        }
    }

    /// Register a user on a team and return their scope.
    pub async fn member(&self, tenant_id: TenantId, team_id: TeamId) -> Scope {
        let user_id = UserId::new();
        self.directory.add_member(tenant_id, team_id, user_id).await;
        Scope::member(user_id, tenant_id, team_id)
    }

    /// Seed a team-scoped SLA policy: 4h response, 24h resolution, 8h
    /// escalation.
    pub async fn seed_policy(&self, tenant_id: TenantId, team_id: TeamId, category: &str) {
        let now = Utc::now();
        self.policies
            .insert(SlaPolicy {
                id: PolicyId::new(),
                tenant_id,
                team_id: Some(team_id),
                category: category.to_string(),
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
}

/// A ready-to-create incident in the given team.
pub fn incident_input(team_id: TeamId, title: &str) -> CreateTicketInput {
    CreateTicketInput {
        kind: TicketKind::Incident,
        team_id,
        title: title.to_string(),
        description: "integration fixture".to_string(),
        category: "network".to_string(),
        priority: Priority::High,
        metadata: None,
    }
}

/// A ready-to-create change request in the given team.
pub fn change_input(team_id: TeamId, title: &str) -> CreateTicketInput {
    CreateTicketInput {
        kind: TicketKind::ChangeRequest,
        team_id,
        title: title.to_string(),
        description: String::new(),
        category: "maintenance".to_string(),
        priority: Priority::Medium,
        metadata: None,
    }
}

//! Outbound domain events.
//!
//! The engine publishes lifecycle events through the [`EventSink`] seam;
//! comment, audit and notification collaborators consume them. Event type
//! names follow the `opsdesk.<entity>.<action>` convention.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use opsdesk_core::{TeamId, TenantId, TicketId, UserId};

use crate::error::Result;
use crate::types::TicketKind;

/// A lifecycle event emitted after the corresponding state is committed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TicketEvent {
    /// A ticket and its tracking record were created.
    TicketCreated {
        ticket_id: TicketId,
        kind: TicketKind,
        tenant_id: TenantId,
        team_id: TeamId,
        created_by: UserId,
    },
    /// A ticket moved to a new status.
    TicketTransitioned {
        ticket_id: TicketId,
        kind: TicketKind,
        tenant_id: TenantId,
        from: String,
        to: String,
        actor: UserId,
    },
    /// A ticket was assigned or unassigned.
    TicketAssigned {
        ticket_id: TicketId,
        kind: TicketKind,
        tenant_id: TenantId,
        assignee: Option<UserId>,
        actor: UserId,
    },
    /// The escalation sweep flagged an overdue unresolved ticket.
    SlaEscalated {
        ticket_id: TicketId,
        tenant_id: TenantId,
        escalation_due_at: DateTime<Utc>,
    },
}

impl TicketEvent {
    /// Fully qualified event type name.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TicketCreated { .. } => "opsdesk.ticket.created",
            Self::TicketTransitioned { .. } => "opsdesk.ticket.transitioned",
            Self::TicketAssigned { .. } => "opsdesk.ticket.assigned",
            Self::SlaEscalated { .. } => "opsdesk.sla.escalated",
        }
    }
}

/// Destination for outbound events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publish one event.
    async fn publish(&self, event: TicketEvent) -> Result<()>;
}

/// In-memory sink that records events, for testing.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: Arc<RwLock<Vec<TicketEvent>>>,
}

impl InMemoryEventSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// All events published so far, in order.
    pub async fn published(&self) -> Vec<TicketEvent> {
        self.events.read().await.clone()
    }

    /// Number of published events.
    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn publish(&self, event: TicketEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

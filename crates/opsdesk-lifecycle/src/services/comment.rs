//! Ticket comments.
//!
//! Reading and adding comments follows the ticket's own visibility;
//! editing and deleting are restricted to the author or a platform admin.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use opsdesk_core::{CommentId, Scope, TenantId, TicketId, UserId};

use crate::authorization::{authorize, Access};
use crate::error::{LifecycleError, Result};
use crate::services::ticket::TicketRepository;
use crate::types::TicketKind;

/// A comment on a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier.
    pub id: CommentId,
    /// The ticket commented on.
    pub ticket_id: TicketId,
    /// Kind of that ticket.
    pub kind: TicketKind,
    /// Tenant of that ticket.
    pub tenant_id: TenantId,
    /// Comment text.
    pub body: String,
    /// Author.
    pub created_by: UserId,
    /// When written.
    pub created_at: DateTime<Utc>,
    /// When last edited.
    pub updated_at: DateTime<Utc>,
}

/// Storage contract for comments.
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Persist a new comment.
    async fn create(&self, comment: Comment) -> Result<Comment>;

    /// Fetch a comment within a tenant.
    async fn get(&self, tenant_id: TenantId, id: CommentId) -> Result<Option<Comment>>;

    /// Save an edited comment.
    async fn save(&self, comment: Comment) -> Result<Comment>;

    /// Delete a comment. Returns whether a row existed.
    async fn delete(&self, tenant_id: TenantId, id: CommentId) -> Result<bool>;

    /// All comments of a ticket, oldest first.
    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<Comment>>;
}

/// In-memory comment store for testing.
#[derive(Debug, Default)]
pub struct InMemoryCommentStore {
    comments: Arc<RwLock<HashMap<CommentId, Comment>>>,
}

impl InMemoryCommentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommentStore for InMemoryCommentStore {
    async fn create(&self, comment: Comment) -> Result<Comment> {
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn get(&self, tenant_id: TenantId, id: CommentId) -> Result<Option<Comment>> {
        let comments = self.comments.read().await;
        Ok(comments
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn save(&self, comment: Comment) -> Result<Comment> {
        self.comments
            .write()
            .await
            .insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn delete(&self, tenant_id: TenantId, id: CommentId) -> Result<bool> {
        let mut comments = self.comments.write().await;
        match comments.get(&id) {
            Some(c) if c.tenant_id == tenant_id => {
                comments.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_ticket(
        &self,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<Comment>> {
        let comments = self.comments.read().await;
        let mut rows: Vec<Comment> = comments
            .values()
            .filter(|c| c.tenant_id == tenant_id && c.ticket_id == ticket_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(rows)
    }
}

/// Comment operations, gated by ticket visibility and authorship.
pub struct CommentService {
    comments: Arc<dyn CommentStore>,
    tickets: Arc<dyn TicketRepository>,
}

impl CommentService {
    /// Create a comment service.
    pub fn new(comments: Arc<dyn CommentStore>, tickets: Arc<dyn TicketRepository>) -> Self {
        Self { comments, tickets }
    }

    async fn readable_ticket(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<crate::services::ticket::Ticket> {
        let ticket = self
            .tickets
            .get(tenant_id, ticket_id)
            .await?
            .ok_or_else(|| LifecycleError::ticket_not_found(ticket_id))?;
        authorize(scope, Access::Read, &ticket)?;
        Ok(ticket)
    }

    /// Add a comment to a ticket the caller can read.
    pub async fn add(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        ticket_id: TicketId,
        body: String,
    ) -> Result<Comment> {
        if body.trim().is_empty() {
            return Err(LifecycleError::Validation {
                field: "body".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        let ticket = self.readable_ticket(scope, tenant_id, ticket_id).await?;

        let now = Utc::now();
        self.comments
            .create(Comment {
                id: CommentId::new(),
                ticket_id,
                kind: ticket.kind,
                tenant_id,
                body,
                created_by: scope.user_id(),
                created_at: now,
                updated_at: now,
            })
            .await
    }

    /// Edit a comment. Author or platform admin only.
    pub async fn edit(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        id: CommentId,
        body: String,
    ) -> Result<Comment> {
        let mut comment = self
            .comments
            .get(tenant_id, id)
            .await?
            .ok_or(LifecycleError::NotFound {
                resource: "comment",
                id: id.to_string(),
            })?;

        if !scope.is_platform_admin() && comment.created_by != scope.user_id() {
            return Err(LifecycleError::AccessDenied);
        }

        comment.body = body;
        comment.updated_at = Utc::now();
        self.comments.save(comment).await
    }

    /// Delete a comment. Author or platform admin only.
    pub async fn remove(&self, scope: &Scope, tenant_id: TenantId, id: CommentId) -> Result<()> {
        let comment = self
            .comments
            .get(tenant_id, id)
            .await?
            .ok_or(LifecycleError::NotFound {
                resource: "comment",
                id: id.to_string(),
            })?;

        if !scope.is_platform_admin() && comment.created_by != scope.user_id() {
            return Err(LifecycleError::AccessDenied);
        }

        self.comments.delete(tenant_id, id).await?;
        Ok(())
    }

    /// List a ticket's comments, oldest first.
    pub async fn list(
        &self,
        scope: &Scope,
        tenant_id: TenantId,
        ticket_id: TicketId,
    ) -> Result<Vec<Comment>> {
        self.readable_ticket(scope, tenant_id, ticket_id).await?;
        self.comments.list_for_ticket(tenant_id, ticket_id).await
    }
}

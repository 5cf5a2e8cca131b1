//! Assignment resolution.
//!
//! Restricts who a ticket can be assigned to: team members for regular
//! callers, the whole tenant (or installation) for platform admins. The
//! user directory itself is owned by an external collaborator and reached
//! through the [`DirectoryStore`] seam.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use opsdesk_core::{Scope, TeamId, TenantId, UserId};

use crate::error::{LifecycleError, Result};
use crate::services::ticket::Ticket;

/// Read-only view of the user directory.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    /// Users belonging to a team.
    async fn team_members(&self, tenant_id: TenantId, team_id: TeamId) -> Result<Vec<UserId>>;

    /// All users of a tenant.
    async fn tenant_users(&self, tenant_id: TenantId) -> Result<Vec<UserId>>;

    /// All users of the installation.
    async fn all_users(&self) -> Result<Vec<UserId>>;

    /// Whether a user holds the platform administrator role.
    async fn is_platform_admin(&self, user_id: UserId) -> Result<bool>;
}

/// In-memory directory for testing.
#[derive(Debug, Default)]
pub struct InMemoryDirectoryStore {
    members: Arc<RwLock<Vec<(TenantId, TeamId, UserId)>>>,
    admins: Arc<RwLock<HashSet<UserId>>>,
}

impl InMemoryDirectoryStore {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user as a member of a team.
    pub async fn add_member(&self, tenant_id: TenantId, team_id: TeamId, user_id: UserId) {
        self.members.write().await.push((tenant_id, team_id, user_id));
    }

    /// Register a platform administrator.
    pub async fn add_platform_admin(&self, user_id: UserId) {
        self.admins.write().await.insert(user_id);
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn team_members(&self, tenant_id: TenantId, team_id: TeamId) -> Result<Vec<UserId>> {
        let members = self.members.read().await;
        Ok(members
            .iter()
            .filter(|(t, tm, _)| *t == tenant_id && *tm == team_id)
            .map(|(_, _, u)| *u)
            .collect())
    }

    async fn tenant_users(&self, tenant_id: TenantId) -> Result<Vec<UserId>> {
        let members = self.members.read().await;
        Ok(members
            .iter()
            .filter(|(t, _, _)| *t == tenant_id)
            .map(|(_, _, u)| *u)
            .collect())
    }

    async fn all_users(&self) -> Result<Vec<UserId>> {
        let members = self.members.read().await;
        Ok(members.iter().map(|(_, _, u)| *u).collect())
    }

    async fn is_platform_admin(&self, user_id: UserId) -> Result<bool> {
        Ok(self.admins.read().await.contains(&user_id))
    }
}

/// Resolves the assignable population and validates assignments.
pub struct AssignmentResolver {
    directory: Arc<dyn DirectoryStore>,
}

impl AssignmentResolver {
    /// Create a resolver over a directory.
    #[must_use]
    pub fn new(directory: Arc<dyn DirectoryStore>) -> Self {
        Self { directory }
    }

    /// The set of users the caller may assign this ticket to.
    ///
    /// Platform admins see every user of the ticket's tenant (the whole
    /// installation if the tenant is unknown to the directory); everyone
    /// else sees the members of their own team.
    pub async fn assignable_users(&self, scope: &Scope, ticket: &Ticket) -> Result<HashSet<UserId>> {
        if scope.is_platform_admin() {
            let tenant_users = self.directory.tenant_users(ticket.tenant_id).await?;
            if tenant_users.is_empty() {
                return Ok(self.directory.all_users().await?.into_iter().collect());
            }
            return Ok(tenant_users.into_iter().collect());
        }

        let Some(team_id) = scope.team_id() else {
            return Ok(HashSet::new());
        };
        let Some(tenant_id) = scope.tenant_id() else {
            return Ok(HashSet::new());
        };
        Ok(self
            .directory
            .team_members(tenant_id, team_id)
            .await?
            .into_iter()
            .collect())
    }

    /// Validate a proposed assignee.
    ///
    /// The assignee must be in the caller's assignable population and,
    /// per the ticket invariant, belong to the ticket's own team or be a
    /// platform admin.
    pub async fn check_assignable(
        &self,
        scope: &Scope,
        ticket: &Ticket,
        assignee: UserId,
    ) -> Result<()> {
        let assignable = self.assignable_users(scope, ticket).await?;
        if !assignable.contains(&assignee) {
            return Err(LifecycleError::NotAssignable { user_id: assignee });
        }

        if self.directory.is_platform_admin(assignee).await? {
            return Ok(());
        }
        let ticket_team = self
            .directory
            .team_members(ticket.tenant_id, ticket.team_id)
            .await?;
        if !ticket_team.contains(&assignee) {
            return Err(LifecycleError::NotAssignable { user_id: assignee });
        }

        Ok(())
    }
}

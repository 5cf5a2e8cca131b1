//! SLA policy lookup.
//!
//! Policies are administered by an external collaborator; the engine only
//! resolves them. A policy is keyed by team, category and priority, with
//! `team_id = None` marking a tenant-global fallback.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use opsdesk_core::{PolicyId, TeamId, TenantId};

use crate::error::{LifecycleError, Result};
use crate::types::Priority;

/// An SLA policy: deadlines in hours from ticket creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaPolicy {
    /// Unique identifier.
    pub id: PolicyId,
    /// Tenant this policy belongs to.
    pub tenant_id: TenantId,
    /// Team the policy applies to; `None` means tenant-global.
    pub team_id: Option<TeamId>,
    /// Ticket category the policy applies to.
    pub category: String,
    /// Ticket priority the policy applies to.
    pub priority: Priority,
    /// Hours until the first response is due.
    pub response_time_hours: i64,
    /// Hours until resolution is due. Never less than the response time.
    pub resolution_time_hours: i64,
    /// Hours until an unresolved ticket escalates, if escalation applies.
    pub escalation_after_hours: Option<i64>,
    /// Inactive policies are ignored by resolution.
    pub is_active: bool,
    /// When created.
    pub created_at: DateTime<Utc>,
    /// When last updated.
    pub updated_at: DateTime<Utc>,
}

impl SlaPolicy {
    /// Validate the policy invariant: resolution due no earlier than
    /// response due.
    pub fn validate(&self) -> Result<()> {
        if self.resolution_time_hours < self.response_time_hours {
            return Err(LifecycleError::Validation {
                field: "resolution_time_hours".to_string(),
                message: format!(
                    "resolution time ({}h) must not be shorter than response time ({}h)",
                    self.resolution_time_hours, self.response_time_hours
                ),
            });
        }
        if self.response_time_hours <= 0 {
            return Err(LifecycleError::Validation {
                field: "response_time_hours".to_string(),
                message: "response time must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Read-only policy storage as seen from the engine.
#[async_trait]
pub trait SlaPolicyStore: Send + Sync {
    /// Find the active policy for (team, category, priority).
    ///
    /// `team_id = None` restricts the search to tenant-global policies;
    /// the fallback chain is driven by the caller.
    async fn find_active(
        &self,
        tenant_id: TenantId,
        team_id: Option<TeamId>,
        category: &str,
        priority: Priority,
    ) -> Result<Option<SlaPolicy>>;
}

/// In-memory policy store for testing.
#[derive(Debug, Default)]
pub struct InMemorySlaPolicyStore {
    policies: Arc<RwLock<Vec<SlaPolicy>>>,
}

impl InMemorySlaPolicyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            policies: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Insert a policy, enforcing the policy invariants.
    pub async fn insert(&self, policy: SlaPolicy) -> Result<()> {
        policy.validate()?;
        self.policies.write().await.push(policy);
        Ok(())
    }

    /// Number of stored policies.
    pub async fn count(&self) -> usize {
        self.policies.read().await.len()
    }
}

#[async_trait]
impl SlaPolicyStore for InMemorySlaPolicyStore {
    async fn find_active(
        &self,
        tenant_id: TenantId,
        team_id: Option<TeamId>,
        category: &str,
        priority: Priority,
    ) -> Result<Option<SlaPolicy>> {
        let policies = self.policies.read().await;
        Ok(policies
            .iter()
            .find(|p| {
                p.is_active
                    && p.tenant_id == tenant_id
                    && p.team_id == team_id
                    && p.category == category
                    && p.priority == priority
            })
            .cloned())
    }
}

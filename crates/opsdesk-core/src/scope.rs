//! Request scope resolution.
//!
//! Every request resolves its authenticated principal into a [`Scope`]
//! exactly once; the scope value is then threaded explicitly through every
//! engine call. Nothing downstream re-derives roles or team membership on
//! its own, which is where privilege-escalation bugs tend to creep in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::ids::{TeamId, TenantId, UserId};

/// Role granted to operators who administer the whole installation.
pub const PLATFORM_ADMIN_ROLE: &str = "platform_admin";

/// A validated session as produced by the authentication collaborator.
///
/// The engine never inspects credentials; it only consumes this already
/// verified shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// The authenticated user.
    pub user_id: UserId,
    /// Tenant the session belongs to. Platform operators may have none.
    pub tenant_id: Option<TenantId>,
    /// Default team of the user within the tenant.
    pub team_id: Option<TeamId>,
    /// Role names attached to the session.
    pub roles: Vec<String>,
    /// When the session stops being valid.
    pub expires_at: DateTime<Utc>,
}

impl Principal {
    /// Whether the session carries the platform administrator role.
    #[must_use]
    pub fn is_platform_admin(&self) -> bool {
        self.roles.iter().any(|r| r == PLATFORM_ADMIN_ROLE)
    }
}

/// What a caller may see and mutate, computed once per request.
///
/// Request-scoped and never persisted. Carries the caller's `user_id` so
/// the self-access rule (creator/assignee) can be evaluated without going
/// back to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    user_id: UserId,
    is_platform_admin: bool,
    tenant_id: Option<TenantId>,
    team_id: Option<TeamId>,
}

impl Scope {
    /// Resolve a scope from an (optional) authenticated principal.
    ///
    /// Pure: no side effects, no clock reads beyond the `now` argument.
    ///
    /// # Errors
    ///
    /// [`CoreError::Unauthenticated`] when the session is missing, expired,
    /// or structurally invalid (a non-admin without tenant and team).
    pub fn resolve(principal: Option<&Principal>, now: DateTime<Utc>) -> Result<Self> {
        let principal = principal.ok_or_else(CoreError::unauthenticated)?;

        if principal.expires_at <= now {
            return Err(CoreError::Unauthenticated {
                message: Some("session expired".to_string()),
            });
        }

        let is_platform_admin = principal.is_platform_admin();

        // A regular member without an organizational context cannot be
        // scoped to anything; treat the session as invalid.
        if !is_platform_admin && (principal.tenant_id.is_none() || principal.team_id.is_none()) {
            return Err(CoreError::Unauthenticated {
                message: Some("session has no organizational context".to_string()),
            });
        }

        Ok(Self {
            user_id: principal.user_id,
            is_platform_admin,
            tenant_id: principal.tenant_id,
            team_id: principal.team_id,
        })
    }

    /// Construct a platform administrator scope directly.
    #[must_use]
    pub fn platform_admin(user_id: UserId) -> Self {
        Self {
            user_id,
            is_platform_admin: true,
            tenant_id: None,
            team_id: None,
        }
    }

    /// Construct a team member scope directly.
    #[must_use]
    pub fn member(user_id: UserId, tenant_id: TenantId, team_id: TeamId) -> Self {
        Self {
            user_id,
            is_platform_admin: false,
            tenant_id: Some(tenant_id),
            team_id: Some(team_id),
        }
    }

    /// The calling user.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Whether the caller administers the whole installation.
    #[must_use]
    pub fn is_platform_admin(&self) -> bool {
        self.is_platform_admin
    }

    /// Tenant the caller is scoped to, if any.
    #[must_use]
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Team the caller is scoped to, if any.
    #[must_use]
    pub fn team_id(&self) -> Option<TeamId> {
        self.team_id
    }
}

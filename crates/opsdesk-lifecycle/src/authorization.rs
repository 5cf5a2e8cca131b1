//! Scope-based authorization.
//!
//! Single-ticket access is decided by [`authorize`]; list queries are
//! rewritten by [`scope_filter`] before they reach the store, so
//! pagination totals can never leak the existence of out-of-scope rows.

use opsdesk_core::Scope;

use crate::error::{LifecycleError, Result};
use crate::services::ticket::{Ticket, TicketFilter};

/// The level of access an operation needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read the ticket or its comments/tracking.
    Read,
    /// Mutate the ticket: field updates, transitions, assignment.
    Write,
}

/// Decide whether `scope` may act on `ticket`, in rule order:
///
/// 1. Platform admin: always allowed.
/// 2. Tenant mismatch: denied.
/// 3. Team match: allowed.
/// 4. Self-access: the creator or current assignee may read and update
///    the ticket even outside their default team (cross-team handoff).
/// 5. Otherwise: denied, revealing nothing about the resource.
pub fn authorize(scope: &Scope, _access: Access, ticket: &Ticket) -> Result<()> {
    if scope.is_platform_admin() {
        return Ok(());
    }

    if scope.tenant_id() != Some(ticket.tenant_id) {
        return Err(LifecycleError::AccessDenied);
    }

    if scope.team_id() == Some(ticket.team_id) {
        return Ok(());
    }

    let user_id = scope.user_id();
    if ticket.created_by == user_id || ticket.assigned_to == Some(user_id) {
        return Ok(());
    }

    Err(LifecycleError::AccessDenied)
}

/// Rewrite a list filter with the scope's visibility constraints.
///
/// Non-admins get tenant and team equality constraints injected,
/// overriding whatever the caller supplied. Self-access does not widen
/// lists; it applies to direct reads and updates only.
pub fn scope_filter(scope: &Scope, mut filter: TicketFilter) -> Result<TicketFilter> {
    if scope.is_platform_admin() {
        return Ok(filter);
    }

    let (Some(tenant_id), Some(team_id)) = (scope.tenant_id(), scope.team_id()) else {
        return Err(LifecycleError::AccessDenied);
    };

    filter.tenant_id = Some(tenant_id);
    filter.team_id = Some(team_id);
    Ok(filter)
}

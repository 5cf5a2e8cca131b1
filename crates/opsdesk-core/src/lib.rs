//! opsdesk shared foundation.
//!
//! Types used by every opsdesk crate:
//!
//! - [`ids`] — strongly typed identifiers (`TenantId`, `TeamId`, `UserId`,
//!   `TicketId`, ...)
//! - [`scope`] — the per-request [`Scope`] and its resolver
//! - [`error`] — shared error types ([`CoreError`])
//! - [`traits`] — multi-tenant marker traits ([`TenantScoped`])

pub mod error;
pub mod ids;
pub mod scope;
pub mod traits;

pub use error::{CoreError, Result};
pub use ids::{CommentId, PolicyId, TeamId, TenantId, TicketId, UserId};
pub use scope::{Principal, Scope, PLATFORM_ADMIN_ROLE};
pub use traits::TenantScoped;

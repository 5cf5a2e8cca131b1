//! Ticket lifecycle engine.
//!
//! The core domain of opsdesk: per-kind ticket state machines, SLA
//! deadline and escalation tracking, and the tenant-scoped authorization
//! layer that every read and write flows through.
//!
//! # Modules
//!
//! - [`types`] — ticket kinds, priorities, kind-specific statuses, the
//!   tagged [`TicketStatus`] union and the derived [`SlaStatus`]
//! - [`machine`] — per-kind transition tables, checked against persisted
//!   state
//! - [`authorization`] — scope checks and list-query rewriting
//! - [`services`] — ticket, SLA, policy, assignment, aggregation and
//!   comment services with their store traits and in-memory backends
//! - [`events`] — outbound domain events behind the [`EventSink`] seam
//! - [`jobs`] — the periodic escalation sweep
//! - [`store`] — Postgres store implementations
//!
//! # Flow
//!
//! Request → scope resolution (`opsdesk-core`) → authorization filter →
//! state machine → SLA tracker → one atomic repository write → events.

pub mod authorization;
pub mod config;
pub mod error;
pub mod events;
pub mod jobs;
pub mod machine;
pub mod services;
pub mod store;
pub mod types;

pub use authorization::{authorize, scope_filter, Access};
pub use config::EngineConfig;
pub use error::{LifecycleError, Result};
pub use events::{EventSink, InMemoryEventSink, TicketEvent};
pub use jobs::{EscalationSweepJob, SweepStats};
pub use machine::{check_transition, Transition, TransitionCheck};
pub use services::{
    compute_status, AggregationService, AssignmentResolver, Comment, CommentService, CommentStore,
    CreateTicketInput, DirectoryStore, InMemoryCommentStore, InMemoryDirectoryStore,
    InMemorySlaPolicyStore, InMemoryTicketRepository, Page, SlaPolicy, SlaPolicyStore, SlaTracker,
    SlaTracking, Ticket, TicketFilter, TicketRepository, TicketService, TicketSummary,
    UpdateTicketInput,
};
pub use types::{
    ChangeStatus, IncidentStatus, Priority, ServiceRequestStatus, SlaStatus, TicketKind,
    TicketStatus,
};

//! Background jobs.
//!
//! Jobs run outside the interactive request path with their own failure
//! isolation; a failed poll cycle is logged and retried on the next tick,
//! never propagated into request handling.

pub mod escalation;

pub use escalation::{EscalationSweepJob, SweepStats};

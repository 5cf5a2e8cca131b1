//! Store implementations.
//!
//! The in-memory backends live next to their traits in [`crate::services`];
//! this module holds the Postgres bindings used in production.

pub mod postgres;

pub use postgres::{PgSlaPolicyStore, PgTicketRepository, MIGRATOR};

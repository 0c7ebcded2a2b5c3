//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (Host header)
//!     → holder.rs (lock-free snapshot of the current table)
//!     → table.rs (first rule whose pattern occurs in the host)
//!     → Return: BackendGroup handle or NoMatch
//!
//! Table replacement (on reload):
//!     config::reload builds a new RoutingTable
//!     → holder.rs publish (versioned, single atomic store)
//!     → later lookups observe the new table
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; reloads build a new one and swap the reference
//! - No regex in hot path (substring scan only)
//! - Deterministic: same host always matches the same rule within a table
//! - First match wins (ordered as written in the rule file)

pub mod holder;
pub mod table;

pub use holder::SharedRoutingTable;
pub use table::{Rule, RoutingTable};

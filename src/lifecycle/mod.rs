//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load rules (fatal on error) → Start watcher → Start metrics → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop watcher → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: rules first, then background tasks, then listeners
//! - A broken rule file at startup is fatal; later broken files are not

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;

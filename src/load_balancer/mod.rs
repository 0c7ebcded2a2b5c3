//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Host resolved → BackendGroup handle
//!     → pool.rs (group of backends built from rule endpoints)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through backends)
//!         - least_conn.rs (pick backend with fewest connections)
//!     → backend.rs (connection guard)
//!     → Forward request, return upstream response
//! ```
//!
//! # Design Decisions
//! - Groups are built per rule and live inside a routing table snapshot
//! - Algorithm selection per group, from proxy settings
//! - Saturated backends (max connections reached) are skipped

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod backend;
pub mod least_conn;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendError};
pub use pool::{BackendGroup, BackendGroupHandle, DispatchError, GroupOptions, UpstreamClient};

/// Strategy for picking a backend within a group.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Returns the next backend to use, or None if none can take traffic.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}

/// Load balancing algorithm, as named in proxy settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Balancing {
    #[default]
    RoundRobin,
    LeastConnections,
}

impl Balancing {
    pub(crate) fn build(self) -> Box<dyn LoadBalancer> {
        match self {
            Balancing::RoundRobin => Box::new(round_robin::RoundRobin::new()),
            Balancing::LeastConnections => Box::new(least_conn::LeastConnections::new()),
        }
    }
}

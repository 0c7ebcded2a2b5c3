//! Shared slot holding the current routing table.
//!
//! Readers load an `Arc` snapshot without locking and keep using it for as
//! long as they like; a publish swaps the whole reference in one store.

use arc_swap::ArcSwapOption;
use std::sync::{Arc, Mutex};

use crate::load_balancer::BackendGroupHandle;
use crate::routing::table::RoutingTable;

#[derive(Debug, Default)]
struct Inner {
    current: ArcSwapOption<RoutingTable>,
    // Held by publishers only; stamps versions in publish order.
    publish_lock: Mutex<u64>,
}

/// Cloneable handle to the process-wide routing table slot.
#[derive(Debug, Clone, Default)]
pub struct SharedRoutingTable {
    inner: Arc<Inner>,
}

impl SharedRoutingTable {
    /// An empty holder; resolves nothing until the first publish.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current table, if one has been published.
    pub fn snapshot(&self) -> Option<Arc<RoutingTable>> {
        self.inner.current.load_full()
    }

    /// Resolve `host` against the current table.
    pub fn resolve(&self, host: &str) -> Option<BackendGroupHandle> {
        let guard = self.inner.current.load();
        let current: &Option<Arc<RoutingTable>> = &guard;
        current.as_ref()?.resolve(host).cloned()
    }

    /// Replace the current table. Returns the published snapshot.
    pub fn publish(&self, table: RoutingTable) -> Arc<RoutingTable> {
        let mut version = self
            .inner
            .publish_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *version += 1;

        let table = Arc::new(table.with_version(*version));
        self.inner.current.store(Some(table.clone()));

        tracing::debug!(version = *version, rules = table.len(), "Routing table published");
        table
    }

    /// Whether a table has been published yet.
    pub fn is_initialized(&self) -> bool {
        self.inner.current.load().is_some()
    }

    /// Version of the current table, 0 before the first publish.
    pub fn version(&self) -> u64 {
        let guard = self.inner.current.load();
        let current: &Option<Arc<RoutingTable>> = &guard;
        current.as_ref().map(|table| table.version()).unwrap_or(0)
    }
}

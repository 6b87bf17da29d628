//! Per-node sequencing for refreshes
//!
//! Two refreshes that patch the same fields of the same node must not
//! interleave: the later response would otherwise be free to land first. Each
//! (node, facet) pair gets its own async lock; refreshes of different nodes or
//! of disjoint facets never wait on each other.

use crate::types::NodeId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Field set a refresh writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Facet {
    /// Node metadata and, when loaded, its child list
    Metadata,
    /// Document availability slots only
    Documents,
}

/// Per-node lock manager for refresh sequencing
pub struct NodeLockManager {
    /// Map from (node, facet) to its async lock
    locks: Arc<RwLock<HashMap<(NodeId, Facet), Arc<Mutex<()>>>>>,
}

impl NodeLockManager {
    /// Create a new node lock manager
    pub fn new() -> Self {
        Self {
            locks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn get_node_lock(&self, key: (NodeId, Facet)) -> Arc<Mutex<()>> {
        {
            let map = self.locks.read();
            if let Some(lock) = map.get(&key) {
                return lock.clone();
            }
        }

        let mut map = self.locks.write();
        // Another caller may have inserted it between the two locks
        map.entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Wait for exclusive access to one facet of a node
    ///
    /// The guard is owned so it can be held across `.await` points.
    pub async fn acquire(&self, node_id: NodeId, facet: Facet) -> OwnedMutexGuard<()> {
        self.get_node_lock((node_id, facet)).lock_owned().await
    }

    /// Drop the locks of nodes that left the store
    pub fn forget(&self, node_ids: &[NodeId]) {
        if node_ids.is_empty() {
            return;
        }
        let mut map = self.locks.write();
        map.retain(|(id, _), lock| !node_ids.contains(id) || Arc::strong_count(lock) > 1);
    }

    /// Number of tracked locks
    pub fn len(&self) -> usize {
        self.locks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.read().is_empty()
    }
}

impl Default for NodeLockManager {
    fn default() -> Self {
        Self::new()
    }
}

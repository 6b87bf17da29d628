//! Targeted Refresh Controller
//!
//! Re-fetches one narrow slice of cached state and patches only that slice.
//! Callers pick the narrowest scope that covers what changed:
//!
//! | changed                         | scope                  |
//! |---------------------------------|------------------------|
//! | a document of node `n`          | `DocumentAvailability` |
//! | metadata or children of `n`     | `Node`                 |
//! | the root level                  | `Roots`                |
//! | cold start or lost track        | `Full`                 |

use crate::concurrency::{Facet, NodeLockManager};
use crate::error::CatalogError;
use crate::source::CatalogSource;
use crate::tree::store::SharedStore;
use crate::tree::NodePatch;
use crate::types::NodeId;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Slice of cached state to re-fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    /// Node metadata, plus its child list when already loaded
    Node(NodeId),
    /// Document slots of one node; nothing else is touched
    DocumentAvailability(NodeId),
    /// Root listing, keeping the cached state of surviving roots
    Roots,
    /// Discard everything and reload the root level
    Full,
}

/// What a refresh did to the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Addressed slice patched in place
    Patched,
    /// Root level reconciled; holds the root count
    RootsReconciled(usize),
    /// Store rebuilt from the root level; holds the root count
    Reloaded(usize),
    /// Node no longer exists at the source; holds the removed ids
    Removed(Vec<NodeId>),
}

/// Applies targeted refreshes to the shared store
pub struct RefreshController {
    store: SharedStore,
    source: Arc<dyn CatalogSource>,
    locks: NodeLockManager,
    roots_lock: Mutex<()>,
    expected_slots: Option<usize>,
}

impl RefreshController {
    pub fn new(store: SharedStore, source: Arc<dyn CatalogSource>) -> Self {
        Self {
            store,
            source,
            locks: NodeLockManager::new(),
            roots_lock: Mutex::new(()),
            expected_slots: None,
        }
    }

    /// Warn when a document-bearing node reports a slot count other than `count`
    pub fn with_expected_slots(mut self, count: Option<usize>) -> Self {
        self.expected_slots = count;
        self
    }

    /// Refresh the given scope
    pub async fn refresh(&self, scope: RefreshScope) -> Result<RefreshOutcome, CatalogError> {
        debug!(scope = ?scope, "Refreshing");
        match scope {
            RefreshScope::Node(id) => self.refresh_node(id).await,
            RefreshScope::DocumentAvailability(id) => self.refresh_document_availability(id).await,
            RefreshScope::Roots => self.refresh_roots().await,
            RefreshScope::Full => self.reload().await,
        }
    }

    /// Re-fetch one node's metadata and, if loaded, its child list
    ///
    /// A node missing from the store triggers a full reload; a node missing at
    /// the source is removed locally with its subtree.
    pub async fn refresh_node(&self, id: NodeId) -> Result<RefreshOutcome, CatalogError> {
        let cached = self.store.read().get(id);
        let children_loaded = match cached {
            Some(node) => node.children.is_some(),
            None => {
                warn!(node_id = id, "Refresh target not cached, falling back to full reload");
                return self.reload().await;
            }
        };

        let guard = self.locks.acquire(id, Facet::Metadata).await;
        let result = self.patch_node(id, children_loaded).await;
        drop(guard);
        self.settle(result)
    }

    /// Re-fetch only the document slots of a node
    pub async fn refresh_document_availability(
        &self,
        id: NodeId,
    ) -> Result<RefreshOutcome, CatalogError> {
        let cached = self.store.read().contains(id);
        if !cached {
            return Err(CatalogError::NodeNotFound(id));
        }

        let guard = self.locks.acquire(id, Facet::Documents).await;
        let result = self.patch_documents(id).await;
        drop(guard);
        self.settle(result)
    }

    /// Reconcile the root level, keeping state of roots that still exist
    pub async fn refresh_roots(&self) -> Result<RefreshOutcome, CatalogError> {
        let reconciled = {
            let _guard = self.roots_lock.lock().await;
            let roots = self.source.roots().await?;
            let count = roots.len();
            let removed = self.store.write().retain_roots(roots)?;
            info!(roots = count, removed = removed.len(), "Reconciled root level");
            (RefreshOutcome::RootsReconciled(count), removed)
        };
        self.settle(Ok(reconciled))
    }

    /// Rebuild the store from the root level
    pub async fn reload(&self) -> Result<RefreshOutcome, CatalogError> {
        let reloaded = {
            let _guard = self.roots_lock.lock().await;
            let roots = self.source.roots().await?;
            let count = roots.len();
            let removed = self.store.write().replace_roots(roots)?;
            info!(roots = count, "Reloaded catalog tree");
            (RefreshOutcome::Reloaded(count), removed)
        };
        self.settle(Ok(reloaded))
    }

    /// Number of per-node locks currently tracked
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    async fn patch_node(
        &self,
        id: NodeId,
        children_loaded: bool,
    ) -> Result<(RefreshOutcome, Vec<NodeId>), CatalogError> {
        let record = match self.source.node(id).await {
            Ok(record) => record,
            Err(CatalogError::RemoteNotFound(_)) => return self.remove_local(id),
            Err(error) => return Err(error),
        };

        let has_children = record.has_children();
        let children = if !has_children {
            Some(Vec::new())
        } else if children_loaded {
            match self.source.children(id).await {
                Ok(children) => Some(children),
                Err(CatalogError::RemoteNotFound(_)) => return self.remove_local(id),
                Err(error) => return Err(error),
            }
        } else {
            None
        };

        let mut patch = NodePatch::new().metadata(record);
        if !has_children {
            patch = patch.expanded(false);
        }
        if let Some(children) = children {
            patch = patch.children(children);
        }
        let removed = self.store.write().patch(id, patch)?;
        info!(node_id = id, removed = removed.len(), "Refreshed node");
        Ok((RefreshOutcome::Patched, removed))
    }

    async fn patch_documents(
        &self,
        id: NodeId,
    ) -> Result<(RefreshOutcome, Vec<NodeId>), CatalogError> {
        let slots = match self.source.document_availability(id).await {
            Ok(slots) => slots,
            Err(CatalogError::RemoteNotFound(_)) => return self.remove_local(id),
            Err(error) => return Err(error),
        };
        if let Some(expected) = self.expected_slots {
            if !slots.is_empty() && slots.len() != expected {
                warn!(
                    node_id = id,
                    expected,
                    reported = slots.len(),
                    "Document slot count differs from configured document types"
                );
            }
        }
        let filled = slots.iter().filter(|slot| slot.available).count();
        let removed = self
            .store
            .write()
            .patch(id, NodePatch::new().documents(slots))?;
        debug!(node_id = id, filled, "Refreshed document availability");
        Ok((RefreshOutcome::Patched, removed))
    }

    fn remove_local(&self, id: NodeId) -> Result<(RefreshOutcome, Vec<NodeId>), CatalogError> {
        let removed = {
            let mut store = self.store.write();
            if !store.contains(id) {
                return Ok((RefreshOutcome::Removed(Vec::new()), Vec::new()));
            }
            store.detach(id)?
        };
        warn!(node_id = id, removed = removed.len(), "Node gone at source, removed locally");
        Ok((RefreshOutcome::Removed(removed.clone()), removed))
    }

    /// Release the locks of ids that left the store; every guard must be dropped first
    fn settle(
        &self,
        result: Result<(RefreshOutcome, Vec<NodeId>), CatalogError>,
    ) -> Result<RefreshOutcome, CatalogError> {
        let (outcome, removed) = result?;
        self.locks.forget(&removed);
        Ok(outcome)
    }
}

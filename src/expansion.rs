//! Lazy Expansion Controller
//!
//! Fetches and attaches a node's children the first time it is expanded and
//! reuses them afterwards. Per node: `Collapsed -> Loading -> Expanded`,
//! `Expanded -> Collapsed` keeps the children cached, and a failed fetch returns
//! the node to `Collapsed` with the error surfaced.
//!
//! Collapse and fetch completion are ordinary competing patches: whichever is
//! applied last decides `is_expanded`.

use crate::error::CatalogError;
use crate::source::CatalogSource;
use crate::tree::store::SharedStore;
use crate::tree::NodePatch;
use crate::types::NodeId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What an `expand` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpandOutcome {
    /// Node was already expanded
    AlreadyExpanded,
    /// A fetch for this node is already running
    InFlight,
    /// Server reports no children
    NothingToLoad,
    /// Cached children reused without a fetch
    Cached,
    /// Children fetched and attached
    Loaded(usize),
}

impl ExpandOutcome {
    /// Whether the call hit the source
    pub fn fetched(&self) -> bool {
        matches!(self, ExpandOutcome::Loaded(_))
    }
}

/// Drives on-demand loading of subtrees
pub struct ExpansionController {
    store: SharedStore,
    source: Arc<dyn CatalogSource>,
}

impl ExpansionController {
    pub fn new(store: SharedStore, source: Arc<dyn CatalogSource>) -> Self {
        Self { store, source }
    }

    /// Expand a node, fetching its children on first expansion
    pub async fn expand(&self, id: NodeId) -> Result<ExpandOutcome, CatalogError> {
        {
            // Check and mark under one write lock so two callers cannot both fetch
            let mut store = self.store.write();
            let node = store.get(id).ok_or(CatalogError::NodeNotFound(id))?;
            if node.is_expanded {
                debug!(node_id = id, "Expand ignored: already expanded");
                return Ok(ExpandOutcome::AlreadyExpanded);
            }
            if node.is_loading {
                debug!(node_id = id, "Expand ignored: fetch in flight");
                return Ok(ExpandOutcome::InFlight);
            }
            if !node.has_children() {
                debug!(node_id = id, "Expand ignored: no children");
                return Ok(ExpandOutcome::NothingToLoad);
            }
            if node.has_loaded_children() {
                store.patch(id, NodePatch::new().expanded(true))?;
                debug!(node_id = id, "Expanded from cache");
                return Ok(ExpandOutcome::Cached);
            }
            store.patch(id, NodePatch::new().loading(true))?;
        }

        debug!(node_id = id, "Fetching children");
        let fetched = self.source.children(id).await;

        let mut store = self.store.write();
        let result = fetched.and_then(|records| {
            let count = records.len();
            store
                .patch(
                    id,
                    NodePatch::new()
                        .children(records)
                        .expanded(true)
                        .loading(false),
                )
                .map(|_| count)
        });

        match result {
            Ok(count) => {
                info!(node_id = id, children = count, "Loaded children");
                Ok(ExpandOutcome::Loaded(count))
            }
            Err(error) => {
                warn!(node_id = id, error = %error, "Failed to load children");
                let reset = NodePatch::new().loading(false).expanded(false);
                if let Err(reset_error) = store.patch(id, reset) {
                    debug!(node_id = id, error = %reset_error, "Node left the store during fetch");
                }
                Err(error)
            }
        }
    }

    /// Collapse a node; cached children are kept
    pub fn collapse(&self, id: NodeId) -> Result<(), CatalogError> {
        self.store
            .write()
            .patch(id, NodePatch::new().expanded(false))?;
        debug!(node_id = id, "Collapsed");
        Ok(())
    }

    /// Expand when collapsed, collapse when expanded
    pub async fn toggle(&self, id: NodeId) -> Result<Option<ExpandOutcome>, CatalogError> {
        let expanded = self
            .store
            .read()
            .get(id)
            .map(|node| node.is_expanded)
            .ok_or(CatalogError::NodeNotFound(id))?;
        if expanded {
            self.collapse(id)?;
            Ok(None)
        } else {
            self.expand(id).await.map(Some)
        }
    }

    /// Expand each node of a root-to-node path in order
    ///
    /// Stops at the first failure; nodes expanded before it stay expanded.
    pub async fn expand_path(&self, path: &[NodeId]) -> Result<Vec<ExpandOutcome>, CatalogError> {
        let mut outcomes = Vec::with_capacity(path.len());
        for id in path {
            outcomes.push(self.expand(*id).await?);
        }
        Ok(outcomes)
    }
}

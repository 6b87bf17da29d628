//! Catalog Cache facade
//!
//! Wires the node store, the expansion and refresh controllers and the mutation
//! coordinator over one shared store and exposes the caller-facing API.

use crate::config::{CacheConfig, CatalogConfig};
use crate::error::CatalogError;
use crate::expansion::{ExpandOutcome, ExpansionController};
use crate::mutation::MutationCoordinator;
use crate::refresh::{RefreshController, RefreshOutcome, RefreshScope};
use crate::source::{
    CatalogSource, Document, DocumentDraft, DocumentUpdate, HttpCatalogSource, NodeDraft,
    NodeUpdate,
};
use crate::tree::store::SharedStore;
use crate::tree::{Node, NodeRecord, NodeStore, TreeNode};
use crate::types::{DocumentId, NodeId, Revision};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Hierarchical lazy cache over a remote catalog
pub struct CatalogCache {
    store: SharedStore,
    expansion: ExpansionController,
    refresh: Arc<RefreshController>,
    mutations: MutationCoordinator,
}

impl CatalogCache {
    /// Create a cache over any catalog source
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self::with_config(source, &CacheConfig::default())
    }

    pub fn with_config(source: Arc<dyn CatalogSource>, config: &CacheConfig) -> Self {
        let store = NodeStore::shared();
        let refresh = Arc::new(
            RefreshController::new(store.clone(), source.clone())
                .with_expected_slots(config.document_type_count),
        );
        Self {
            expansion: ExpansionController::new(store.clone(), source.clone()),
            mutations: MutationCoordinator::new(store.clone(), source, refresh.clone()),
            refresh,
            store,
        }
    }

    /// Create a cache over the HTTP source described by the configuration
    pub async fn connect(config: &CatalogConfig) -> Result<Self, CatalogError> {
        config.validate().map_err(CatalogError::ConfigError)?;
        let source = HttpCatalogSource::from_config(&config.source)?;
        info!(base_url = %source.base_url(), "Connecting catalog cache");
        let cache = Self::with_config(Arc::new(source), &config.cache);
        if config.cache.load_roots_on_start {
            cache.load_roots().await?;
        }
        Ok(cache)
    }

    /// Cold start: fetch the root level and return the tree view
    pub async fn load_roots(&self) -> Result<Vec<TreeNode>, CatalogError> {
        self.refresh.reload().await?;
        Ok(self.get_tree())
    }

    /// Current root-level view
    pub fn get_tree(&self) -> Vec<TreeNode> {
        self.store.read().tree()
    }

    /// Snapshot of one node
    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.store.read().get(id)
    }

    /// Snapshot of one node and its loaded subtree
    pub fn subtree(&self, id: NodeId) -> Option<TreeNode> {
        self.store.read().tree_node(id)
    }

    /// Number of cached nodes
    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    pub fn revision(&self) -> Revision {
        self.store.read().revision()
    }

    /// Receiver that observes every store revision
    pub fn subscribe(&self) -> watch::Receiver<Revision> {
        self.store.read().subscribe()
    }

    /// Verify structural invariants over the whole cache
    pub fn check_invariants(&self) -> Result<(), CatalogError> {
        self.store.read().check_invariants()
    }

    pub async fn expand(&self, id: NodeId) -> Result<ExpandOutcome, CatalogError> {
        self.expansion.expand(id).await
    }

    pub fn collapse(&self, id: NodeId) -> Result<(), CatalogError> {
        self.expansion.collapse(id)
    }

    pub async fn toggle(&self, id: NodeId) -> Result<Option<ExpandOutcome>, CatalogError> {
        self.expansion.toggle(id).await
    }

    pub async fn expand_path(&self, path: &[NodeId]) -> Result<Vec<ExpandOutcome>, CatalogError> {
        self.expansion.expand_path(path).await
    }

    /// Expand every cached node down to `depth` levels below the roots
    ///
    /// Siblings of one level are fetched concurrently. Returns the number of
    /// fetches made.
    pub async fn expand_to_depth(&self, depth: u32) -> Result<usize, CatalogError> {
        let mut fetches = 0;
        let mut frontier: Vec<NodeId> = self.store.read().roots().to_vec();
        for _ in 0..depth {
            let outcomes = join_all(frontier.iter().map(|id| self.expansion.expand(*id))).await;
            for outcome in outcomes {
                if outcome?.fetched() {
                    fetches += 1;
                }
            }
            let store = self.store.read();
            frontier = frontier
                .iter()
                .filter_map(|id| store.children_of(*id))
                .flatten()
                .copied()
                .collect();
        }
        Ok(fetches)
    }

    pub async fn refresh(&self, scope: RefreshScope) -> Result<RefreshOutcome, CatalogError> {
        self.refresh.refresh(scope).await
    }

    pub async fn refresh_node(&self, id: NodeId) -> Result<RefreshOutcome, CatalogError> {
        self.refresh.refresh(RefreshScope::Node(id)).await
    }

    pub async fn refresh_document_availability(
        &self,
        id: NodeId,
    ) -> Result<RefreshOutcome, CatalogError> {
        self.refresh
            .refresh(RefreshScope::DocumentAvailability(id))
            .await
    }

    pub async fn reload(&self) -> Result<RefreshOutcome, CatalogError> {
        self.refresh.refresh(RefreshScope::Full).await
    }

    pub async fn create_node(
        &self,
        parent_id: Option<NodeId>,
        draft: NodeDraft,
    ) -> Result<NodeRecord, CatalogError> {
        self.mutations.create_node(parent_id, draft).await
    }

    pub async fn update_node(
        &self,
        id: NodeId,
        update: NodeUpdate,
    ) -> Result<NodeRecord, CatalogError> {
        self.mutations.update_node(id, update).await
    }

    pub async fn delete_node(&self, id: NodeId) -> Result<(), CatalogError> {
        self.mutations.delete_node(id).await
    }

    pub async fn create_document(
        &self,
        node_id: NodeId,
        draft: DocumentDraft,
    ) -> Result<Document, CatalogError> {
        self.mutations.create_document(node_id, draft).await
    }

    pub async fn update_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, CatalogError> {
        self.mutations
            .update_document(node_id, document_id, update)
            .await
    }

    pub async fn delete_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
    ) -> Result<(), CatalogError> {
        self.mutations.delete_document(node_id, document_id).await
    }
}

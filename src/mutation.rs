//! Mutation Coordinator
//!
//! Sequences a remote write with exactly one targeted refresh. The coordinator
//! only reads the store (for local fast-fail checks); every store write goes
//! through the refresh controller. A rejected write leaves the store as it was.

use crate::error::CatalogError;
use crate::refresh::{RefreshController, RefreshScope};
use crate::source::{
    CatalogSource, Document, DocumentDraft, DocumentUpdate, NodeDraft, NodeUpdate,
};
use crate::tree::store::SharedStore;
use crate::tree::{Node, NodeRecord};
use crate::types::{DocumentId, NodeId};
use std::sync::Arc;
use tracing::{info, warn};

/// Coordinates writes against the source with the refreshes that follow them
pub struct MutationCoordinator {
    store: SharedStore,
    source: Arc<dyn CatalogSource>,
    refresh: Arc<RefreshController>,
}

impl MutationCoordinator {
    pub fn new(
        store: SharedStore,
        source: Arc<dyn CatalogSource>,
        refresh: Arc<RefreshController>,
    ) -> Self {
        Self {
            store,
            source,
            refresh,
        }
    }

    /// Create a node under `parent_id`, or a root when `None`
    pub async fn create_node(
        &self,
        parent_id: Option<NodeId>,
        draft: NodeDraft,
    ) -> Result<NodeRecord, CatalogError> {
        if let Some(parent) = parent_id.and_then(|id| self.cached(id)) {
            if parent.record.allows_leaf_documents {
                return Err(CatalogError::Conflict(format!(
                    "node {} holds documents and cannot have children",
                    parent.id()
                )));
            }
        }

        let created = self
            .source
            .create_node(parent_id, draft)
            .await
            .map_err(|e| log_write_failure("create_node", parent_id, e))?;
        info!(node_id = created.id, parent_id = ?parent_id, "Created node");

        self.refresh.refresh(parent_scope(parent_id)).await?;
        Ok(created)
    }

    /// Apply a partial update to a node
    pub async fn update_node(
        &self,
        id: NodeId,
        update: NodeUpdate,
    ) -> Result<NodeRecord, CatalogError> {
        if update.allows_leaf_documents == Some(true) {
            if let Some(node) = self.cached(id) {
                if node.has_loaded_children() || node.has_children() {
                    return Err(CatalogError::Conflict(format!(
                        "node {} has children and cannot hold documents",
                        id
                    )));
                }
            }
        }

        let updated = self
            .source
            .update_node(id, update)
            .await
            .map_err(|e| log_write_failure("update_node", Some(id), e))?;
        info!(node_id = id, "Updated node");

        self.refresh.refresh(RefreshScope::Node(id)).await?;
        Ok(updated)
    }

    /// Delete a node; the source cascades and the parent refresh drops the subtree
    pub async fn delete_node(&self, id: NodeId) -> Result<(), CatalogError> {
        let parent_id = self.store.read().parent_of(id)?;

        self.source
            .delete_node(id)
            .await
            .map_err(|e| log_write_failure("delete_node", Some(id), e))?;
        info!(node_id = id, parent_id = ?parent_id, "Deleted node");

        self.refresh.refresh(parent_scope(parent_id)).await?;
        Ok(())
    }

    /// Upload a document into an empty slot of a document-bearing node
    pub async fn create_document(
        &self,
        node_id: NodeId,
        draft: DocumentDraft,
    ) -> Result<Document, CatalogError> {
        let node = self.document_target(node_id)?;
        let taken = node
            .document_availability
            .as_ref()
            .and_then(|slots| {
                slots
                    .iter()
                    .find(|slot| slot.document_type_id == draft.document_type_id)
            })
            .map_or(false, |slot| slot.available);
        if taken {
            return Err(CatalogError::Conflict(format!(
                "node {} already has a document of type {}",
                node_id, draft.document_type_id
            )));
        }

        let document = self
            .source
            .create_document(node_id, draft)
            .await
            .map_err(|e| log_write_failure("create_document", Some(node_id), e))?;
        info!(node_id, document_id = document.id, "Uploaded document");

        self.refresh
            .refresh(RefreshScope::DocumentAvailability(node_id))
            .await?;
        Ok(document)
    }

    pub async fn update_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, CatalogError> {
        self.document_target(node_id)?;

        let document = self
            .source
            .update_document(node_id, document_id, update)
            .await
            .map_err(|e| log_write_failure("update_document", Some(node_id), e))?;
        info!(node_id, document_id, "Updated document");

        self.refresh
            .refresh(RefreshScope::DocumentAvailability(node_id))
            .await?;
        Ok(document)
    }

    pub async fn delete_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
    ) -> Result<(), CatalogError> {
        self.document_target(node_id)?;

        self.source
            .delete_document(node_id, document_id)
            .await
            .map_err(|e| log_write_failure("delete_document", Some(node_id), e))?;
        info!(node_id, document_id, "Deleted document");

        self.refresh
            .refresh(RefreshScope::DocumentAvailability(node_id))
            .await?;
        Ok(())
    }

    fn cached(&self, id: NodeId) -> Option<Node> {
        self.store.read().get(id)
    }

    /// Document writes need a cached, document-bearing node
    fn document_target(&self, node_id: NodeId) -> Result<Node, CatalogError> {
        let node = self
            .cached(node_id)
            .ok_or(CatalogError::NodeNotFound(node_id))?;
        if !node.record.allows_leaf_documents {
            return Err(CatalogError::Conflict(format!(
                "node {} does not accept documents",
                node_id
            )));
        }
        Ok(node)
    }
}

/// Refresh that corrects the child list a node belongs to
fn parent_scope(parent_id: Option<NodeId>) -> RefreshScope {
    match parent_id {
        Some(parent) => RefreshScope::Node(parent),
        None => RefreshScope::Roots,
    }
}

fn log_write_failure(operation: &str, node_id: Option<NodeId>, error: CatalogError) -> CatalogError {
    warn!(operation, node_id = ?node_id, error = %error, "Remote write rejected");
    error
}

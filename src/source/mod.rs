//! Remote Catalog Source
//!
//! Contract for the hierarchical catalog API the cache mirrors, plus the write
//! payloads it accepts. Transport and authentication live in the
//! implementations.

pub mod http;
pub mod memory;

use crate::error::CatalogError;
use crate::tree::{DocumentSlot, NodeRecord};
use crate::types::{DocumentId, DocumentTypeId, NodeId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use http::HttpCatalogSource;
pub use memory::InMemoryCatalogSource;

/// Payload for creating a catalog node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDraft {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Requested sibling position; the source appends when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default)]
    pub allows_leaf_documents: bool,
}

impl NodeDraft {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: None,
            description: None,
            order: None,
            allows_leaf_documents: false,
        }
    }

    pub fn document_bearing(mut self) -> Self {
        self.allows_leaf_documents = true;
        self
    }
}

/// Partial update for a catalog node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allows_leaf_documents: Option<bool>,
}

/// Payload for uploading a document into one slot of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDraft {
    pub document_type_id: DocumentTypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Base64-encoded file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Partial update for an uploaded document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Document as returned by the source after a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: DocumentId,
    pub node_id: NodeId,
    pub document_type_id: DocumentTypeId,
    pub name: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Remote hierarchical catalog API
///
/// Reads return server metadata only; cache-local state never crosses this
/// boundary. Implementations map transport failures onto [`CatalogError`].
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Root-level nodes
    async fn roots(&self) -> Result<Vec<NodeRecord>, CatalogError>;

    /// Direct children of a node
    async fn children(&self, parent_id: NodeId) -> Result<Vec<NodeRecord>, CatalogError>;

    /// Current metadata of one node
    async fn node(&self, id: NodeId) -> Result<NodeRecord, CatalogError>;

    /// One slot per configured document type
    async fn document_availability(
        &self,
        node_id: NodeId,
    ) -> Result<Vec<DocumentSlot>, CatalogError>;

    /// Create a node; `None` creates a root
    async fn create_node(
        &self,
        parent_id: Option<NodeId>,
        draft: NodeDraft,
    ) -> Result<NodeRecord, CatalogError>;

    async fn update_node(&self, id: NodeId, update: NodeUpdate)
        -> Result<NodeRecord, CatalogError>;

    /// Delete a node; the source cascades to its subtree
    async fn delete_node(&self, id: NodeId) -> Result<(), CatalogError>;

    async fn create_document(
        &self,
        node_id: NodeId,
        draft: DocumentDraft,
    ) -> Result<Document, CatalogError>;

    async fn update_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, CatalogError>;

    async fn delete_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
    ) -> Result<(), CatalogError>;
}

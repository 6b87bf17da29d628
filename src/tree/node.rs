//! Catalog node types: server records, cache entries, patches and read views.

use crate::types::{DocumentId, DocumentTypeId, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-side description of one catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub id: NodeId,
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Depth from the root level (roots are level 0)
    #[serde(default)]
    pub level: u32,
    /// Sibling ordering key, unique within one sibling set
    #[serde(default)]
    pub order: i32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Document-bearing nodes never have children
    #[serde(default)]
    pub allows_leaf_documents: bool,
    /// Server-reported child count; zero means expansion never fetches
    #[serde(default)]
    pub child_count: u32,
    #[serde(default)]
    pub document_count: u32,
}

impl NodeRecord {
    pub fn has_children(&self) -> bool {
        self.child_count > 0
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Presence state of one document type within one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSlot {
    pub document_type_id: DocumentTypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_type_name: Option<String>,
    pub available: bool,
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    #[serde(default)]
    pub document_name: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DocumentSlot {
    /// Empty slot for a document type with nothing uploaded yet
    pub fn empty(document_type_id: DocumentTypeId) -> Self {
        Self {
            document_type_id,
            document_type_name: None,
            available: false,
            document_id: None,
            document_name: None,
            updated_at: None,
        }
    }
}

/// Cache entry: server metadata plus cache-local state
///
/// `children` is `None` until the children have been fetched once; a fetched
/// node without children holds `Some(vec![])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub record: NodeRecord,
    pub children: Option<Vec<NodeId>>,
    pub is_expanded: bool,
    pub is_loading: bool,
    pub document_availability: Option<Vec<DocumentSlot>>,
}

impl Node {
    /// Wrap a freshly fetched record as a collapsed, unloaded entry
    pub fn from_record(record: NodeRecord) -> Self {
        Self {
            record,
            children: None,
            is_expanded: false,
            is_loading: false,
            document_availability: None,
        }
    }

    pub fn id(&self) -> NodeId {
        self.record.id
    }

    pub fn parent_id(&self) -> Option<NodeId> {
        self.record.parent_id
    }

    pub fn has_children(&self) -> bool {
        self.record.has_children()
    }

    /// Children fetched and at least one present
    pub fn has_loaded_children(&self) -> bool {
        self.children.as_ref().map_or(false, |c| !c.is_empty())
    }
}

/// Shallow field overwrite applied by [`crate::tree::NodeStore::patch`]
///
/// Absent fields are left untouched. `children` is a child-list replacement:
/// existing children that are absent from the new list are removed together
/// with their loaded subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodePatch {
    pub metadata: Option<NodeRecord>,
    pub children: Option<Vec<NodeRecord>>,
    pub is_expanded: Option<bool>,
    pub is_loading: Option<bool>,
    pub document_availability: Option<Vec<DocumentSlot>>,
}

impl NodePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata(mut self, record: NodeRecord) -> Self {
        self.metadata = Some(record);
        self
    }

    pub fn children(mut self, children: Vec<NodeRecord>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn expanded(mut self, expanded: bool) -> Self {
        self.is_expanded = Some(expanded);
        self
    }

    pub fn loading(mut self, loading: bool) -> Self {
        self.is_loading = Some(loading);
        self
    }

    pub fn documents(mut self, slots: Vec<DocumentSlot>) -> Self {
        self.document_availability = Some(slots);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Detached snapshot of a node and its loaded subtree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    #[serde(flatten)]
    pub record: NodeRecord,
    pub is_expanded: bool,
    pub is_loading: bool,
    pub document_availability: Option<Vec<DocumentSlot>>,
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    pub fn id(&self) -> NodeId {
        self.record.id
    }

    /// Ids of the loaded children, in sibling order
    pub fn child_ids(&self) -> Option<Vec<NodeId>> {
        self.children
            .as_ref()
            .map(|children| children.iter().map(TreeNode::id).collect())
    }

    /// Depth-first search through the loaded subtree
    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        if self.record.id == id {
            return Some(self);
        }
        self.children
            .as_ref()?
            .iter()
            .find_map(|child| child.find(id))
    }
}

//! In-process catalog source.
//!
//! Enforces the same rules as the remote API (cascade delete, document/container
//! exclusivity, level and order assignment) and records how often each
//! operation was called. Failures can be injected per operation and a children
//! fetch can be held open until released, which lets callers drive interleavings
//! deterministically.

use super::{
    CatalogSource, Document, DocumentDraft, DocumentUpdate, NodeDraft, NodeUpdate,
};
use crate::error::CatalogError;
use crate::tree::{DocumentSlot, NodeRecord};
use crate::types::{DocumentId, DocumentTypeId, NodeId};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tokio::sync::oneshot;

/// Source operations, used for call accounting and failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Roots,
    Children,
    Node,
    DocumentAvailability,
    CreateNode,
    UpdateNode,
    DeleteNode,
    CreateDocument,
    UpdateDocument,
    DeleteDocument,
}

/// Handle that keeps a held children fetch pending until released
pub struct ChildrenGate {
    sender: oneshot::Sender<()>,
}

impl ChildrenGate {
    /// Let the held fetch complete
    pub fn release(self) {
        let _ = self.sender.send(());
    }
}

#[derive(Default)]
struct State {
    nodes: BTreeMap<NodeId, NodeRecord>,
    documents: BTreeMap<DocumentId, Document>,
    document_types: Vec<(DocumentTypeId, String)>,
    next_node_id: NodeId,
    next_document_id: DocumentId,
    calls: HashMap<Operation, usize>,
    failures: HashMap<Operation, VecDeque<CatalogError>>,
    gates: HashMap<NodeId, oneshot::Receiver<()>>,
}

impl State {
    fn child_ids(&self, parent: Option<NodeId>) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| n.parent_id == parent)
            .map(|n| n.id)
            .collect()
    }

    fn document_count(&self, node_id: NodeId) -> u32 {
        self.documents
            .values()
            .filter(|d| d.node_id == node_id)
            .count() as u32
    }

    /// Stored record with counts filled in
    fn view(&self, id: NodeId) -> Option<NodeRecord> {
        let mut record = self.nodes.get(&id)?.clone();
        record.child_count = self.child_ids(Some(id)).len() as u32;
        record.document_count = self.document_count(id);
        Some(record)
    }

    fn listing(&self, parent: Option<NodeId>) -> Vec<NodeRecord> {
        let mut records: Vec<NodeRecord> = self
            .child_ids(parent)
            .into_iter()
            .filter_map(|id| self.view(id))
            .collect();
        records.sort_by_key(|r| r.order);
        records
    }

    fn next_order(&self, parent: Option<NodeId>) -> i32 {
        self.nodes
            .values()
            .filter(|n| n.parent_id == parent)
            .map(|n| n.order + 1)
            .max()
            .unwrap_or(0)
    }

    fn order_taken(&self, parent: Option<NodeId>, order: i32, except: NodeId) -> bool {
        self.nodes
            .values()
            .any(|n| n.parent_id == parent && n.order == order && n.id != except)
    }

    fn insert_node(
        &mut self,
        parent_id: Option<NodeId>,
        draft: NodeDraft,
    ) -> Result<NodeRecord, CatalogError> {
        let level = match parent_id {
            Some(parent) => {
                let parent_record = self
                    .nodes
                    .get(&parent)
                    .ok_or(CatalogError::RemoteNotFound(parent))?;
                if parent_record.allows_leaf_documents {
                    return Err(CatalogError::Conflict(format!(
                        "node {} holds documents and cannot have children",
                        parent
                    )));
                }
                parent_record.level + 1
            }
            None => 0,
        };
        let order = match draft.order {
            Some(order) if self.order_taken(parent_id, order, 0) => {
                return Err(CatalogError::Conflict(format!(
                    "order {} already used under {:?}",
                    order, parent_id
                )))
            }
            Some(order) => order,
            None => self.next_order(parent_id),
        };
        self.next_node_id += 1;
        let record = NodeRecord {
            id: self.next_node_id,
            parent_id,
            level,
            order,
            name: draft.name,
            code: draft.code,
            description: draft.description,
            allows_leaf_documents: draft.allows_leaf_documents,
            child_count: 0,
            document_count: 0,
        };
        self.nodes.insert(record.id, record.clone());
        Ok(record)
    }

    fn document_bearing(&self, node_id: NodeId) -> Result<(), CatalogError> {
        let node = self
            .nodes
            .get(&node_id)
            .ok_or(CatalogError::RemoteNotFound(node_id))?;
        if !node.allows_leaf_documents {
            return Err(CatalogError::Conflict(format!(
                "node {} does not accept documents",
                node_id
            )));
        }
        Ok(())
    }
}

/// Catalog source held entirely in memory
pub struct InMemoryCatalogSource {
    state: Mutex<State>,
}

impl Default for InMemoryCatalogSource {
    fn default() -> Self {
        Self::new(vec![(1, "Ficha técnica".to_string()), (2, "Anexo".to_string())])
    }
}

impl InMemoryCatalogSource {
    /// Create an empty catalog with the given document types
    pub fn new(document_types: Vec<(DocumentTypeId, String)>) -> Self {
        Self {
            state: Mutex::new(State {
                document_types,
                ..State::default()
            }),
        }
    }

    /// Add a node directly, bypassing call accounting; ids start at 1
    pub fn seed(
        &self,
        parent_id: Option<NodeId>,
        draft: NodeDraft,
    ) -> Result<NodeId, CatalogError> {
        let mut state = self.state.lock();
        state.insert_node(parent_id, draft).map(|r| r.id)
    }

    /// Attach a document directly, bypassing call accounting
    pub fn seed_document(
        &self,
        node_id: NodeId,
        draft: DocumentDraft,
    ) -> Result<DocumentId, CatalogError> {
        let mut state = self.state.lock();
        insert_document(&mut state, node_id, draft).map(|d| d.id)
    }

    /// Delete a node as another session would, without call accounting
    pub fn remove_out_of_band(&self, id: NodeId) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        remove_node(&mut state, id)
    }

    /// Rename a node as another session would, without call accounting
    pub fn rename_out_of_band(&self, id: NodeId, name: &str) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        let node = state
            .nodes
            .get_mut(&id)
            .ok_or(CatalogError::RemoteNotFound(id))?;
        node.name = name.to_string();
        Ok(())
    }

    /// Number of calls made to an operation since the last reset
    pub fn calls(&self, operation: Operation) -> usize {
        self.state
            .lock()
            .calls
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Total calls across all operations
    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.values().sum()
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Make the next call to `operation` fail with `error`
    pub fn fail_next(&self, operation: Operation, error: CatalogError) {
        self.state
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Hold the next children fetch for `parent_id` until the gate is released
    pub fn hold_children(&self, parent_id: NodeId) -> ChildrenGate {
        let (sender, receiver) = oneshot::channel();
        self.state.lock().gates.insert(parent_id, receiver);
        ChildrenGate { sender }
    }

    /// Current server-side record, with counts
    pub fn record(&self, id: NodeId) -> Option<NodeRecord> {
        self.state.lock().view(id)
    }

    /// Record a call and pop any injected failure
    fn enter(&self, operation: Operation) -> Result<(), CatalogError> {
        let mut state = self.state.lock();
        *state.calls.entry(operation).or_insert(0) += 1;
        match state
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn insert_document(
    state: &mut State,
    node_id: NodeId,
    draft: DocumentDraft,
) -> Result<Document, CatalogError> {
    state.document_bearing(node_id)?;
    if !state
        .document_types
        .iter()
        .any(|(id, _)| *id == draft.document_type_id)
    {
        return Err(CatalogError::Conflict(format!(
            "unknown document type {}",
            draft.document_type_id
        )));
    }
    if state
        .documents
        .values()
        .any(|d| d.node_id == node_id && d.document_type_id == draft.document_type_id)
    {
        return Err(CatalogError::Conflict(format!(
            "node {} already has a document of type {}",
            node_id, draft.document_type_id
        )));
    }
    state.next_document_id += 1;
    let document = Document {
        id: state.next_document_id,
        node_id,
        document_type_id: draft.document_type_id,
        name: draft.name,
        updated_at: Some(Utc::now()),
    };
    state.documents.insert(document.id, document.clone());
    Ok(document)
}

fn remove_node(state: &mut State, id: NodeId) -> Result<(), CatalogError> {
    if !state.nodes.contains_key(&id) {
        return Err(CatalogError::RemoteNotFound(id));
    }
    let mut pending = vec![id];
    while let Some(current) = pending.pop() {
        pending.extend(state.child_ids(Some(current)));
        state.nodes.remove(&current);
        state.documents.retain(|_, d| d.node_id != current);
    }
    Ok(())
}

#[async_trait]
impl CatalogSource for InMemoryCatalogSource {
    async fn roots(&self) -> Result<Vec<NodeRecord>, CatalogError> {
        self.enter(Operation::Roots)?;
        tokio::task::yield_now().await;
        Ok(self.state.lock().listing(None))
    }

    async fn children(&self, parent_id: NodeId) -> Result<Vec<NodeRecord>, CatalogError> {
        let gate = {
            self.enter(Operation::Children)?;
            self.state.lock().gates.remove(&parent_id)
        };
        match gate {
            Some(receiver) => {
                let _ = receiver.await;
            }
            None => tokio::task::yield_now().await,
        }
        let state = self.state.lock();
        if !state.nodes.contains_key(&parent_id) {
            return Err(CatalogError::RemoteNotFound(parent_id));
        }
        Ok(state.listing(Some(parent_id)))
    }

    async fn node(&self, id: NodeId) -> Result<NodeRecord, CatalogError> {
        self.enter(Operation::Node)?;
        tokio::task::yield_now().await;
        self.state
            .lock()
            .view(id)
            .ok_or(CatalogError::RemoteNotFound(id))
    }

    async fn document_availability(
        &self,
        node_id: NodeId,
    ) -> Result<Vec<DocumentSlot>, CatalogError> {
        self.enter(Operation::DocumentAvailability)?;
        tokio::task::yield_now().await;
        let state = self.state.lock();
        let node = state
            .nodes
            .get(&node_id)
            .ok_or(CatalogError::RemoteNotFound(node_id))?;
        if !node.allows_leaf_documents {
            return Ok(Vec::new());
        }
        let slots = state
            .document_types
            .iter()
            .map(|(type_id, type_name)| {
                let document = state
                    .documents
                    .values()
                    .find(|d| d.node_id == node_id && d.document_type_id == *type_id);
                DocumentSlot {
                    document_type_id: *type_id,
                    document_type_name: Some(type_name.clone()),
                    available: document.is_some(),
                    document_id: document.map(|d| d.id),
                    document_name: document.map(|d| d.name.clone()),
                    updated_at: document.and_then(|d| d.updated_at),
                }
            })
            .collect();
        Ok(slots)
    }

    async fn create_node(
        &self,
        parent_id: Option<NodeId>,
        draft: NodeDraft,
    ) -> Result<NodeRecord, CatalogError> {
        self.enter(Operation::CreateNode)?;
        tokio::task::yield_now().await;
        self.state.lock().insert_node(parent_id, draft)
    }

    async fn update_node(
        &self,
        id: NodeId,
        update: NodeUpdate,
    ) -> Result<NodeRecord, CatalogError> {
        self.enter(Operation::UpdateNode)?;
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let current = state
            .nodes
            .get(&id)
            .cloned()
            .ok_or(CatalogError::RemoteNotFound(id))?;
        if update.allows_leaf_documents == Some(true) && !state.child_ids(Some(id)).is_empty() {
            return Err(CatalogError::Conflict(format!(
                "node {} has children and cannot hold documents",
                id
            )));
        }
        if update.allows_leaf_documents == Some(false) && state.document_count(id) > 0 {
            return Err(CatalogError::Conflict(format!(
                "node {} still holds documents",
                id
            )));
        }
        if let Some(order) = update.order {
            if state.order_taken(current.parent_id, order, id) {
                return Err(CatalogError::Conflict(format!(
                    "order {} already used under {:?}",
                    order, current.parent_id
                )));
            }
        }
        if let Some(node) = state.nodes.get_mut(&id) {
            if let Some(name) = update.name {
                node.name = name;
            }
            if update.code.is_some() {
                node.code = update.code;
            }
            if update.description.is_some() {
                node.description = update.description;
            }
            if let Some(order) = update.order {
                node.order = order;
            }
            if let Some(allows) = update.allows_leaf_documents {
                node.allows_leaf_documents = allows;
            }
        }
        state.view(id).ok_or(CatalogError::RemoteNotFound(id))
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), CatalogError> {
        self.enter(Operation::DeleteNode)?;
        tokio::task::yield_now().await;
        remove_node(&mut self.state.lock(), id)
    }

    async fn create_document(
        &self,
        node_id: NodeId,
        draft: DocumentDraft,
    ) -> Result<Document, CatalogError> {
        self.enter(Operation::CreateDocument)?;
        tokio::task::yield_now().await;
        insert_document(&mut self.state.lock(), node_id, draft)
    }

    async fn update_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, CatalogError> {
        self.enter(Operation::UpdateDocument)?;
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        let document = state
            .documents
            .get_mut(&document_id)
            .filter(|d| d.node_id == node_id)
            .ok_or(CatalogError::RemoteNotFound(node_id))?;
        if let Some(name) = update.name {
            document.name = name;
        }
        document.updated_at = Some(Utc::now());
        Ok(document.clone())
    }

    async fn delete_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
    ) -> Result<(), CatalogError> {
        self.enter(Operation::DeleteDocument)?;
        tokio::task::yield_now().await;
        let mut state = self.state.lock();
        match state.documents.get(&document_id) {
            Some(document) if document.node_id == node_id => {
                state.documents.remove(&document_id);
                Ok(())
            }
            _ => Err(CatalogError::RemoteNotFound(node_id)),
        }
    }
}

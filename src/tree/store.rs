//! Node Store
//!
//! Arena of catalog nodes keyed by id, plus a separate parent -> ordered
//! children index and an ordered root list. `patch` is the addressed mutation
//! primitive; removing a subtree is a sweep over the children index rather than
//! a recursive walk over owned nodes.

use crate::error::CatalogError;
use crate::tree::node::{DocumentSlot, Node, NodePatch, NodeRecord, TreeNode};
use crate::types::{NodeId, Revision};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Store shared between the controllers
///
/// The lock is never held across an `.await`.
pub type SharedStore = Arc<parking_lot::RwLock<NodeStore>>;

/// Per-node state held in the arena. Child order lives in the index.
#[derive(Debug, Clone)]
struct Entry {
    record: NodeRecord,
    is_expanded: bool,
    is_loading: bool,
    document_availability: Option<Vec<DocumentSlot>>,
}

impl Entry {
    fn new(record: NodeRecord) -> Self {
        Self {
            record,
            is_expanded: false,
            is_loading: false,
            document_availability: None,
        }
    }
}

/// Addressed store for the partially loaded catalog tree
pub struct NodeStore {
    entries: HashMap<NodeId, Entry>,
    /// Parent -> ordered child ids; absent key means children not fetched yet
    children: HashMap<NodeId, Vec<NodeId>>,
    roots: Vec<NodeId>,
    revision: Revision,
    notifier: watch::Sender<Revision>,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (notifier, _) = watch::channel(0);
        Self {
            entries: HashMap::new(),
            children: HashMap::new(),
            roots: Vec::new(),
            revision: 0,
            notifier,
        }
    }

    /// Wrap a new store for sharing between controllers
    pub fn shared() -> SharedStore {
        Arc::new(parking_lot::RwLock::new(Self::new()))
    }

    /// Get an owned snapshot of a node
    pub fn get(&self, id: NodeId) -> Option<Node> {
        self.entries.get(&id).map(|entry| self.assemble(id, entry))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Parent of a cached node (`None` for roots)
    pub fn parent_of(&self, id: NodeId) -> Result<Option<NodeId>, CatalogError> {
        self.entries
            .get(&id)
            .map(|entry| entry.record.parent_id)
            .ok_or(CatalogError::NodeNotFound(id))
    }

    /// Loaded children of a node, in sibling order
    pub fn children_of(&self, id: NodeId) -> Option<&[NodeId]> {
        self.children.get(&id).map(Vec::as_slice)
    }

    /// Root ids in sibling order
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Number of cached nodes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current revision; bumped on every successful mutation
    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Subscribe to revision changes
    pub fn subscribe(&self) -> watch::Receiver<Revision> {
        self.notifier.subscribe()
    }

    /// Root-level view of the loaded tree
    pub fn tree(&self) -> Vec<TreeNode> {
        self.roots
            .iter()
            .filter_map(|id| self.tree_node(*id))
            .collect()
    }

    /// Detached view of one node and its loaded subtree
    pub fn tree_node(&self, id: NodeId) -> Option<TreeNode> {
        let entry = self.entries.get(&id)?;
        let children = self.children.get(&id).map(|ids| {
            ids.iter()
                .filter_map(|child| self.tree_node(*child))
                .collect()
        });
        Some(TreeNode {
            record: entry.record.clone(),
            is_expanded: entry.is_expanded,
            is_loading: entry.is_loading,
            document_availability: entry.document_availability.clone(),
            children,
        })
    }

    /// Every cached node, ordered by id
    pub fn snapshot(&self) -> BTreeMap<NodeId, Node> {
        self.entries
            .iter()
            .map(|(id, entry)| (*id, self.assemble(*id, entry)))
            .collect()
    }

    /// Discard all state and install a fresh root level
    ///
    /// Returns the ids of every entry that was discarded.
    pub fn replace_roots(
        &mut self,
        records: Vec<NodeRecord>,
    ) -> Result<Vec<NodeId>, CatalogError> {
        validate_roots(&records)?;
        let records = sorted_by_order(records);
        let removed: Vec<NodeId> = self.entries.drain().map(|(id, _)| id).collect();
        self.children.clear();
        self.roots = records.iter().map(|r| r.id).collect();
        for record in records {
            self.entries.insert(record.id, Entry::new(record));
        }
        debug!(roots = self.roots.len(), "Replaced root level");
        self.bump();
        Ok(removed)
    }

    /// Reconcile the root level with a fresh root listing
    ///
    /// Surviving roots keep their cache-local state; vanished roots are removed
    /// with their subtrees. Returns the removed ids.
    pub fn retain_roots(
        &mut self,
        records: Vec<NodeRecord>,
    ) -> Result<Vec<NodeId>, CatalogError> {
        validate_roots(&records)?;
        let records = sorted_by_order(records);
        let previous = std::mem::take(&mut self.roots);
        let mut removed = Vec::new();
        self.roots = self.install(None, previous, records, &mut removed);
        self.bump();
        Ok(removed)
    }

    /// Apply a shallow update to the node with the given id
    ///
    /// The patch is validated as a whole before anything is written, so a
    /// rejected patch leaves the store untouched. Returns the ids swept from
    /// the cache by a child list replacement.
    pub fn patch(
        &mut self,
        id: NodeId,
        patch: NodePatch,
    ) -> Result<Vec<NodeId>, CatalogError> {
        let entry = self
            .entries
            .get(&id)
            .ok_or(CatalogError::NodeNotFound(id))?;
        self.validate_patch(id, entry, &patch)?;

        let NodePatch {
            metadata,
            children,
            is_expanded,
            is_loading,
            document_availability,
        } = patch;

        let mut removed = Vec::new();
        if let Some(records) = children {
            let records = sorted_by_order(records);
            let previous = self.children.remove(&id).unwrap_or_default();
            let installed = self.install(Some(id), previous, records, &mut removed);
            self.children.insert(id, installed);
        }

        let mut reordered = None;
        if let Some(entry) = self.entries.get_mut(&id) {
            if let Some(record) = metadata {
                if record.order != entry.record.order {
                    reordered = Some(record.parent_id);
                }
                if entry.record.allows_leaf_documents
                    && !record.allows_leaf_documents
                    && document_availability.is_none()
                {
                    entry.document_availability = None;
                }
                entry.record = record;
            }
            if let Some(expanded) = is_expanded {
                entry.is_expanded = expanded;
            }
            if let Some(loading) = is_loading {
                entry.is_loading = loading;
            }
            if let Some(slots) = document_availability {
                entry.document_availability = Some(slots);
            }
        }
        if let Some(parent) = reordered {
            self.resort_siblings(parent);
        }

        trace!(node_id = id, removed = removed.len(), "Patched node");
        self.bump();
        Ok(removed)
    }

    /// Remove a node and its loaded subtree, unlinking it from its parent
    ///
    /// Returns the removed ids.
    pub fn detach(&mut self, id: NodeId) -> Result<Vec<NodeId>, CatalogError> {
        let parent = self.parent_of(id)?;
        match parent {
            Some(parent_id) => {
                if let Some(siblings) = self.children.get_mut(&parent_id) {
                    siblings.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
        let removed = self.remove_subtree(id);
        debug!(node_id = id, removed = removed.len(), "Detached subtree");
        self.bump();
        Ok(removed)
    }

    /// Verify the structural invariants over every cached node
    pub fn check_invariants(&self) -> Result<(), CatalogError> {
        for id in &self.roots {
            let entry = self
                .entries
                .get(id)
                .ok_or_else(|| CatalogError::Conflict(format!("root {} has no entry", id)))?;
            if entry.record.parent_id.is_some() {
                return Err(CatalogError::Conflict(format!(
                    "root {} has a parent",
                    id
                )));
            }
        }
        for (id, entry) in &self.entries {
            let children = self.children.get(id).map(Vec::as_slice).unwrap_or(&[]);
            if entry.record.allows_leaf_documents && !children.is_empty() {
                return Err(CatalogError::Conflict(format!(
                    "node {} is document-bearing but has children",
                    id
                )));
            }
            if !entry.record.allows_leaf_documents
                && entry
                    .document_availability
                    .as_ref()
                    .map_or(false, |slots| !slots.is_empty())
            {
                return Err(CatalogError::Conflict(format!(
                    "node {} exposes document slots but does not allow documents",
                    id
                )));
            }
            let mut orders = HashSet::new();
            for child in children {
                let child_entry = self.entries.get(child).ok_or_else(|| {
                    CatalogError::Conflict(format!("child {} of {} has no entry", child, id))
                })?;
                if child_entry.record.parent_id != Some(*id)
                    || child_entry.record.level != entry.record.level + 1
                {
                    return Err(CatalogError::Conflict(format!(
                        "child {} is not linked to parent {}",
                        child, id
                    )));
                }
                if !orders.insert(child_entry.record.order) {
                    return Err(CatalogError::Conflict(format!(
                        "duplicate order {} under {}",
                        child_entry.record.order, id
                    )));
                }
            }
        }
        Ok(())
    }

    fn assemble(&self, id: NodeId, entry: &Entry) -> Node {
        Node {
            record: entry.record.clone(),
            children: self.children.get(&id).cloned(),
            is_expanded: entry.is_expanded,
            is_loading: entry.is_loading,
            document_availability: entry.document_availability.clone(),
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
        self.notifier.send_replace(self.revision);
    }

    fn validate_patch(
        &self,
        id: NodeId,
        entry: &Entry,
        patch: &NodePatch,
    ) -> Result<(), CatalogError> {
        let record = match &patch.metadata {
            Some(record) => {
                if record.id != id {
                    return Err(CatalogError::Conflict(format!(
                        "metadata for node {} applied to node {}",
                        record.id, id
                    )));
                }
                if record.parent_id != entry.record.parent_id {
                    return Err(CatalogError::Conflict(format!(
                        "node {} cannot move from parent {:?} to {:?}",
                        id, entry.record.parent_id, record.parent_id
                    )));
                }
                if record.level != entry.record.level {
                    return Err(CatalogError::Conflict(format!(
                        "node {} cannot change level from {} to {}",
                        id, entry.record.level, record.level
                    )));
                }
                record
            }
            None => &entry.record,
        };

        let child_count = match &patch.children {
            Some(children) => children.len(),
            None => self.children.get(&id).map_or(0, Vec::len),
        };
        if record.allows_leaf_documents && child_count > 0 {
            return Err(CatalogError::Conflict(format!(
                "node {} allows leaf documents and cannot hold children",
                id
            )));
        }

        if let Some(slots) = &patch.document_availability {
            if !record.allows_leaf_documents && !slots.is_empty() {
                return Err(CatalogError::Conflict(format!(
                    "node {} does not allow leaf documents",
                    id
                )));
            }
        }

        if let Some(children) = &patch.children {
            let mut orders = HashSet::new();
            let mut ids = HashSet::new();
            for child in children {
                if child.parent_id != Some(id) {
                    return Err(CatalogError::Conflict(format!(
                        "child {} reports parent {:?}, expected {}",
                        child.id, child.parent_id, id
                    )));
                }
                if child.level != record.level + 1 {
                    return Err(CatalogError::Conflict(format!(
                        "child {} has level {}, expected {}",
                        child.id,
                        child.level,
                        record.level + 1
                    )));
                }
                if !ids.insert(child.id) {
                    return Err(CatalogError::Conflict(format!(
                        "child {} listed twice under {}",
                        child.id, id
                    )));
                }
                if !orders.insert(child.order) {
                    return Err(CatalogError::Conflict(format!(
                        "duplicate order {} under {}",
                        child.order, id
                    )));
                }
                if child.id == id || self.is_ancestor(child.id, id) {
                    return Err(CatalogError::Conflict(format!(
                        "child {} would create a cycle under {}",
                        child.id, id
                    )));
                }
            }
        }
        Ok(())
    }

    /// True if `candidate` is a strict ancestor of `id`
    fn is_ancestor(&self, candidate: NodeId, id: NodeId) -> bool {
        let mut current = self.entries.get(&id).and_then(|e| e.record.parent_id);
        while let Some(parent) = current {
            if parent == candidate {
                return true;
            }
            current = self.entries.get(&parent).and_then(|e| e.record.parent_id);
        }
        false
    }

    /// Install a validated sibling list, reconciling with the previous one
    ///
    /// Existing entries keep their cache-local state and take the new metadata;
    /// previous members that are gone are swept with their subtrees. Swept ids
    /// are appended to `removed`.
    fn install(
        &mut self,
        parent: Option<NodeId>,
        previous: Vec<NodeId>,
        records: Vec<NodeRecord>,
        removed: &mut Vec<NodeId>,
    ) -> Vec<NodeId> {
        let incoming: HashSet<NodeId> = records.iter().map(|r| r.id).collect();
        for stale in previous.iter().filter(|id| !incoming.contains(id)) {
            removed.extend(self.remove_subtree(*stale));
        }
        let previous: HashSet<NodeId> = previous.into_iter().collect();

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id;
            if !previous.contains(&id) {
                self.unlink_elsewhere(parent, id);
            }
            let becomes_leaf = record.allows_leaf_documents;
            match self.entries.get_mut(&id) {
                Some(entry) => {
                    if entry.record.allows_leaf_documents && !becomes_leaf {
                        entry.document_availability = None;
                    }
                    entry.record = record;
                    if becomes_leaf {
                        if let Some(stale) = self.children.remove(&id) {
                            for child in stale {
                                removed.extend(self.remove_subtree(child));
                            }
                        }
                    }
                }
                None => {
                    self.entries.insert(id, Entry::new(record));
                }
            }
            ids.push(id);
        }
        ids
    }

    /// Restore (order, id) ordering of one sibling list after an order change
    fn resort_siblings(&mut self, parent: Option<NodeId>) {
        let entries = &self.entries;
        let siblings = match parent {
            Some(parent_id) => match self.children.get_mut(&parent_id) {
                Some(siblings) => siblings,
                None => return,
            },
            None => &mut self.roots,
        };
        siblings.sort_by_key(|id| {
            entries
                .get(id)
                .map_or((i32::MAX, *id), |entry| (entry.record.order, *id))
        });
    }

    /// Drop a node id from whichever sibling list currently holds it
    fn unlink_elsewhere(&mut self, new_parent: Option<NodeId>, id: NodeId) {
        let Some(old_parent) = self.entries.get(&id).map(|e| e.record.parent_id) else {
            return;
        };
        if old_parent == new_parent {
            return;
        }
        debug!(node_id = id, from = ?old_parent, to = ?new_parent, "Relocating node");
        match old_parent {
            Some(parent_id) => {
                if let Some(siblings) = self.children.get_mut(&parent_id) {
                    siblings.retain(|child| *child != id);
                }
            }
            None => self.roots.retain(|root| *root != id),
        }
    }

    /// Remove an entry and every loaded descendant; does not unlink from the parent
    fn remove_subtree(&mut self, id: NodeId) -> Vec<NodeId> {
        let mut removed = Vec::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if self.entries.remove(&current).is_some() {
                removed.push(current);
            }
            if let Some(children) = self.children.remove(&current) {
                pending.extend(children);
            }
        }
        removed
    }
}

fn sorted_by_order(mut records: Vec<NodeRecord>) -> Vec<NodeRecord> {
    records.sort_by_key(|r| (r.order, r.id));
    records
}

fn validate_roots(records: &[NodeRecord]) -> Result<(), CatalogError> {
    let mut orders = HashSet::new();
    let mut ids = HashSet::new();
    for record in records {
        if record.parent_id.is_some() {
            return Err(CatalogError::Conflict(format!(
                "root {} reports parent {:?}",
                record.id, record.parent_id
            )));
        }
        if !ids.insert(record.id) {
            return Err(CatalogError::Conflict(format!(
                "root {} listed twice",
                record.id
            )));
        }
        if !orders.insert(record.order) {
            return Err(CatalogError::Conflict(format!(
                "duplicate root order {}",
                record.order
            )));
        }
    }
    Ok(())
}

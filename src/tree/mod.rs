//! Catalog tree: node model and the addressed node store.

pub mod node;
pub mod store;

pub use node::{DocumentSlot, Node, NodePatch, NodeRecord, TreeNode};
pub use store::NodeStore;

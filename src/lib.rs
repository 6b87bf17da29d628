//! Catalog Cache: lazy, consistent client-side cache over a hierarchical catalog
//!
//! Nodes are fetched level by level as they are expanded, kept in a flat
//! identity-keyed store, and kept consistent with the remote catalog through
//! targeted refreshes after every successful write.

pub mod cache;
pub mod concurrency;
pub mod config;
pub mod error;
pub mod expansion;
pub mod logging;
pub mod mutation;
pub mod refresh;
pub mod source;
pub mod tooling;
pub mod tree;
pub mod types;

pub use cache::CatalogCache;
pub use config::CatalogConfig;
pub use error::CatalogError;
pub use expansion::ExpandOutcome;
pub use refresh::{RefreshOutcome, RefreshScope};
pub use source::{CatalogSource, HttpCatalogSource, InMemoryCatalogSource};
pub use tree::{DocumentSlot, Node, NodeRecord, NodeStore, TreeNode};
pub use types::{DocumentId, DocumentTypeId, NodeId, Revision};

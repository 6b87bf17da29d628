//! Core identifier types for the catalog cache.

/// NodeId: server-assigned identity of a catalog node, stable across refreshes
pub type NodeId = i64;

/// DocumentTypeId: identity of a configured document type
pub type DocumentTypeId = i64;

/// DocumentId: server-assigned identity of an uploaded document
pub type DocumentId = i64;

/// Revision: monotonically increasing counter bumped on every store mutation
pub type Revision = u64;

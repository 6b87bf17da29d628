//! Error types for the catalog cache.

use crate::types::NodeId;
use thiserror::Error;

/// Errors surfaced by the store, the controllers and the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Addressed node is not present in the local store
    #[error("Node {0} not found in cache")]
    NodeNotFound(NodeId),

    /// Addressed node does not exist at the remote source
    #[error("Node {0} not found at remote source")]
    RemoteNotFound(NodeId),

    /// Network failure, timeout or server-side (5xx) error
    #[error("Remote catalog unavailable: {0}")]
    RemoteUnavailable(String),

    /// Invariant violation detected locally or reported by source validation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Any other non-success response from the source
    #[error("Remote request failed with status {status}: {message}")]
    Remote { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Failed to decode remote payload: {0}")]
    Decode(String),

    /// Configuration or logging setup error
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CatalogError {
    /// Whether repeating the same operation may succeed without any other change
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::RemoteUnavailable(_))
    }

    /// Whether the error reports a node missing either locally or remotely
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::NodeNotFound(_) | CatalogError::RemoteNotFound(_)
        )
    }
}

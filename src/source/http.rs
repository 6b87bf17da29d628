//! HTTP implementation of the catalog source (JSON over reqwest).

use super::{
    CatalogSource, Document, DocumentDraft, DocumentUpdate, NodeDraft, NodeUpdate,
};
use crate::config::SourceConfig;
use crate::error::CatalogError;
use crate::tree::{DocumentSlot, NodeRecord};
use crate::types::{DocumentId, NodeId};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Catalog source backed by the remote REST API
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

/// Body of `POST /nodes`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateNodeBody {
    parent_id: Option<NodeId>,
    #[serde(flatten)]
    draft: NodeDraft,
}

/// Validation error body returned by the API
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "error", alias = "detail")]
    message: String,
}

impl HttpCatalogSource {
    /// Build a client from source configuration
    pub fn from_config(config: &SourceConfig) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CatalogError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send a request and decode a JSON body; `subject` is the node a 404 refers to
    async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        subject: Option<NodeId>,
    ) -> Result<T, CatalogError> {
        let response = self.send(builder, subject).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        subject: Option<NodeId>,
    ) -> Result<reqwest::Response, CatalogError> {
        let response = builder.send().await.map_err(map_transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), node_id = ?subject, "Catalog request rejected");
        Err(map_status(status, &body, subject))
    }
}

/// Map a non-success status onto the cache's error kinds
///
/// A 404 only means a node is gone when the request addressed one.
fn map_status(status: StatusCode, body: &str, subject: Option<NodeId>) -> CatalogError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    match status {
        StatusCode::NOT_FOUND => match subject {
            Some(id) => CatalogError::RemoteNotFound(id),
            None => CatalogError::Remote {
                status: status.as_u16(),
                message,
            },
        },
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => CatalogError::Conflict(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            CatalogError::RemoteUnavailable(format!("{}: {}", status, message))
        }
        s if s.is_server_error() => {
            CatalogError::RemoteUnavailable(format!("{}: {}", status, message))
        }
        _ => CatalogError::Remote {
            status: status.as_u16(),
            message,
        },
    }
}

fn map_transport_error(error: reqwest::Error) -> CatalogError {
    if error.is_decode() {
        CatalogError::Decode(error.to_string())
    } else {
        CatalogError::RemoteUnavailable(error.to_string())
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn roots(&self) -> Result<Vec<NodeRecord>, CatalogError> {
        self.send_json(self.request(Method::GET, "nodes/roots"), None)
            .await
    }

    async fn children(&self, parent_id: NodeId) -> Result<Vec<NodeRecord>, CatalogError> {
        let path = format!("nodes/{}/children", parent_id);
        self.send_json(self.request(Method::GET, &path), Some(parent_id))
            .await
    }

    async fn node(&self, id: NodeId) -> Result<NodeRecord, CatalogError> {
        let path = format!("nodes/{}", id);
        self.send_json(self.request(Method::GET, &path), Some(id)).await
    }

    async fn document_availability(
        &self,
        node_id: NodeId,
    ) -> Result<Vec<DocumentSlot>, CatalogError> {
        let path = format!("nodes/{}/documents/availability", node_id);
        self.send_json(self.request(Method::GET, &path), Some(node_id))
            .await
    }

    async fn create_node(
        &self,
        parent_id: Option<NodeId>,
        draft: NodeDraft,
    ) -> Result<NodeRecord, CatalogError> {
        let body = CreateNodeBody { parent_id, draft };
        let builder = self.request(Method::POST, "nodes").json(&body);
        self.send_json(builder, parent_id).await
    }

    async fn update_node(
        &self,
        id: NodeId,
        update: NodeUpdate,
    ) -> Result<NodeRecord, CatalogError> {
        let path = format!("nodes/{}", id);
        let builder = self.request(Method::PATCH, &path).json(&update);
        self.send_json(builder, Some(id)).await
    }

    async fn delete_node(&self, id: NodeId) -> Result<(), CatalogError> {
        let path = format!("nodes/{}", id);
        self.send(self.request(Method::DELETE, &path), Some(id)).await?;
        Ok(())
    }

    async fn create_document(
        &self,
        node_id: NodeId,
        draft: DocumentDraft,
    ) -> Result<Document, CatalogError> {
        let path = format!("nodes/{}/documents", node_id);
        let builder = self.request(Method::POST, &path).json(&draft);
        self.send_json(builder, Some(node_id)).await
    }

    async fn update_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
        update: DocumentUpdate,
    ) -> Result<Document, CatalogError> {
        let path = format!("nodes/{}/documents/{}", node_id, document_id);
        let builder = self.request(Method::PATCH, &path).json(&update);
        self.send_json(builder, Some(node_id)).await
    }

    async fn delete_document(
        &self,
        node_id: NodeId,
        document_id: DocumentId,
    ) -> Result<(), CatalogError> {
        let path = format!("nodes/{}/documents/{}", node_id, document_id);
        self.send(self.request(Method::DELETE, &path), Some(node_id))
            .await?;
        Ok(())
    }
}

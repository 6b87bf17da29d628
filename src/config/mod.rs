//! Configuration
//!
//! Layered configuration for the catalog cache: built-in defaults, the global
//! config file, an optional explicit file and `CATALOG__*` environment
//! variables, merged by [`MergeService`](merge::service::MergeService).

pub mod facade;
pub mod merge;
pub mod sources;

pub use facade::ConfigLoader;

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Remote catalog service
    pub source: SourceConfig,

    /// Cache behaviour
    pub cache: CacheConfig,

    /// Logging
    pub logging: LoggingConfig,
}

impl CatalogConfig {
    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), String> {
        self.source.validate()?;
        self.cache.validate()
    }
}

/// Remote catalog service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL the resource paths are appended to
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    pub user_agent: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            api_token: None,
            timeout_ms: 10_000,
            user_agent: concat!("catalog-cache/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl SourceConfig {
    pub fn base_url_is_valid(base_url: &str) -> bool {
        let base_url = base_url.trim();
        let Some(rest) = base_url
            .strip_prefix("http://")
            .or_else(|| base_url.strip_prefix("https://"))
        else {
            return false;
        };

        if rest.is_empty() || rest.chars().any(char::is_whitespace) {
            return false;
        }

        let authority = rest.split('/').next().unwrap_or_default();
        let host_port = authority.rsplit('@').next().unwrap_or(authority);
        let host = if let Some(bracketed) = host_port.strip_prefix('[') {
            match bracketed.find(']') {
                Some(end) => &bracketed[..end],
                None => return false,
            }
        } else {
            host_port.split(':').next().unwrap_or_default()
        };

        if host.is_empty() {
            return false;
        }

        host == "localhost" || host.contains('.') || host.parse::<std::net::IpAddr>().is_ok()
    }

    pub fn validate(&self) -> Result<(), String> {
        if !Self::base_url_is_valid(&self.base_url) {
            return Err(format!("Invalid catalog base URL: {}", self.base_url));
        }
        if self.timeout_ms == 0 {
            return Err("Request timeout must be greater than zero".to_string());
        }
        if let Some(token) = &self.api_token {
            if token.trim().is_empty() {
                return Err("API token cannot be blank".to_string());
            }
        }
        Ok(())
    }
}

/// Cache behaviour settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Number of document types the service defines; availability lists of
    /// another length are logged
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type_count: Option<usize>,

    /// Fetch the root level when connecting
    pub load_roots_on_start: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            document_type_count: None,
            load_roots_on_start: true,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.document_type_count == Some(0) {
            return Err("document_type_count must be at least 1 when set".to_string());
        }
        Ok(())
    }
}

//! CLI Tooling
//!
//! Command-line front end over [`CatalogCache`]: browse a remote catalog lazily
//! or run the bundled demo against an in-memory catalog.

use crate::cache::CatalogCache;
use crate::config::{CatalogConfig, ConfigLoader};
use crate::error::CatalogError;
use crate::source::{DocumentDraft, InMemoryCatalogSource, NodeDraft};
use crate::tooling::format::{
    format_documents_table, format_node_text, format_section_heading, format_tree_text,
};
use crate::types::NodeId;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Catalog cache CLI - lazy browsing of a hierarchical document catalog
#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Lazy, consistent cache over a hierarchical document catalog")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the loaded tree, expanding nodes on the way
    Tree {
        /// Expand these nodes in order (ancestors first)
        #[arg(long, value_delimiter = ',')]
        expand: Vec<NodeId>,
        /// Expand every node down to this many levels below the roots
        #[arg(long, default_value = "0")]
        depth: u32,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show one node
    Node {
        id: NodeId,
        /// Ancestors to expand so the node is cached, root first
        #[arg(long, value_delimiter = ',')]
        path: Vec<NodeId>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the document slots of a document-bearing node
    Documents {
        id: NodeId,
        /// Ancestors to expand so the node is cached, root first
        #[arg(long, value_delimiter = ',')]
        path: Vec<NodeId>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Walk through expansion, refresh and mutation on an in-memory catalog
    Demo,
}

/// Resolved configuration plus the command runner
pub struct CliContext {
    config: CatalogConfig,
}

impl CliContext {
    /// Load configuration from the standard layers and an optional file
    pub fn new(config_path: Option<PathBuf>) -> Result<Self, CatalogError> {
        let loaded = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        };
        let config = loaded.map_err(|e| CatalogError::ConfigError(e.to_string()))?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: CatalogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Execute a CLI command and return its rendered output
    pub async fn execute(&self, command: &Commands) -> Result<String, CatalogError> {
        match command {
            Commands::Demo => run_demo().await,
            Commands::Tree {
                expand,
                depth,
                format,
            } => {
                let cache = self.connect().await?;
                cache.expand_path(expand).await?;
                if *depth > 0 {
                    let fetches = cache.expand_to_depth(*depth).await?;
                    info!(depth, fetches, "Expanded to depth");
                }
                let tree = cache.get_tree();
                if format == "json" {
                    return to_json(&tree);
                }
                Ok(format_tree_text(&tree))
            }
            Commands::Node { id, path, format } => {
                let cache = self.connect().await?;
                cache.expand_path(path).await?;
                let node = cache.subtree(*id).ok_or(CatalogError::NodeNotFound(*id))?;
                if format == "json" {
                    return to_json(&node);
                }
                Ok(format_node_text(&node))
            }
            Commands::Documents { id, path, format } => {
                let cache = self.connect().await?;
                cache.expand_path(path).await?;
                cache.refresh_document_availability(*id).await?;
                let slots = cache
                    .get(*id)
                    .and_then(|node| node.document_availability)
                    .unwrap_or_default();
                if format == "json" {
                    return to_json(&slots);
                }
                Ok(format_documents_table(&slots))
            }
        }
    }

    async fn connect(&self) -> Result<CatalogCache, CatalogError> {
        let mut config = self.config.clone();
        config.cache.load_roots_on_start = true;
        CatalogCache::connect(&config).await
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, CatalogError> {
    serde_json::to_string_pretty(value).map_err(|e| CatalogError::Decode(e.to_string()))
}

/// Two-level construction catalog used by the demo
pub fn demo_source() -> Result<InMemoryCatalogSource, CatalogError> {
    let source = InMemoryCatalogSource::default();
    let civil = source.seed(None, coded("Obra civil", "01"))?;
    let structures = source.seed(Some(civil), coded("Estructuras", "01.01"))?;
    let services = source.seed(Some(civil), coded("Instalaciones", "01.02"))?;
    let beams = source.seed(Some(structures), coded("Vigas", "01.01.01").document_bearing())?;
    source.seed(Some(structures), coded("Columnas", "01.01.02").document_bearing())?;
    source.seed(Some(services), coded("Eléctricas", "01.02.01").document_bearing())?;
    source.seed(None, coded("Acabados", "02").document_bearing())?;
    source.seed_document(
        beams,
        DocumentDraft {
            document_type_id: 1,
            name: "vigas-ficha.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            content: None,
        },
    )?;
    Ok(source)
}

fn coded(name: &str, code: &str) -> NodeDraft {
    NodeDraft {
        code: Some(code.to_string()),
        ..NodeDraft::named(name)
    }
}

/// Scripted session over [`demo_source`]
pub async fn run_demo() -> Result<String, CatalogError> {
    let cache = CatalogCache::new(Arc::new(demo_source()?));
    let mut out = String::new();
    let mut section = |title: &str, body: String| {
        out.push_str(&format_section_heading(title));
        out.push_str("\n\n");
        out.push_str(&body);
        out.push('\n');
    };

    let roots = cache.load_roots().await?;
    section("Roots", format_tree_text(&roots));

    cache.expand_path(&[1, 2]).await?;
    section("Expanded 1 > 2", format_tree_text(&cache.get_tree()));

    cache.refresh_document_availability(4).await?;
    let slots = cache
        .get(4)
        .and_then(|node| node.document_availability)
        .unwrap_or_default();
    section("Documents of Vigas", format_documents_table(&slots));

    cache
        .create_document(
            5,
            DocumentDraft {
                document_type_id: 2,
                name: "columnas-anexo.pdf".to_string(),
                content_type: Some("application/pdf".to_string()),
                content: None,
            },
        )
        .await?;
    let slots = cache
        .get(5)
        .and_then(|node| node.document_availability)
        .unwrap_or_default();
    section("Uploaded annex to Columnas", format_documents_table(&slots));

    cache.delete_node(2).await?;
    section("Deleted Estructuras", format_tree_text(&cache.get_tree()));

    cache.check_invariants()?;
    section(
        "Summary",
        format!(
            "  {} nodes cached, revision {}\n",
            cache.len(),
            cache.revision()
        ),
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tree_flags() {
        let cli = Cli::parse_from([
            "catalog",
            "--log-level",
            "debug",
            "tree",
            "--expand",
            "1,2",
            "--depth",
            "2",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Tree {
                expand,
                depth,
                format,
            } => {
                assert_eq!(expand, vec![1, 2]);
                assert_eq!(depth, 2);
                assert_eq!(format, "text");
            }
            _ => panic!("expected tree command"),
        }
    }

    #[test]
    fn parses_documents_path() {
        let cli = Cli::parse_from(["catalog", "documents", "4", "--path", "1,2"]);
        match cli.command {
            Commands::Documents { id, path, .. } => {
                assert_eq!(id, 4);
                assert_eq!(path, vec![1, 2]);
            }
            _ => panic!("expected documents command"),
        }
    }

    #[tokio::test]
    async fn demo_runs_to_completion() {
        let context = CliContext::from_config(CatalogConfig::default());
        let output = context.execute(&Commands::Demo).await.unwrap();
        assert!(output.contains("Obra civil"));
        assert!(output.contains("vigas-ficha.pdf"));
        assert!(output.contains("columnas-anexo.pdf"));
        assert!(output.contains("nodes cached"));
    }

    #[tokio::test]
    async fn demo_delete_leaves_sibling() {
        let cache = CatalogCache::new(Arc::new(demo_source().unwrap()));
        cache.load_roots().await.unwrap();
        cache.expand(1).await.unwrap();
        cache.delete_node(2).await.unwrap();
        assert_eq!(cache.get(1).unwrap().children, Some(vec![3]));
        assert!(cache.get(2).is_none());
    }
}

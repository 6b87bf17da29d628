//! Logging
//!
//! `tracing-subscriber` setup for the CLI and for embedders that want the
//! cache's structured events. Precedence, highest first: CLI flags (applied with
//! [`LoggingConfig::with_overrides`]), `CATALOG_LOG*` environment variables,
//! the `[logging]` config section, defaults.

use crate::error::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_FILTER: &str = "CATALOG_LOG";
const ENV_FORMAT: &str = "CATALOG_LOG_FORMAT";
const ENV_OUTPUT: &str = "CATALOG_LOG_OUTPUT";
const ENV_MODULES: &str = "CATALOG_LOG_MODULES";
const ENV_FILE: &str = "CATALOG_LOG_FILE";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,

    /// trace, debug, info, warn, error, off
    pub level: String,

    /// json or text
    pub format: String,

    /// stdout, stderr, file, file+stderr, both
    pub output: String,

    /// Log file when output includes file; None uses the platform state dir
    pub file: Option<PathBuf>,

    /// ANSI colours; text format on a terminal stream only
    pub color: bool,

    /// Per-target levels, e.g. `catalog_cache::refresh = "trace"`
    pub modules: HashMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: "text".to_string(),
            output: "stderr".to_string(),
            file: None,
            color: true,
            modules: HashMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Apply command-line flags on top of the loaded configuration
    pub fn with_overrides(
        mut self,
        level: Option<&str>,
        format: Option<&str>,
        output: Option<&str>,
        file: Option<PathBuf>,
    ) -> Self {
        if let Some(level) = level {
            self.level = level.to_string();
            self.enabled = level != "off";
        }
        if let Some(format) = format {
            self.format = format.to_string();
        }
        if let Some(output) = output {
            self.output = output.to_string();
        }
        if file.is_some() {
            self.file = file;
        }
        self
    }
}

/// Event encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(CatalogError::ConfigError(format!(
                "Invalid log format: {} (must be 'json' or 'text')",
                other
            ))),
        }
    }
}

/// Where events are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOutput {
    pub stdout: bool,
    pub stderr: bool,
    pub file: bool,
}

impl LogOutput {
    fn terminal_only(&self) -> bool {
        !self.file
    }
}

impl FromStr for LogOutput {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (stdout, stderr, file) = match s.trim() {
            "stdout" => (true, false, false),
            "stderr" => (false, true, false),
            "file" => (false, false, true),
            "file+stderr" => (false, true, true),
            "both" => (true, true, false),
            other => {
                return Err(CatalogError::ConfigError(format!(
                    "Invalid log output: {} (must be 'stdout', 'stderr', 'file', 'file+stderr', or 'both')",
                    other
                )))
            }
        };
        Ok(LogOutput {
            stdout,
            stderr,
            file,
        })
    }
}

/// Resolve the log file: CLI, then `CATALOG_LOG_FILE`, then config, then the
/// platform state directory.
pub fn resolve_log_file_path(
    cli_file: Option<PathBuf>,
    config_file: Option<PathBuf>,
) -> Result<PathBuf, CatalogError> {
    let env_file = std::env::var(ENV_FILE).ok().map(PathBuf::from);
    [cli_file, env_file, config_file]
        .into_iter()
        .flatten()
        .find(|path| !path.as_os_str().is_empty())
        .map(Ok)
        .unwrap_or_else(default_log_file_path)
}

fn default_log_file_path() -> Result<PathBuf, CatalogError> {
    let dirs = directories::ProjectDirs::from("", "", "catalog-cache").ok_or_else(|| {
        CatalogError::ConfigError("Could not determine platform directories for log file".to_string())
    })?;
    // macOS and Windows have no state dir; fall back to the data dir there
    let dir = dirs.state_dir().unwrap_or_else(|| dirs.data_local_dir());
    Ok(dir.join("catalog-cache.log"))
}

/// Install the global subscriber
///
/// Fails if the configuration is invalid or a subscriber is already set.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), CatalogError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);
    if !config.enabled {
        return Ok(());
    }

    let filter = build_env_filter(config)?;
    let format: LogFormat = match std::env::var(ENV_FORMAT) {
        Ok(value) => value.parse()?,
        Err(_) => config.format.parse()?,
    };
    let output: LogOutput = match std::env::var(ENV_OUTPUT) {
        Ok(value) => value.parse()?,
        Err(_) => config.output.parse()?,
    };
    let writer = build_writer(output, config)?;

    let layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(writer);
    let registry = Registry::default().with(filter);
    let installed = match format {
        LogFormat::Json => registry.with(layer.json()).try_init(),
        LogFormat::Text => registry
            .with(layer.with_ansi(config.color && output.terminal_only()))
            .try_init(),
    };
    installed.map_err(|e| CatalogError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn build_writer(output: LogOutput, config: &LoggingConfig) -> Result<BoxMakeWriter, CatalogError> {
    let file = if output.file {
        let path = resolve_log_file_path(None, config.file.clone())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CatalogError::ConfigError(format!("Failed to create log directory: {}", e))
            })?;
        }
        let handle = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| {
                CatalogError::ConfigError(format!("Failed to open log file {:?}: {}", path, e))
            })?;
        Some(Arc::new(handle))
    } else {
        None
    };

    let writer = match (file, output.stdout, output.stderr) {
        (Some(file), _, true) => BoxMakeWriter::new(file.and(std::io::stderr)),
        (Some(file), _, false) => BoxMakeWriter::new(file),
        (None, true, true) => BoxMakeWriter::new(std::io::stdout.and(std::io::stderr)),
        (None, true, false) => BoxMakeWriter::new(std::io::stdout),
        (None, false, _) => BoxMakeWriter::new(std::io::stderr),
    };
    Ok(writer)
}

/// `CATALOG_LOG` replaces the configured filter entirely; otherwise the level
/// plus config and `CATALOG_LOG_MODULES` per-target directives.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, CatalogError> {
    if let Ok(filter) = EnvFilter::try_from_env(ENV_FILTER) {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let env_modules = std::env::var(ENV_MODULES).unwrap_or_default();
    let env_directives = env_modules
        .split(',')
        .filter_map(|spec| spec.split_once('='))
        .map(|(target, level)| (target.trim().to_string(), level.trim().to_string()));
    let config_directives = config
        .modules
        .iter()
        .map(|(target, level)| (target.clone(), level.clone()));

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| CatalogError::ConfigError(format!("Invalid log level: {}", e)))?;
    for (target, level) in config_directives.chain(env_directives) {
        let directive: Directive = format!("{}={}", target, level)
            .parse()
            .map_err(|e| CatalogError::ConfigError(format!("Invalid log directive: {}", e)))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = LoggingConfig::default();
        assert!(config.enabled);
        assert_eq!(config.level, "info");
        assert_eq!(config.format.parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!(
            config.output.parse::<LogOutput>().unwrap(),
            LogOutput {
                stdout: false,
                stderr: true,
                file: false
            }
        );
    }

    #[test]
    fn parse_outputs() {
        let out: LogOutput = "file+stderr".parse().unwrap();
        assert!(out.file && out.stderr && !out.stdout);
        assert!(!out.terminal_only());

        let out: LogOutput = "both".parse().unwrap();
        assert!(out.stdout && out.stderr && !out.file);

        assert!("syslog".parse::<LogOutput>().is_err());
        assert!("yaml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let config = LoggingConfig::default().with_overrides(
            Some("debug"),
            None,
            Some("file"),
            Some(PathBuf::from("/tmp/catalog.log")),
        );
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, "text");
        assert_eq!(config.output, "file");
        assert_eq!(config.file, Some(PathBuf::from("/tmp/catalog.log")));

        let silenced = LoggingConfig::default().with_overrides(Some("off"), None, None, None);
        assert!(!silenced.enabled);
    }

    #[test]
    fn cli_file_wins() {
        let path = resolve_log_file_path(
            Some(PathBuf::from("/tmp/cli.log")),
            Some(PathBuf::from("/tmp/config.log")),
        )
        .unwrap();
        assert_eq!(path, PathBuf::from("/tmp/cli.log"));
    }

    #[test]
    fn default_file_lives_in_project_dir() {
        let path = default_log_file_path().unwrap();
        assert!(path.ends_with("catalog-cache.log"));
        assert!(path.to_string_lossy().contains("catalog-cache"));
    }

    #[test]
    fn module_directives_are_validated() {
        let mut config = LoggingConfig::default();
        config
            .modules
            .insert("catalog_cache::refresh".to_string(), "trace".to_string());
        assert!(build_env_filter(&config).is_ok());

        config
            .modules
            .insert("catalog_cache::store".to_string(), "loud".to_string());
        assert!(build_env_filter(&config).is_err());
    }
}

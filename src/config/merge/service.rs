//! MergeService: orchestrates sources, applies merge policy, deserializes to CatalogConfig.

use crate::config::sources::{environment, global_file};
use crate::config::CatalogConfig;
use config::{ConfigError, File};
use std::path::Path;

use super::builder_with_defaults;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from the standard sources.
    /// Precedence: defaults (lowest) -> global file -> explicit file -> environment (highest).
    pub fn load(explicit: Option<&Path>) -> Result<CatalogConfig, ConfigError> {
        Self::load_layers(global_file::config_path().as_deref(), explicit)
    }

    /// Load config with the global file location supplied by the caller.
    pub fn load_layers(
        global: Option<&Path>,
        explicit: Option<&Path>,
    ) -> Result<CatalogConfig, ConfigError> {
        let mut builder = builder_with_defaults()?;
        if let Some(path) = global {
            builder = global_file::add_to_builder(builder, path);
        }
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path));
        }
        let builder = environment::add_to_builder(builder);

        builder.build()?.try_deserialize()
    }
}

//! Merge policy and service for config composition.

pub mod service;

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError};

/// Builder seeded with the values every layer falls back to.
pub(crate) fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = super::SourceConfig::default();
    config::Config::builder()
        .set_default("source.base_url", defaults.base_url)?
        .set_default("source.timeout_ms", defaults.timeout_ms as i64)?
        .set_default("source.user_agent", defaults.user_agent)?
        .set_default("cache.load_roots_on_start", true)
}

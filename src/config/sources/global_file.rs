//! Global config file in the platform config directory

use config::builder::DefaultState;
use config::{ConfigBuilder, File};
use std::path::{Path, PathBuf};

/// `<config dir>/catalog-cache/config.toml`, when the platform has one
pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "catalog-cache")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Add the global file to the builder; a missing file is skipped.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> ConfigBuilder<DefaultState> {
    builder.add_source(File::from(path).required(false))
}

//! Tooling
//!
//! Command-line front end and text rendering for the catalog cache.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands};

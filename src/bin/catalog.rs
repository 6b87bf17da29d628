//! Catalog CLI Binary
//!
//! Command-line interface for browsing a hierarchical document catalog.

use anyhow::Context;
use catalog_cache::logging::init_logging;
use catalog_cache::tooling::cli::{Cli, CliContext};
use clap::Parser;
use std::process;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let context = CliContext::new(cli.config.clone()).context("Failed to load configuration")?;
    let logging = context.config().logging.clone().with_overrides(
        cli.log_level.as_deref(),
        cli.log_format.as_deref(),
        cli.log_output.as_deref(),
        cli.log_file.clone(),
    );
    init_logging(Some(&logging)).context("Failed to initialize logging")?;

    let output = context.execute(&cli.command).await?;
    println!("{}", output);
    Ok(())
}

//! Radar CLI - build milestone tracking and dependency provenance
//!
//! Entry point for the radar command-line application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use radar::cli::output::{display_error, OutputConfig};
use radar::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let output_config = OutputConfig::new(cli.quiet, cli.json, cli.verbose);

    // RUST_LOG wins over -v; logs go to stderr so --json output stays clean
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(output_config.log_level().to_string()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // Apply output configuration globally
    output_config.apply_global();

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}

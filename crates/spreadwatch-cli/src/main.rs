//! Spreadwatch CLI - runs the incremental spread engine over file inputs.
//!
//! # Usage
//!
//! ```bash
//! # Run over the sample files, printing a table
//! spreadwatch run --reference bonds.csv --curves curves.json --prices prices.csv
//!
//! # Only USD instruments, JSON output, custom conventions
//! spreadwatch --format json run --config spreadwatch.toml \
//!     --reference bonds.csv --curves curves.json --prices prices.csv --currency USD
//! ```

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;
mod error;
mod output;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON and CSV output stay clean
    let default_filter = if cli.quiet { "warn" } else { "info,spreadwatch=debug" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.format).await?,
        Commands::Config(args) => commands::config::execute(args)?,
    }

    Ok(())
}

//! Config command implementation.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::AppConfig;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Configuration file to merge over the defaults
    #[arg(short, long, env = "SPREADWATCH_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Print the effective configuration as TOML.
pub fn execute(args: ConfigArgs) -> Result<()> {
    let config = AppConfig::load(args.config.as_deref())?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

//! Run command implementation.
//!
//! Wires the file collaborators into an orchestrator, streams until the
//! feeds go quiet, then prints every instrument's latest state.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tracing::info;

use spreadwatch_analytics::GSpreadMath;
use spreadwatch_engine::{Diagnostics, GroupState, OrchestratorBuilder, StartSummary};
use spreadwatch_ext_file::create_file_sources;
use spreadwatch_traits::search::SearchCriteria;
use spreadwatch_traits::GroupId;

use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::error::{CliError, CliResult};
use crate::output::{print_header, print_json, print_output, print_success, print_warning, KeyValue, SpreadRow};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Configuration file (TOML)
    #[arg(short, long, env = "SPREADWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Reference data CSV (key,description,coupon,maturity,currency,structure)
    #[arg(short, long)]
    pub reference: PathBuf,

    /// Curve JSON file
    #[arg(long)]
    pub curves: PathBuf,

    /// Price CSV (key,price)
    #[arg(short, long)]
    pub prices: PathBuf,

    /// Restrict the universe to these currencies (repeatable)
    #[arg(long = "currency")]
    pub currencies: Vec<String>,

    /// Restrict the universe to descriptions containing this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Maximum number of instruments
    #[arg(long)]
    pub max_results: Option<usize>,

    /// Stop after this many milliseconds without feed activity
    #[arg(long, default_value = "500")]
    pub idle_ms: u64,
}

/// Everything printed by `--format json`.
#[derive(Serialize)]
struct RunReport {
    summary: StartSummary,
    groups: Vec<(GroupId, GroupState)>,
    instruments: Vec<SpreadRow>,
    diagnostics: Diagnostics,
}

fn require_file(path: &Path) -> CliResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::MissingInput(path.to_path_buf()))
    }
}

fn criteria(args: &RunArgs) -> SearchCriteria {
    let mut criteria = SearchCriteria::all().with_currencies(args.currencies.iter().cloned());
    if let Some(text) = &args.search {
        criteria = criteria.with_text(text.clone());
    }
    if let Some(max) = args.max_results {
        criteria = criteria.with_max_results(max);
    }
    criteria
}

/// Execute the run command.
pub async fn execute(args: RunArgs, format: OutputFormat) -> Result<()> {
    if args.idle_ms == 0 {
        return Err(CliError::InvalidArgument("--idle-ms must be greater than zero".into()).into());
    }
    for path in [&args.reference, &args.curves, &args.prices] {
        require_file(path)?;
    }

    let config = AppConfig::load(args.config.as_deref())?;
    let sources = create_file_sources(&args.reference, &args.curves, &args.prices)?;

    let mut orchestrator = OrchestratorBuilder::new()
        .with_config(config.engine)
        .with_search(sources.reference.clone())
        .with_reference_data(sources.reference)
        .with_group_feed(sources.curves)
        .with_price_feed(sources.prices)
        .with_bond_math(Arc::new(GSpreadMath::new(config.conventions)))
        .build()?;

    let summary = orchestrator.start(&criteria(&args)).await?;
    let handled = orchestrator
        .run_until_idle(Duration::from_millis(args.idle_ms))
        .await;
    info!("Feeds idle after {} messages", handled);

    let groups = orchestrator.group_states();
    let rows: Vec<SpreadRow> = orchestrator.instruments().map(SpreadRow::from).collect();
    let diagnostics = orchestrator.diagnostics();
    orchestrator.stop();

    match format {
        OutputFormat::Json => print_json(&RunReport {
            summary,
            groups,
            instruments: rows,
            diagnostics,
        })?,
        OutputFormat::Csv => print_output(&rows, format)?,
        OutputFormat::Table => {
            print_header("Instruments");
            print_output(&rows, format)?;

            print_header("Groups");
            let group_rows: Vec<KeyValue> = groups
                .iter()
                .map(|(id, state)| KeyValue::new(id.as_str(), format!("{state:?}")))
                .collect();
            print_output(&group_rows, format)?;

            for (id, state) in &groups {
                if *state == GroupState::Failed {
                    print_warning(&format!("Group {id} failed; its instruments stay pending"));
                }
            }
            print_success(&format!(
                "{} instruments, {} recomputes ({} failed)",
                diagnostics.instruments, diagnostics.recomputes, diagnostics.recompute_failures
            ));
        }
    }

    Ok(())
}

//! Output formatting utilities.

use colored::Colorize;
use serde::Serialize;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

use spreadwatch_engine::{Instrument, InstrumentStatus};

use crate::cli::OutputFormat;

/// One instrument as printed.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct SpreadRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Group")]
    pub group: String,
    #[tabled(rename = "Coupon")]
    pub coupon: String,
    #[tabled(rename = "Maturity")]
    pub maturity: String,
    #[tabled(rename = "Price")]
    pub price: String,
    #[tabled(rename = "Settle")]
    pub settlement: String,
    #[tabled(rename = "Spread (bps)")]
    pub spread_bps: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl From<&Instrument> for SpreadRow {
    fn from(instrument: &Instrument) -> Self {
        fn or_dash<T: ToString>(value: Option<T>) -> String {
            value.map_or_else(|| "-".to_string(), |v| v.to_string())
        }

        Self {
            key: instrument.key.to_string(),
            group: instrument.group_id.to_string(),
            coupon: instrument.coupon.to_string(),
            maturity: or_dash(instrument.maturity),
            price: or_dash(instrument.price),
            settlement: or_dash(instrument.settlement),
            spread_bps: or_dash(instrument.analytic.map(|bps| format!("{bps:.2}"))),
            status: match &instrument.status {
                InstrumentStatus::Pending => "pending".to_string(),
                InstrumentStatus::Ok => "ok".to_string(),
                InstrumentStatus::Failed(reason) => format!("failed: {reason}"),
            },
        }
    }
}

/// A key-value pair for display.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct KeyValue {
    #[tabled(rename = "Metric")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

impl KeyValue {
    /// Creates a new key-value pair.
    pub fn new(key: impl Into<String>, value: impl ToString) -> Self {
        Self {
            key: key.into(),
            value: value.to_string(),
        }
    }
}

/// Formats and prints rows based on the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Table => print_table(data),
        OutputFormat::Json => print_json(data),
        OutputFormat::Csv => print_csv(data),
    }
}

/// Prints data as a formatted table.
fn print_table<T: Tabled>(data: &[T]) -> anyhow::Result<()> {
    if data.is_empty() {
        println!("No results.");
        return Ok(());
    }

    let table = Table::new(data)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::left()))
        .to_string();

    println!("{}", table);
    Ok(())
}

/// Prints data as JSON.
pub fn print_json<T: Serialize + ?Sized>(data: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Prints data as CSV.
fn print_csv<T: Serialize>(data: &[T]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    for item in data {
        wtr.serialize(item)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Prints a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Prints a warning message.
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow(), message);
}

/// Prints a header for a section.
pub fn print_header(title: &str) {
    println!("\n{}", title.bold().underline());
}

//! # Spreadwatch Ext File
//!
//! File-based and in-memory collaborators for the Spreadwatch engine.
//!
//! - CSV reference file serving both search and reference data
//! - JSON curve file as a group feed
//! - CSV price file as a price feed
//! - Scriptable in-memory collaborators for tests and embedding
//!
//! For live market data, implement the collaborator traits against the
//! vendor platform.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod market_data;
mod memory;
mod reference_data;

pub use market_data::*;
pub use memory::*;
pub use reference_data::*;

use std::path::Path;
use std::sync::Arc;

use spreadwatch_traits::error::TraitError;

/// File-backed collaborator set.
pub struct FileSources {
    /// Search and reference data
    pub reference: Arc<CsvReferenceSource>,
    /// Curve feed
    pub curves: Arc<JsonCurveFeed>,
    /// Price feed
    pub prices: Arc<CsvPriceFeed>,
}

/// Load all file collaborators.
pub fn create_file_sources(
    reference_csv: impl AsRef<Path>,
    curves_json: impl AsRef<Path>,
    prices_csv: impl AsRef<Path>,
) -> Result<FileSources, TraitError> {
    Ok(FileSources {
        reference: Arc::new(CsvReferenceSource::new(reference_csv)?),
        curves: Arc::new(JsonCurveFeed::new(curves_json)?),
        prices: Arc::new(CsvPriceFeed::new(prices_csv)?),
    })
}

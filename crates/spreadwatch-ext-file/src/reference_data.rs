//! File-based search and reference data.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use spreadwatch_traits::error::TraitError;
use spreadwatch_traits::ids::InstrumentKey;
use spreadwatch_traits::reference_data::{ReferenceCollaborator, ReferenceRecord};
use spreadwatch_traits::search::{SearchCollaborator, SearchCriteria};

// =============================================================================
// CSV REFERENCE SOURCE
// =============================================================================

/// CSV row. Every field is kept raw so sentinels reach the engine untouched.
#[derive(Debug, Deserialize)]
struct ReferenceRow {
    key: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    coupon: String,
    #[serde(default)]
    maturity: String,
    #[serde(default)]
    currency: String,
    #[serde(default)]
    structure: String,
}

impl From<ReferenceRow> for ReferenceRecord {
    fn from(row: ReferenceRow) -> Self {
        ReferenceRecord::new(row.key, row.coupon, row.maturity, row.currency, row.structure)
            .with_description(row.description)
    }
}

/// CSV-backed instrument universe.
///
/// Expected header: `key,description,coupon,maturity,currency,structure`.
/// Serves both the search and the reference-data phase.
pub struct CsvReferenceSource {
    file_path: PathBuf,
    records: Vec<ReferenceRecord>,
}

impl CsvReferenceSource {
    /// Load a CSV reference file. A missing file is an empty universe.
    pub fn new(file_path: impl AsRef<Path>) -> Result<Self, TraitError> {
        let file_path = file_path.as_ref().to_path_buf();
        let records = Self::load(&file_path)?;
        Ok(Self { file_path, records })
    }

    fn load(file_path: &Path) -> Result<Vec<ReferenceRecord>, TraitError> {
        if !file_path.exists() {
            return Ok(Vec::new()); // Empty source
        }

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(file_path)
            .map_err(|e| TraitError::IoError(e.to_string()))?;

        reader
            .deserialize::<ReferenceRow>()
            .map(|row| {
                row.map(ReferenceRecord::from)
                    .map_err(|e| TraitError::ParseError(e.to_string()))
            })
            .collect()
    }

    /// Path the records were loaded from.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Loaded records, in file order.
    pub fn records(&self) -> &[ReferenceRecord] {
        &self.records
    }

    fn matches(record: &ReferenceRecord, criteria: &SearchCriteria) -> bool {
        let currency_ok = criteria.currencies.is_empty()
            || criteria
                .currencies
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(record.currency.trim()));

        let text_ok = criteria.text.as_deref().map_or(true, |text| {
            let needle = text.to_lowercase();
            record.description.to_lowercase().contains(&needle)
                || record.key.to_lowercase().contains(&needle)
        });

        currency_ok && text_ok
    }
}

#[async_trait]
impl SearchCollaborator for CsvReferenceSource {
    async fn query(&self, criteria: &SearchCriteria) -> Result<Vec<InstrumentKey>, TraitError> {
        let mut seen = HashSet::new();
        let keys = self
            .records
            .iter()
            .filter(|r| Self::matches(r, criteria))
            .map(|r| InstrumentKey::new(r.key.trim()))
            .filter(|k| seen.insert(k.clone()))
            .take(criteria.max_results.unwrap_or(usize::MAX))
            .collect();
        Ok(keys)
    }
}

#[async_trait]
impl ReferenceCollaborator for CsvReferenceSource {
    async fn fetch(
        &self,
        keys: &[InstrumentKey],
        _fields: &[String],
    ) -> Result<Vec<ReferenceRecord>, TraitError> {
        let wanted: HashSet<&str> = keys.iter().map(InstrumentKey::as_str).collect();
        Ok(self
            .records
            .iter()
            .filter(|r| wanted.contains(r.key.trim()))
            .cloned()
            .collect())
    }
}

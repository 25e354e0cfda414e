//! Bulk reference-data fetch.
//!
//! Reference data arrives once, as raw field values. Any field may carry a
//! "no value" sentinel; interpreting sentinels is the engine's job, so the
//! record keeps every field as the collaborator delivered it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TraitError;
use crate::ids::InstrumentKey;

/// Values treated as "no value" when no sentinel list is configured.
pub const DEFAULT_SENTINELS: [&str; 6] = ["", "NULL", "N.A.", "N/A", "#N/A", "#N/A N/A"];

/// Default field list requested from the reference collaborator.
pub const DEFAULT_REFERENCE_FIELDS: [&str; 5] =
    ["DESCRIPTION", "COUPON", "MATURITY", "CURRENCY", "STRUCTURE"];

/// One raw reference-data record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// Instrument key
    pub key: String,
    /// Description/name
    pub description: String,
    /// Coupon rate in percent (e.g. "5.0")
    pub coupon: String,
    /// Maturity date
    pub maturity: String,
    /// Currency code, which selects the curve group
    pub currency: String,
    /// Structure code (settlement/coupon convention)
    pub structure_code: String,
}

impl ReferenceRecord {
    /// Build a record from raw field values.
    pub fn new(
        key: impl Into<String>,
        coupon: impl Into<String>,
        maturity: impl Into<String>,
        currency: impl Into<String>,
        structure_code: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
            coupon: coupon.into(),
            maturity: maturity.into(),
            currency: currency.into(),
            structure_code: structure_code.into(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Returns true if `value` is one of the configured "no value" sentinels.
///
/// Comparison ignores surrounding whitespace and ASCII case.
pub fn is_sentinel<S: AsRef<str>>(value: &str, sentinels: &[S]) -> bool {
    let value = value.trim();
    sentinels
        .iter()
        .any(|s| s.as_ref().trim().eq_ignore_ascii_case(value))
}

/// Trait for reference data providers.
#[async_trait]
pub trait ReferenceCollaborator: Send + Sync {
    /// Fetch reference records for `keys`. Records may come back in any order
    /// and may be missing for keys the source does not know.
    async fn fetch(
        &self,
        keys: &[InstrumentKey],
        fields: &[String],
    ) -> Result<Vec<ReferenceRecord>, TraitError>;
}

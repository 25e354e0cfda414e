//! Settlement and coupon conventions keyed by structure code.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use spreadwatch_core::Date;

/// Coupon frequencies the yield solve supports.
const SUPPORTED_FREQUENCIES: [u32; 4] = [1, 2, 4, 12];

/// Longest settlement lag a convention may carry, in business days.
pub const MAX_SETTLEMENT_DAYS: u32 = 30;

/// Settlement lag and coupon frequency for one structure code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Convention {
    /// Settlement lag in business days
    pub settlement_days: u32,
    /// Coupon payments per year
    pub frequency: u32,
}

impl Default for Convention {
    fn default() -> Self {
        // T+2, semi-annual
        Self {
            settlement_days: 2,
            frequency: 2,
        }
    }
}

impl Convention {
    /// Creates a convention.
    #[must_use]
    pub fn new(settlement_days: u32, frequency: u32) -> Self {
        Self {
            settlement_days,
            frequency,
        }
    }

    /// Settlement date for a trade done `today`, never later than `maturity`.
    #[must_use]
    pub fn settlement_date(&self, today: Date, maturity: Date) -> Date {
        let days = i32::try_from(self.settlement_days.min(MAX_SETTLEMENT_DAYS)).unwrap_or(0);
        let settle = today.add_business_days(days);
        if settle > maturity {
            maturity
        } else {
            settle
        }
    }

    fn is_supported(&self) -> bool {
        SUPPORTED_FREQUENCIES.contains(&self.frequency)
    }

    /// Check the settlement lag is within bounds.
    ///
    /// Unsupported frequencies are not an error; `resolve` falls back instead.
    pub fn validate(&self) -> Result<(), String> {
        if self.settlement_days > MAX_SETTLEMENT_DAYS {
            return Err(format!(
                "settlement_days {} exceeds maximum of {}",
                self.settlement_days, MAX_SETTLEMENT_DAYS
            ));
        }
        Ok(())
    }
}

/// Convention table: a default plus per-structure-code overrides.
///
/// Structure codes are matched case-insensitively.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConventionConfig {
    /// Convention used when the structure code is absent or unknown
    pub default: Convention,
    /// Per-structure-code overrides
    pub overrides: HashMap<String, Convention>,
}

impl ConventionConfig {
    /// Add an override.
    #[must_use]
    pub fn with_override(mut self, code: &str, convention: Convention) -> Self {
        self.overrides.insert(code.trim().to_uppercase(), convention);
        self
    }

    /// Check the default and every override.
    pub fn validate(&self) -> Result<(), String> {
        self.default
            .validate()
            .map_err(|e| format!("conventions.default: {e}"))?;
        for (code, convention) in &self.overrides {
            convention
                .validate()
                .map_err(|e| format!("conventions.overrides.{code}: {e}"))?;
        }
        Ok(())
    }

    /// Resolve the convention for a structure code.
    ///
    /// Unsupported frequencies fall back to the default convention.
    pub fn resolve(&self, structure_code: Option<&str>) -> Convention {
        let Some(code) = structure_code else {
            return self.default;
        };
        let code = code.trim().to_uppercase();
        let found = self
            .overrides
            .iter()
            .find(|(k, _)| k.trim().to_uppercase() == code)
            .map(|(_, v)| *v);

        match found {
            Some(convention) if convention.is_supported() => convention,
            Some(convention) => {
                warn!(
                    "Structure code {} has unsupported frequency {}, using default",
                    code, convention.frequency
                );
                self.default
            }
            None => self.default,
        }
    }
}

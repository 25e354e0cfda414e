//! Engine configuration.
//!
//! Configuration contains:
//! - Queue and stream capacities
//! - Field lists requested from collaborators
//! - Reference-data sentinels and duplicate handling
//!
//! Configuration does NOT contain market data or instrument terms.

use serde::{Deserialize, Serialize};

use crate::group_feed::DEFAULT_CURVE_FIELDS;
use crate::reference_data::{DEFAULT_REFERENCE_FIELDS, DEFAULT_SENTINELS};

/// How a reference record for an already-known key is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Keep the first record, count the duplicate.
    #[default]
    Ignore,
    /// Overwrite static fields. The group of an instrument never changes.
    Replace,
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine name (used in logs)
    pub name: String,
    /// Capacity of the internal feed queue
    pub event_buffer: usize,
    /// Capacity of the result broadcast channel
    pub result_buffer: usize,
    /// Fields requested from the reference collaborator
    pub reference_fields: Vec<String>,
    /// Fields requested from the group feed
    pub curve_fields: Vec<String>,
    /// Raw values treated as "no value"
    pub sentinels: Vec<String>,
    /// Duplicate reference key handling
    pub duplicate_policy: DuplicatePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "spreadwatch".to_string(),
            event_buffer: 10_000,
            result_buffer: 10_000,
            reference_fields: DEFAULT_REFERENCE_FIELDS.iter().map(|s| s.to_string()).collect(),
            curve_fields: DEFAULT_CURVE_FIELDS.iter().map(|s| s.to_string()).collect(),
            sentinels: DEFAULT_SENTINELS.iter().map(|s| s.to_string()).collect(),
            duplicate_policy: DuplicatePolicy::Ignore,
        }
    }
}

impl EngineConfig {
    /// Create a config with the given name and defaults elsewhere.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the duplicate policy.
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Check capacities and field lists are usable.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_buffer == 0 {
            return Err("event_buffer must be greater than zero".to_string());
        }
        if self.result_buffer == 0 {
            return Err("result_buffer must be greater than zero".to_string());
        }
        if self.curve_fields.is_empty() {
            return Err("curve_fields must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Ignore);
        assert_eq!(config.curve_fields, vec!["TENOR", "RATE"]);
        assert!(config.sentinels.contains(&"NULL".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"name":"eod","duplicate_policy":"replace"}"#).unwrap();
        assert_eq!(config.name, "eod");
        assert_eq!(config.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.event_buffer, 10_000);
    }

    #[test]
    fn test_zero_capacity_is_rejected() {
        let config = EngineConfig {
            event_buffer: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_curve_fields_are_rejected() {
        let config = EngineConfig {
            curve_fields: Vec::new(),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

//! Configuration file handling.
//!
//! ```toml
//! [engine]
//! name = "eod-run"
//! duplicate_policy = "replace"
//!
//! [conventions.default]
//! settlement_days = 2
//! frequency = 2
//!
//! [conventions.overrides.UST]
//! settlement_days = 1
//! frequency = 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use spreadwatch_analytics::ConventionConfig;
use spreadwatch_traits::config::EngineConfig;

use crate::error::{CliError, CliResult};

/// Everything the host reads from its config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Engine settings
    pub engine: EngineConfig,
    /// Settlement and coupon conventions
    pub conventions: ConventionConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> CliResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| CliError::Config(e.to_string()))?;
        config.engine.validate().map_err(CliError::Config)?;
        config.conventions.validate().map_err(CliError::Config)?;
        Ok(config)
    }

    /// Load `path` if given and present, defaults otherwise.
    pub fn load(path: Option<&Path>) -> CliResult<Self> {
        match path {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(path)
            }
            Some(path) => {
                info!("{} not found, using default configuration", path.display());
                Ok(Self::default())
            }
            None => {
                info!("Using default configuration");
                Ok(Self::default())
            }
        }
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> CliResult<String> {
        toml::to_string_pretty(self).map_err(|e| CliError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spreadwatch_analytics::Convention;
    use spreadwatch_traits::config::DuplicatePolicy;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [engine]
            name = "eod-run"
            duplicate_policy = "replace"

            [conventions.overrides.UST]
            settlement_days = 1
            frequency = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.name, "eod-run");
        assert_eq!(config.engine.duplicate_policy, DuplicatePolicy::Replace);
        assert_eq!(config.engine.event_buffer, 10_000);
        assert_eq!(config.conventions.resolve(Some("ust")), Convention::new(1, 2));
        assert_eq!(config.conventions.resolve(None), Convention::default());
    }

    #[test]
    fn test_invalid_engine_settings_are_rejected() {
        let result = AppConfig::from_toml_str("[engine]\nevent_buffer = 0\n");
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_oversized_settlement_lag_is_rejected() {
        let result = AppConfig::from_toml_str(
            r#"
            [conventions.overrides.UST]
            settlement_days = 4000000000
            frequency = 2
            "#,
        );
        match result {
            Err(CliError::Config(msg)) => assert!(msg.contains("settlement_days")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_means_defaults() {
        let config = AppConfig::load(Some(Path::new("/nonexistent/spreadwatch.toml"))).unwrap();
        assert_eq!(config.engine.name, "spreadwatch");
    }

    #[test]
    fn test_round_trips_through_toml() {
        let text = AppConfig::default().to_toml_string().unwrap();
        let config = AppConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.engine.sentinels, EngineConfig::default().sentinels);
    }
}

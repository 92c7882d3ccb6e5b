//! Engine configuration.
//!
//! Loaded from JSON. Every field is optional and falls back to its default:
//!
//! ```json
//! { "clock": { "fixed_dt": 0.016666666666666666, "max_accumulator": 0.25 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub clock: ClockConfig,
}

/// Fixed-timestep settings for the [`GameClock`](crate::clock::GameClock).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Seconds per simulation tick.
    pub fixed_dt: f64,
    /// Cap on accumulated frame time, in seconds.
    pub max_accumulator: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_accumulator: 0.25,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&json)?;
        log::info!("loaded engine config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ClockConfig {
            fixed_dt,
            max_accumulator,
        } = self.clock;
        if !fixed_dt.is_finite() || fixed_dt <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "clock.fixed_dt must be a positive number, got {fixed_dt}"
            )));
        }
        if !max_accumulator.is_finite() || max_accumulator < fixed_dt {
            return Err(ConfigError::Invalid(format!(
                "clock.max_accumulator ({max_accumulator}) must be at least fixed_dt ({fixed_dt})"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.clock.fixed_dt, 1.0 / 60.0);
        assert_eq!(config.clock.max_accumulator, 0.25);
    }

    #[test]
    fn partial_clock_section() {
        let config = EngineConfig::from_json_str(r#"{ "clock": { "fixed_dt": 0.02 } }"#).unwrap();
        assert_eq!(config.clock.fixed_dt, 0.02);
        assert_eq!(config.clock.max_accumulator, 0.25);
    }

    #[test]
    fn rejects_non_positive_fixed_dt() {
        let err = EngineConfig::from_json_str(r#"{ "clock": { "fixed_dt": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("fixed_dt"));
    }

    #[test]
    fn rejects_accumulator_below_step() {
        let err = EngineConfig::from_json_str(r#"{ "clock": { "fixed_dt": 0.5, "max_accumulator": 0.25 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = EngineConfig::from_json_str("{ clock: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "clock": {{ "fixed_dt": 0.01, "max_accumulator": 0.1 }} }}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.clock.fixed_dt, 0.01);
        assert_eq!(config.clock.max_accumulator, 0.1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = EngineConfig::load(&path).unwrap_err();
        match err {
            ConfigError::Io { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("expected Io error, got {other:?}"),
        }
    }
}

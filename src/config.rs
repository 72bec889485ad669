// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Seismic Serviceability Suite - Engine Configuration

//! Engine configuration.
//!
//! Every value has a default; a JSON file may override any subset of them.
//! [`EngineConfig::validate`] runs before any scenario is scheduled.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::damage::FragilityModel;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("duration must be non-negative, got {0} h")]
    NegativeDuration(i64),

    #[error("leak window [{start}, {end}] h is invalid")]
    InvalidLeakWindow { start: i64, end: i64 },

    #[error("{name} must be finite, got {value}")]
    NonFinite { name: &'static str, value: f64 },

    #[error("required pressure {required} is below minimum pressure {minimum}")]
    PressureOrdering { minimum: f64, required: f64 },

    #[error("max_workers must be at least 1")]
    NoWorkers,

    #[error("scenario timeout must be positive")]
    ZeroTimeout,

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Hydraulics
// ---------------------------------------------------------------------------

/// Global hydraulic settings shared by every scenario. Times in hours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydraulicConfig {
    pub duration: i64,
    pub leak_start_time: i64,
    pub leak_end_time: i64,
    pub minimum_pressure: f64,
    pub required_pressure: f64,
}

impl Default for HydraulicConfig {
    fn default() -> Self {
        Self {
            duration: 24,
            leak_start_time: 0,
            leak_end_time: 24,
            minimum_pressure: 0.0,
            required_pressure: 20.0,
        }
    }
}

impl HydraulicConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.duration < 0 {
            return Err(ConfigError::NegativeDuration(self.duration));
        }
        if self.leak_start_time < 0 || self.leak_end_time < self.leak_start_time {
            return Err(ConfigError::InvalidLeakWindow {
                start: self.leak_start_time,
                end: self.leak_end_time,
            });
        }
        for (name, value) in [
            ("minimum_pressure", self.minimum_pressure),
            ("required_pressure", self.required_pressure),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { name, value });
            }
        }
        if self.required_pressure < self.minimum_pressure {
            return Err(ConfigError::PressureOrdering {
                minimum: self.minimum_pressure,
                required: self.required_pressure,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// What to do with scenario rows whose `site_id` is not in the network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownSitePolicy {
    /// Reject the whole batch.
    #[default]
    Reject,
    /// Skip the row.
    Ignore,
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub hydraulics: HydraulicConfig,
    pub fragility: FragilityModel,
    /// Global seed; each scenario draws from its own stream of it.
    pub seed: u64,
    /// Concurrent solver calls.
    pub max_workers: usize,
    pub scenario_timeout_secs: u64,
    pub unknown_sites: UnknownSitePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hydraulics: HydraulicConfig::default(),
            fragility: FragilityModel::default(),
            seed: 0,
            max_workers: default_workers(),
            scenario_timeout_secs: 600,
            unknown_sites: UnknownSitePolicy::Reject,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn scenario_timeout(&self) -> Duration {
        Duration::from_secs(self.scenario_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.hydraulics.validate()?;
        if self.max_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.scenario_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.max_workers >= 1);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let config = HydraulicConfig { duration: -1, ..HydraulicConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::NegativeDuration(-1))));
    }

    #[test]
    fn test_pressure_ordering() {
        let config = HydraulicConfig {
            minimum_pressure: 10.0,
            required_pressure: 5.0,
            ..HydraulicConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::PressureOrdering { .. })));

        let equal = HydraulicConfig {
            minimum_pressure: 10.0,
            required_pressure: 10.0,
            ..HydraulicConfig::default()
        };
        assert!(equal.validate().is_ok());
    }

    #[test]
    fn test_leak_window_and_non_finite() {
        let window = HydraulicConfig {
            leak_start_time: 6,
            leak_end_time: 2,
            ..HydraulicConfig::default()
        };
        assert!(matches!(window.validate(), Err(ConfigError::InvalidLeakWindow { .. })));

        let nan = HydraulicConfig { minimum_pressure: f64::NAN, ..HydraulicConfig::default() };
        assert!(matches!(nan.validate(), Err(ConfigError::NonFinite { .. })));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{"seed": 9, "hydraulics": {"duration": 48}, "unknown_sites": "ignore"}"#,
        )
        .unwrap();
        assert_eq!(config.seed, 9);
        assert_eq!(config.hydraulics.duration, 48);
        assert_eq!(config.hydraulics.leak_end_time, 24);
        assert_eq!(config.unknown_sites, UnknownSitePolicy::Ignore);
        assert_eq!(config.fragility, FragilityModel::default());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = EngineConfig { max_workers: 0, ..EngineConfig::default() };
        assert!(matches!(config.validate(), Err(ConfigError::NoWorkers)));
    }
}

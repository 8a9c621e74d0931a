//! Tunable engine parameters.
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::constants::{
    CONFIG_MAX_HEALTH_CAP, CONFIG_MAX_LEVEL_CAP, CONFIG_QUESTIONS_CAP, CONFIG_TRANSITION_CAP_MS,
    DEFAULT_FEVER_THRESHOLD, DEFAULT_MAX_HEALTH, DEFAULT_MAX_LEVEL, DEFAULT_QUESTIONS_PER_LEVEL,
    DEFAULT_TRANSITION_MS,
};

/// Errors raised when engine configuration invariants are violated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },
    #[error("config could not be parsed: {0}")]
    Parse(String),
}

/// Progression limits and pacing for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "EngineConfig::default_max_health")]
    pub max_health: u8,
    #[serde(default = "EngineConfig::default_max_level")]
    pub max_level: u8,
    #[serde(default = "EngineConfig::default_questions_per_level")]
    pub questions_per_level: u8,
    #[serde(default = "EngineConfig::default_fever_threshold")]
    pub fever_threshold: u8,
    /// Length of the walk between questions; zero skips the transition state.
    #[serde(default = "EngineConfig::default_transition_ms")]
    pub transition_ms: u64,
}

impl EngineConfig {
    const fn default_max_health() -> u8 {
        DEFAULT_MAX_HEALTH
    }

    const fn default_max_level() -> u8 {
        DEFAULT_MAX_LEVEL
    }

    const fn default_questions_per_level() -> u8 {
        DEFAULT_QUESTIONS_PER_LEVEL
    }

    const fn default_fever_threshold() -> u8 {
        DEFAULT_FEVER_THRESHOLD
    }

    const fn default_transition_ms() -> u64 {
        DEFAULT_TRANSITION_MS
    }

    /// Same limits with the transition state disabled.
    #[must_use]
    pub const fn instant(mut self) -> Self {
        self.transition_ms = 0;
        self
    }

    #[must_use]
    pub const fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    /// Parse and validate a JSON config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a field is out of range.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every field against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first field found outside its range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("max_health", self.max_health.into(), 1, CONFIG_MAX_HEALTH_CAP.into())?;
        check_range("max_level", self.max_level.into(), 1, CONFIG_MAX_LEVEL_CAP.into())?;
        check_range(
            "questions_per_level",
            self.questions_per_level.into(),
            1,
            CONFIG_QUESTIONS_CAP.into(),
        )?;
        check_range(
            "fever_threshold",
            self.fever_threshold.into(),
            1,
            CONFIG_QUESTIONS_CAP.into(),
        )?;
        check_range("transition_ms", self.transition_ms, 0, CONFIG_TRANSITION_CAP_MS)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_health: Self::default_max_health(),
            max_level: Self::default_max_level(),
            questions_per_level: Self::default_questions_per_level(),
            fever_threshold: Self::default_fever_threshold(),
            transition_ms: Self::default_transition_ms(),
        }
    }
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::DEFAULT_CAPACITY;

fn default_time_speed() -> f64 {
    1.0
}

fn default_legal_acceptance_rate() -> f64 {
    30.0
}

fn default_illegal_success_rate() -> f64 {
    10.0
}

fn default_tfr_native() -> f64 {
    1.5
}

fn default_tfr_legal() -> f64 {
    2.1
}

fn default_tfr_illegal() -> f64 {
    3.0
}

fn default_initial_natives() -> usize {
    100
}

fn default_initial_outsiders() -> usize {
    100
}

fn default_frame_seconds() -> f64 {
    1.0 / 60.0
}

fn default_steps() -> u64 {
    3_600
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_stats_interval_seconds() -> f64 {
    0.2
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Tunables read by the systems at the start of every step.
///
/// Rates are percentages of annual admission probability; TFRs are children
/// per couple over a reproductive life. None of them are range-checked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Simulated years per real second.
    #[serde(default = "default_time_speed", alias = "timeSpeed")]
    pub time_speed: f64,
    #[serde(
        default = "default_legal_acceptance_rate",
        alias = "legalAcceptanceRate"
    )]
    pub legal_acceptance_rate: f64,
    #[serde(default = "default_illegal_success_rate", alias = "illegalSuccessRate")]
    pub illegal_success_rate: f64,
    #[serde(default = "default_tfr_native", alias = "tfrNative")]
    pub tfr_native: f64,
    #[serde(default = "default_tfr_legal", alias = "tfrLegal")]
    pub tfr_legal: f64,
    #[serde(default = "default_tfr_illegal", alias = "tfrIllegal")]
    pub tfr_illegal: f64,
    #[serde(default = "default_initial_natives", alias = "initialNatives")]
    pub initial_natives: usize,
    /// Also the size the outsider pool is topped up to after every step.
    #[serde(default = "default_initial_outsiders", alias = "initialOutsiders")]
    pub initial_outsiders: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            time_speed: default_time_speed(),
            legal_acceptance_rate: default_legal_acceptance_rate(),
            illegal_success_rate: default_illegal_success_rate(),
            tfr_native: default_tfr_native(),
            tfr_legal: default_tfr_legal(),
            tfr_illegal: default_tfr_illegal(),
            initial_natives: default_initial_natives(),
            initial_outsiders: default_initial_outsiders(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_frame_seconds")]
    pub frame_seconds: f64,
    #[serde(default = "default_steps")]
    pub steps: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_stats_interval_seconds")]
    pub stats_interval_seconds: f64,
    #[serde(default)]
    pub snapshot_interval_steps: u64,
    #[serde(default)]
    pub params: SimulationParams,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario validation error: {0}")]
    Validation(String),
}

impl Scenario {
    /// Scenario with every tunable at its default.
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self {
            name: name.into(),
            description: None,
            seed,
            frame_seconds: default_frame_seconds(),
            steps: default_steps(),
            capacity: default_capacity(),
            stats_interval_seconds: default_stats_interval_seconds(),
            snapshot_interval_steps: 0,
            params: SimulationParams::default(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn with_params(mut self, params: SimulationParams) -> Self {
        self.params = params;
        self
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.name.trim().is_empty() {
            return Err(ScenarioError::Validation(
                "scenario must define a name".to_string(),
            ));
        }
        if !self.frame_seconds.is_finite() || self.frame_seconds < 0.0 {
            return Err(ScenarioError::Validation(format!(
                "frame_seconds must be a non-negative number, got {}",
                self.frame_seconds
            )));
        }
        if self.capacity == 0 {
            return Err(ScenarioError::Validation(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if !self.stats_interval_seconds.is_finite() || self.stats_interval_seconds < 0.0 {
            return Err(ScenarioError::Validation(format!(
                "stats_interval_seconds must be a non-negative number, got {}",
                self.stats_interval_seconds
            )));
        }
        Ok(())
    }

    pub fn steps(&self, override_steps: Option<u64>) -> u64 {
        override_steps.unwrap_or(self.steps)
    }
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Scenario> {
        let scenario: Scenario = serde_yaml::from_str(text)?;
        scenario.validate()?;
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_scenario_takes_defaults() {
        let scenario = ScenarioLoader::parse("name: tiny\nseed: 3\n").unwrap();
        assert_eq!(scenario.name, "tiny");
        assert_eq!(scenario.capacity, DEFAULT_CAPACITY);
        assert_eq!(scenario.params, SimulationParams::default());
        assert_eq!(scenario.snapshot_interval_steps, 0);
        assert_eq!(scenario.logging.level, "info");
    }

    #[test]
    fn camel_case_params_are_accepted() {
        let text = "name: camel\nseed: 1\nparams:\n  timeSpeed: 4.0\n  legalAcceptanceRate: 55\n  initialOutsiders: 12\n";
        let scenario = ScenarioLoader::parse(text).unwrap();
        assert_eq!(scenario.params.time_speed, 4.0);
        assert_eq!(scenario.params.legal_acceptance_rate, 55.0);
        assert_eq!(scenario.params.initial_outsiders, 12);
        assert_eq!(scenario.params.tfr_native, 1.5);
    }

    #[test]
    fn out_of_range_rates_are_not_rejected() {
        let text = "name: wild\nseed: 1\nparams:\n  legal_acceptance_rate: 250\n  illegal_success_rate: -20\n";
        let scenario = ScenarioLoader::parse(text).unwrap();
        assert_eq!(scenario.params.legal_acceptance_rate, 250.0);
        assert_eq!(scenario.params.illegal_success_rate, -20.0);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = ScenarioLoader::parse("name: empty\nseed: 1\ncapacity: 0\n").unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn step_override_wins() {
        let scenario = Scenario::new("cli", 9);
        assert_eq!(scenario.steps(None), 3_600);
        assert_eq!(scenario.steps(Some(12)), 12);
    }
}

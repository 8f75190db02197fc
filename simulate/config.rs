//! # Simulation Configuration
//!
//! A scenario file is a TOML document holding one `[[scenario]]` table per named
//! simulation configuration. Each raw entry is deserialized into a
//! [`ScenarioSpec`], where every field but `name` falls back to a documented
//! default, and then validated into a strongly typed [`SimulationConfig`].
//!
//! Validation happens before any sampling so that a bad parameter is reported
//! against its scenario instead of surfacing halfway through a run.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_N_EYES: usize = 1000;
pub const DEFAULT_NUMBER_SIMULATIONS: usize = 1000;
pub const DEFAULT_DELAY: bool = true;
pub const DEFAULT_LOSS_MODE: &str = "uniform";
pub const DEFAULT_UNIFORM_LOWER: f64 = 0.0;
pub const DEFAULT_UNIFORM_UPPER: f64 = 15.0;
pub const DEFAULT_NORMAL_MEAN: f64 = 7.0;
pub const DEFAULT_NORMAL_SD: f64 = 12.0;
/// Baseline VA at or below this (about 6/96 Snellen) was outside funded treatment.
pub const DEFAULT_INELIGIBLE_THRESHOLD: i32 = 25;

/// Largest letter-loss bound or normal mean accepted, so that every rounded
/// draw is representable as `i32` letters.
pub const MAX_LOSS_MAGNITUDE: f64 = i32::MAX as f64;

fn representable_letters(value: f64) -> bool {
    value.is_finite() && value.abs() <= MAX_LOSS_MAGNITUDE
}

/// Errors raised while reading or validating simulation configurations.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read scenario file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML scenario file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Scenario file defines no [[scenario]] entries.")]
    NoScenarios,
    #[error("Scenario name must not be empty.")]
    EmptyName,
    #[error("Scenario '{0}' is defined more than once. Scenario names must be unique.")]
    DuplicateScenario(String),
    #[error(
        "Scenario '{scenario}': unrecognized loss distribution '{mode}'. Expected 'uniform' or 'normal'."
    )]
    UnknownLossMode { scenario: String, mode: String },
    #[error("Unrecognized loss distribution '{0}'. Expected 'uniform' or 'normal'.")]
    InvalidLossMode(String),
    #[error("Scenario '{scenario}': n_eyes must be at least 1 (found {found}).")]
    NonPositiveCohortSize { scenario: String, found: i64 },
    #[error("Scenario '{scenario}': number_simulations must be at least 1 (found {found}).")]
    NonPositiveIterations { scenario: String, found: i64 },
    #[error("Scenario '{scenario}': normal sd must be a finite, non-negative number (found {found}).")]
    InvalidNormalSd { scenario: String, found: f64 },
    #[error("Scenario '{scenario}': normal mean must be finite and at most 2147483647 letters in magnitude (found {found}).")]
    InvalidNormalMean { scenario: String, found: f64 },
    #[error(
        "Scenario '{scenario}': uniform bounds must be finite, at most 2147483647 letters in magnitude, with lower <= upper (found lower={lower}, upper={upper})."
    )]
    InvalidUniformBounds {
        scenario: String,
        lower: f64,
        upper: f64,
    },
}

/// The two supported letter-loss families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LossMode {
    Uniform,
    Normal,
}

impl FromStr for LossMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniform" => Ok(LossMode::Uniform),
            "normal" => Ok(LossMode::Normal),
            _ => Err(ConfigError::InvalidLossMode(s.to_string())),
        }
    }
}

impl fmt::Display for LossMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LossMode::Uniform => f.write_str("uniform"),
            LossMode::Normal => f.write_str("normal"),
        }
    }
}

/// Letter-loss distribution together with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LossDistribution {
    /// Rounded draw from a continuous uniform on `[lower, upper]`.
    Uniform { lower: f64, upper: f64 },
    /// Rounded draw from `N(mean, sd)`, floored at zero.
    Normal { mean: f64, sd: f64 },
}

impl LossDistribution {
    pub fn mode(&self) -> LossMode {
        match self {
            LossDistribution::Uniform { .. } => LossMode::Uniform,
            LossDistribution::Normal { .. } => LossMode::Normal,
        }
    }

    /// A distribution that always yields zero letters lost.
    pub fn none() -> Self {
        LossDistribution::Uniform {
            lower: 0.0,
            upper: 0.0,
        }
    }
}

/// A validated, named bundle of simulation parameters. This is the unit of
/// comparison in the final summary table.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub name: String,
    /// Cohort size drawn per iteration.
    pub n_eyes: usize,
    /// Number of iterations; iteration indices run `1..=number_simulations`.
    pub number_simulations: usize,
    /// Apply letter loss and the ineligibility override.
    pub delay: bool,
    pub loss: LossDistribution,
    /// Baseline VA at or below which eyes receive no treatment benefit.
    pub ineligible_threshold: i32,
}

impl SimulationConfig {
    /// A configuration with every parameter at its default.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            n_eyes: DEFAULT_N_EYES,
            number_simulations: DEFAULT_NUMBER_SIMULATIONS,
            delay: DEFAULT_DELAY,
            loss: LossDistribution::Uniform {
                lower: DEFAULT_UNIFORM_LOWER,
                upper: DEFAULT_UNIFORM_UPPER,
            },
            ineligible_threshold: DEFAULT_INELIGIBLE_THRESHOLD,
        }
    }

    /// Checks every parameter invariant. The engine calls this before sampling
    /// so that configurations built in code are held to the same rules as files.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.n_eyes == 0 {
            return Err(ConfigError::NonPositiveCohortSize {
                scenario: self.name.clone(),
                found: 0,
            });
        }
        if self.number_simulations == 0 {
            return Err(ConfigError::NonPositiveIterations {
                scenario: self.name.clone(),
                found: 0,
            });
        }
        match self.loss {
            LossDistribution::Uniform { lower, upper } => {
                if !representable_letters(lower)
                    || !representable_letters(upper)
                    || lower > upper
                    || !(upper - lower).is_finite()
                {
                    return Err(ConfigError::InvalidUniformBounds {
                        scenario: self.name.clone(),
                        lower,
                        upper,
                    });
                }
            }
            LossDistribution::Normal { mean, sd } => {
                if !representable_letters(mean) {
                    return Err(ConfigError::InvalidNormalMean {
                        scenario: self.name.clone(),
                        found: mean,
                    });
                }
                if !sd.is_finite() || sd < 0.0 {
                    return Err(ConfigError::InvalidNormalSd {
                        scenario: self.name.clone(),
                        found: sd,
                    });
                }
            }
        }
        Ok(())
    }
}

/// One raw `[[scenario]]` entry as written in a scenario file.
///
/// Counts are signed so that a negative value is reported as a configuration
/// error rather than a TOML type error.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(default = "default_n_eyes")]
    pub n_eyes: i64,
    #[serde(default = "default_number_simulations")]
    pub number_simulations: i64,
    #[serde(default = "default_delay")]
    pub delay: bool,
    #[serde(default = "default_loss_mode")]
    pub loss: String,
    #[serde(default = "default_uniform_lower")]
    pub lower: f64,
    #[serde(default = "default_uniform_upper")]
    pub upper: f64,
    #[serde(default = "default_normal_mean")]
    pub mean: f64,
    #[serde(default = "default_normal_sd")]
    pub sd: f64,
    #[serde(default = "default_ineligible_threshold")]
    pub ineligible_threshold: i32,
}

fn default_n_eyes() -> i64 {
    DEFAULT_N_EYES as i64
}

fn default_number_simulations() -> i64 {
    DEFAULT_NUMBER_SIMULATIONS as i64
}

fn default_delay() -> bool {
    DEFAULT_DELAY
}

fn default_loss_mode() -> String {
    DEFAULT_LOSS_MODE.to_string()
}

fn default_uniform_lower() -> f64 {
    DEFAULT_UNIFORM_LOWER
}

fn default_uniform_upper() -> f64 {
    DEFAULT_UNIFORM_UPPER
}

fn default_normal_mean() -> f64 {
    DEFAULT_NORMAL_MEAN
}

fn default_normal_sd() -> f64 {
    DEFAULT_NORMAL_SD
}

fn default_ineligible_threshold() -> i32 {
    DEFAULT_INELIGIBLE_THRESHOLD
}

impl ScenarioSpec {
    /// Validates the raw entry into a [`SimulationConfig`].
    pub fn into_config(self) -> Result<SimulationConfig, ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.n_eyes <= 0 {
            return Err(ConfigError::NonPositiveCohortSize {
                scenario: self.name,
                found: self.n_eyes,
            });
        }
        if self.number_simulations <= 0 {
            return Err(ConfigError::NonPositiveIterations {
                scenario: self.name,
                found: self.number_simulations,
            });
        }

        let mode = match self.loss.parse::<LossMode>() {
            Ok(mode) => mode,
            Err(_) => {
                return Err(ConfigError::UnknownLossMode {
                    scenario: self.name,
                    mode: self.loss,
                });
            }
        };
        let loss = match mode {
            LossMode::Uniform => LossDistribution::Uniform {
                lower: self.lower,
                upper: self.upper,
            },
            LossMode::Normal => LossDistribution::Normal {
                mean: self.mean,
                sd: self.sd,
            },
        };

        let config = SimulationConfig {
            name: self.name,
            n_eyes: self.n_eyes as usize,
            number_simulations: self.number_simulations as usize,
            delay: self.delay,
            loss,
            ineligible_threshold: self.ineligible_threshold,
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScenarioFile {
    #[serde(default)]
    scenario: Vec<ScenarioSpec>,
}

/// Parses and validates the text of a scenario file.
pub fn parse_scenarios(text: &str) -> Result<Vec<SimulationConfig>, ConfigError> {
    let file: ScenarioFile = toml::from_str(text)?;
    if file.scenario.is_empty() {
        return Err(ConfigError::NoScenarios);
    }

    let mut seen = HashSet::with_capacity(file.scenario.len());
    let mut configs = Vec::with_capacity(file.scenario.len());
    for spec in file.scenario {
        if !seen.insert(spec.name.clone()) {
            return Err(ConfigError::DuplicateScenario(spec.name));
        }
        configs.push(spec.into_config()?);
    }
    Ok(configs)
}

/// Reads a scenario file from disk.
pub fn load_scenarios(path: &str) -> Result<Vec<SimulationConfig>, ConfigError> {
    let text = fs::read_to_string(path)?;
    let configs = parse_scenarios(&text)?;
    log::info!("Loaded {} scenario(s) from '{}'", configs.len(), path);
    Ok(configs)
}

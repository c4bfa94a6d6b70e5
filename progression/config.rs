//! Run configuration, stored as TOML.

use crate::simulator::{DEFAULT_MONTHS, DEFAULT_SIMULATIONS, SimulationError, SimulationMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "ONCOTWIN_CONFIG";

const DEFAULT_MAX_SIMULATIONS: usize = 10_000;
const DEFAULT_SURVIVAL_YEARS: u32 = 10;
/// Longest survival curve a run may request.
pub const MAX_SURVIVAL_YEARS: u32 = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("months must be positive")]
    ZeroMonths,
    #[error("n_simulations must be between 1 and {max} (got {requested})")]
    SimulationCount { requested: usize, max: usize },
    #[error("survival_years must be at most {max} (got {requested})")]
    SurvivalYears { requested: u32, max: u32 },
    #[error(transparent)]
    Simulation(#[from] SimulationError),
}

fn default_mode() -> String {
    SimulationMode::default().name().to_string()
}

fn default_months() -> u32 {
    DEFAULT_MONTHS
}

fn default_simulations() -> usize {
    DEFAULT_SIMULATIONS
}

fn default_max_simulations() -> usize {
    DEFAULT_MAX_SIMULATIONS
}

fn default_survival_years() -> u32 {
    DEFAULT_SURVIVAL_YEARS
}

/// Defaults for simulation runs. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Kept as text so an unknown mode surfaces as a configuration error on use
    /// rather than as a parse failure.
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_months")]
    pub months: u32,
    #[serde(default = "default_simulations")]
    pub n_simulations: usize,
    #[serde(default = "default_max_simulations")]
    pub max_simulations: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_survival_years")]
    pub survival_years: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            months: default_months(),
            n_simulations: default_simulations(),
            max_simulations: default_max_simulations(),
            seed: None,
            survival_years: default_survival_years(),
        }
    }
}

impl SimulationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    /// Loads the file named by `ONCOTWIN_CONFIG`, or defaults when the variable
    /// is unset or the file does not exist.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load_or_default(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn simulation_mode(&self) -> Result<SimulationMode, ConfigError> {
        Ok(self.mode.parse()?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation_mode()?;
        if self.months == 0 {
            return Err(ConfigError::ZeroMonths);
        }
        self.check_survival_years(self.survival_years)?;
        self.check_simulation_count(self.n_simulations)
    }

    /// Rejects survival horizons beyond [`MAX_SURVIVAL_YEARS`].
    pub fn check_survival_years(&self, requested: u32) -> Result<(), ConfigError> {
        if requested > MAX_SURVIVAL_YEARS {
            return Err(ConfigError::SurvivalYears {
                requested,
                max: MAX_SURVIVAL_YEARS,
            });
        }
        Ok(())
    }

    /// Rejects run counts of zero or above `max_simulations`.
    pub fn check_simulation_count(&self, requested: usize) -> Result<(), ConfigError> {
        if requested == 0 || requested > self.max_simulations {
            return Err(ConfigError::SimulationCount {
                requested,
                max: self.max_simulations,
            });
        }
        Ok(())
    }
}

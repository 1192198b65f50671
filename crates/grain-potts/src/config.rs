//! Simulation configuration: a plain `key = value` text file with `#`
//! comments. Values keep everything after the `=`, joined by single
//! spaces, so checkpoint lists can be written inline.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

use crate::potts::DEFAULT_RNG_SEED;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub initial_state_path: String,
    pub output_folder: PathBuf,
    pub identifier: String,
    /// Whitespace-separated explicit checkpoint timesteps.
    pub checkpoints: String,
    /// Periodic checkpoint spacing; non-positive disables it.
    pub checkpoint_interval: f64,
    /// Simulation end time; non-positive means run until the explicit
    /// checkpoint list is exhausted.
    pub max_timestep: f64,
    pub default_mobility: f64,
    pub transitioned_mobility: f64,
    pub transition_interval: f64,
    pub transition_count: usize,
    pub scale_multiplier: f64,
    pub propagation_chance: f64,
    pub propagation_ratio: f64,
    pub use_potential_energy: bool,
    /// Overrides the auto-detected grain count when non-zero.
    pub const_grain_count: u32,
    pub log_transitions: bool,
    pub generate_analysis_files: bool,
    pub rng_seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            initial_state_path: String::new(),
            output_folder: PathBuf::new(),
            identifier: String::new(),
            checkpoints: String::new(),
            checkpoint_interval: -1.0,
            max_timestep: -1.0,
            default_mobility: 0.002,
            transitioned_mobility: 0.04,
            transition_interval: 0.0,
            transition_count: 0,
            scale_multiplier: 1.0,
            propagation_chance: 0.95,
            propagation_ratio: 0.0,
            use_potential_energy: false,
            const_grain_count: 0,
            log_transitions: false,
            generate_analysis_files: false,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Config::parse(&text)
    }

    /// Parse configuration text. Lines without a `key = value` shape are
    /// skipped, `#` starts a comment, and unknown keys are warned about
    /// rather than rejected.
    pub fn parse(text: &str) -> Result<Config, ConfigError> {
        let mut config = Config::default();

        for line in text.lines() {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else { continue };
            if key.starts_with('#') {
                continue;
            }
            if tokens.next().is_none() {
                continue;
            }
            let value = tokens.collect::<Vec<_>>().join(" ");
            if value.is_empty() {
                continue;
            }

            match key {
                "INITIAL_STATE_FILE" => config.initial_state_path = value,
                "OUTPUT_FOLDER" => config.output_folder = PathBuf::from(value),
                "IDENTIFIER" => config.identifier = value,
                "CHECKPOINTS" => config.checkpoints = value,
                "PERIODIC_CHECKPOINT_INTERVAL" => {
                    config.checkpoint_interval = parse_value(key, &value)?
                }
                "MAX_TIMESTEP" => config.max_timestep = parse_value(key, &value)?,
                "DEFAULT_MOBILITY" => config.default_mobility = parse_value(key, &value)?,
                "TRANSITIONED_MOBILITY" => {
                    config.transitioned_mobility = parse_value(key, &value)?
                }
                "TRANSITION_INTERVAL" => config.transition_interval = parse_value(key, &value)?,
                "TRANSITION_COUNT" => config.transition_count = parse_value(key, &value)?,
                "PROPAGATION_CHANCE" => config.propagation_chance = parse_value(key, &value)?,
                "PROPAGATION_RATIO" => config.propagation_ratio = parse_value(key, &value)?,
                "USE_POTENTIAL_ENERGY" => config.use_potential_energy = value == "true",
                "SCALE_MULTIPLIER" => config.scale_multiplier = parse_value(key, &value)?,
                "LOG_BOUNDARY_TRANSITIONS" => config.log_transitions = value == "true",
                "CONST_GRAIN_COUNT" => config.const_grain_count = parse_value(key, &value)?,
                "GENERATE_ANALYSIS_FILES" => config.generate_analysis_files = value == "true",
                "RNG_SEED" => config.rng_seed = parse_value(key, &value)?,
                _ => warn!(key, "unknown config key"),
            }
        }

        Ok(config)
    }

    /// The explicit checkpoint list, in file order.
    pub fn checkpoint_list(&self) -> Vec<f64> {
        self.checkpoints
            .split_whitespace()
            .filter_map(|word| word.parse().ok())
            .collect()
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

//! Configuration system for the Bavet network.
//!
//! Load network configuration from TOML or YAML to control self-checking,
//! constraint-match tracking and constraint weights without code changes.
//!
//! # Examples
//!
//! Load configuration from TOML string:
//!
//! ```
//! use bavet_config::{EnvironmentMode, NetworkConfig};
//! use bavet_core::HardSoftScore;
//!
//! let config = NetworkConfig::from_toml_str(r#"
//!     environment_mode = "full_assert"
//!     constraint_match_enabled = true
//!
//!     [constraint_weights]
//!     "scheduling/NoOverlap" = "1hard/0soft"
//! "#).unwrap();
//!
//! assert_eq!(config.environment_mode, EnvironmentMode::FullAssert);
//! let weights = config.parsed_weights::<HardSoftScore>().unwrap();
//! assert_eq!(weights["scheduling/NoOverlap"], HardSoftScore::ONE_HARD);
//! ```
//!
//! Use default config when file is missing:
//!
//! ```
//! use bavet_config::NetworkConfig;
//!
//! let config = NetworkConfig::load("bavet.toml").unwrap_or_default();
//! assert!(!config.environment_mode.is_asserted());
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use bavet_core::{BavetError, ConstraintRef, ParseableScore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for BavetError {
    fn from(err: ConfigError) -> Self {
        BavetError::Config(err.to_string())
    }
}

/// Default capacity reserved for each node's dirty queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Main network configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct NetworkConfig {
    /// Environment mode affecting self-checks.
    #[serde(default)]
    pub environment_mode: EnvironmentMode,

    /// Keep every individual constraint match for score explanation.
    #[serde(default)]
    pub constraint_match_enabled: bool,

    /// Initial capacity of every node's dirty queue.
    #[serde(default = "default_queue_capacity")]
    pub initial_queue_capacity: usize,

    /// Constraint weight overrides, keyed by full constraint name.
    ///
    /// Values use the score's string format, e.g. `"1hard/0soft"`.
    #[serde(default)]
    pub constraint_weights: BTreeMap<String, String>,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            environment_mode: EnvironmentMode::default(),
            constraint_match_enabled: false,
            initial_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            constraint_weights: BTreeMap::new(),
        }
    }
}

impl NetworkConfig {
    /// Creates a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file doesn't exist or contains invalid TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml_file(path)
    }

    /// Loads configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()
    }

    /// Loads configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.initial_queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "initial_queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// Sets the environment mode.
    pub fn with_environment_mode(mut self, mode: EnvironmentMode) -> Self {
        self.environment_mode = mode;
        self
    }

    /// Enables or disables constraint match tracking.
    pub fn with_constraint_match_enabled(mut self, enabled: bool) -> Self {
        self.constraint_match_enabled = enabled;
        self
    }

    /// Overrides the weight of one constraint.
    pub fn with_constraint_weight(
        mut self,
        constraint: impl Into<String>,
        weight: impl Into<String>,
    ) -> Self {
        self.constraint_weights
            .insert(constraint.into(), weight.into());
        self
    }

    /// Parses every configured weight as a score of type `Sc`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first constraint whose
    /// name or weight does not parse. Keys are normalized to the full name
    /// of the parsed [`ConstraintRef`].
    pub fn parsed_weights<Sc: ParseableScore>(&self) -> Result<BTreeMap<String, Sc>, ConfigError> {
        self.constraint_weights
            .iter()
            .map(|(name, raw)| {
                let constraint = ConstraintRef::parse(name).map_err(|e| {
                    ConfigError::Invalid(format!("constraint weight key '{}': {}", name, e))
                })?;
                Sc::parse(raw)
                    .map(|weight| (constraint.full_name(), weight))
                    .map_err(|e| {
                        ConfigError::Invalid(format!("weight of constraint '{}': {}", name, e))
                    })
            })
            .collect()
    }
}

/// Environment mode affecting self-checks.
///
/// Propagation is deterministic in every mode: node state that decides
/// propagation order lives in insertion-ordered maps and sets, so two
/// instances fed the same operations emit the same matches in the same
/// order. The two non-asserting modes therefore behave identically and only
/// the asserting modes add work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentMode {
    /// No self-checks. Accepted for configuration compatibility; behaves
    /// like [`EnvironmentMode::Reproducible`].
    #[default]
    NonReproducible,

    /// No self-checks, deterministic propagation order.
    Reproducible,

    /// Fast assert mode: checks queues and score ledgers after every flush.
    FastAssert,

    /// Full assert mode: additionally recomputes the score from scratch.
    FullAssert,
}

impl EnvironmentMode {
    /// Returns true if any self-check runs after a flush.
    pub fn is_asserted(&self) -> bool {
        matches!(
            self,
            EnvironmentMode::FastAssert | EnvironmentMode::FullAssert
        )
    }

    /// Returns true if the from-scratch score comparison runs after a flush.
    pub fn is_fully_asserted(&self) -> bool {
        matches!(self, EnvironmentMode::FullAssert)
    }
}

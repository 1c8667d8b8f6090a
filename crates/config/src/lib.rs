#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for sempool
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/sempool/config.toml)
//! - Environment variables
//!
//! A configuration file looks like:
//!
//! ```toml
//! [gate]
//! low_divisor = 1
//! high_divisor = 20
//! high_fallback = "wait_high"
//!
//! [[resources]]
//! name = "http"
//! capacity = 100
//! ```

pub mod constants;
pub mod gate;

pub use crate::gate::{GateConfig, HighFallback, ResourceEntry};

use serde::{Deserialize, Serialize};
use sempool_errors::{ConfigError, Error};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub gate: GateConfig,

    /// Registered resources, in registration order
    #[serde(default = "crate::gate::default_resources")]
    pub resources: Vec<ResourceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gate: GateConfig::default(),
            resources: crate::gate::default_resources(),
        }
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("sempool").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        Self::from_toml(&contents)
    }

    /// Parse configuration from a TOML document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML or does not match
    /// the configuration schema.
    pub fn from_toml(contents: &str) -> Result<Self, Error> {
        toml::from_str(contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path).await
        } else {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        // SEMPOOL_LOW_DIVISOR
        if let Ok(value) = std::env::var("SEMPOOL_LOW_DIVISOR") {
            self.gate.low_divisor = parse_env("SEMPOOL_LOW_DIVISOR", value)?;
        }

        // SEMPOOL_HIGH_DIVISOR
        if let Ok(value) = std::env::var("SEMPOOL_HIGH_DIVISOR") {
            self.gate.high_divisor = parse_env("SEMPOOL_HIGH_DIVISOR", value)?;
        }

        // SEMPOOL_HIGH_FALLBACK
        if let Ok(value) = std::env::var("SEMPOOL_HIGH_FALLBACK") {
            self.gate.high_fallback = parse_env("SEMPOOL_HIGH_FALLBACK", value)?;
        }

        // SEMPOOL_CAPTURE_CALL_SITES
        if let Ok(value) = std::env::var("SEMPOOL_CAPTURE_CALL_SITES") {
            self.gate.capture_call_sites = parse_bool("SEMPOOL_CAPTURE_CALL_SITES", value)?;
        }

        // SEMPOOL_SUPPRESS_WARNINGS
        if let Ok(value) = std::env::var("SEMPOOL_SUPPRESS_WARNINGS") {
            self.gate.suppress_warnings = parse_bool("SEMPOOL_SUPPRESS_WARNINGS", value)?;
        }

        // SEMPOOL_CAPACITY_<NAME>
        let mut overrides: Vec<(String, String)> = std::env::vars()
            .filter_map(|(key, value)| {
                key.strip_prefix(constants::CAPACITY_ENV_PREFIX)
                    .filter(|name| !name.is_empty())
                    .map(|name| (name.to_ascii_lowercase(), value))
            })
            .collect();
        overrides.sort();

        for (name, value) in overrides {
            let field = format!("{}{}", constants::CAPACITY_ENV_PREFIX, name.to_uppercase());
            let capacity: usize = parse_env(&field, value)?;
            match self.resources.iter_mut().find(|entry| entry.name == name) {
                Some(entry) => entry.capacity = capacity,
                None => self.resources.push(ResourceEntry::new(name, capacity)),
            }
        }

        Ok(())
    }

    /// Check divisors, capacities and name uniqueness
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), Error> {
        if self.gate.low_divisor == 0 {
            return Err(ConfigError::InvalidDivisor {
                field: "low_divisor".to_string(),
                value: self.gate.low_divisor,
            }
            .into());
        }
        if self.gate.high_divisor == 0 {
            return Err(ConfigError::InvalidDivisor {
                field: "high_divisor".to_string(),
                value: self.gate.high_divisor,
            }
            .into());
        }

        let mut seen = HashSet::new();
        for entry in &self.resources {
            check_capacity(&entry.name, entry.capacity)?;
            if !seen.insert(entry.name.as_str()) {
                return Err(ConfigError::DuplicateResource {
                    name: entry.name.clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Configured capacity of a resource
    #[must_use]
    pub fn capacity_of(&self, name: &str) -> Option<usize> {
        self.resources
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.capacity)
    }
}

/// Check that a resource capacity is at least 1 and fits a tier semaphore
///
/// # Errors
///
/// Returns `ConfigError::InvalidCapacity` when `capacity` is out of range.
pub fn check_capacity(name: &str, capacity: usize) -> Result<(), Error> {
    if capacity == 0 || capacity > constants::MAX_CAPACITY {
        return Err(ConfigError::InvalidCapacity {
            name: name.to_string(),
            capacity,
            max: constants::MAX_CAPACITY,
        }
        .into());
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(field: &str, value: String) -> Result<T, Error> {
    value.parse().map_err(|_| {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()
    })
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}

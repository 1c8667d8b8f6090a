//! Configuration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("resource already registered: {name}")]
    DuplicateResource { name: String },

    #[error("invalid capacity for {name}: {capacity} (must be between 1 and {max})")]
    InvalidCapacity {
        name: String,
        capacity: usize,
        max: usize,
    },

    #[error("invalid {field}: {value} (must be at least 1)")]
    InvalidDivisor { field: String, value: u32 },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Provide a configuration file or rely on the defaults."),
            Self::DuplicateResource { .. } => {
                Some("Each resource name may appear only once in the configuration.")
            }
            Self::InvalidCapacity { .. } | Self::InvalidDivisor { .. } => {
                Some("Capacities and tier divisors must be positive integers within the stated bounds.")
            }
            Self::InvalidValue { .. } | Self::ParseError { .. } => {
                Some("Fix the configuration value and retry the command.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        Some(match self {
            Self::NotFound { .. } => "config.not_found",
            Self::ParseError { .. } => "config.parse",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::DuplicateResource { .. } => "config.duplicate_resource",
            Self::InvalidCapacity { .. } => "config.invalid_capacity",
            Self::InvalidDivisor { .. } => "config.invalid_divisor",
        })
    }
}

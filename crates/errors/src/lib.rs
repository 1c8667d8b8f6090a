#![warn(mismatched_lifetime_syntaxes)]
#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for sempool
//!
//! This crate provides error types organized by domain. Errors raised by
//! user callables never pass through these types: the dispatcher hands them
//! back to the caller untouched.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod gate;

// Re-export all error types at the root
pub use config::ConfigError;
pub use gate::GateError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("gate error: {0}")]
    Gate(#[from] GateError),
}

impl Error {
    /// Whether this error reports an unregistered resource name
    #[must_use]
    pub fn is_unknown_resource(&self) -> bool {
        matches!(self, Self::Gate(GateError::UnknownResource { .. }))
    }
}

/// Result type alias for sempool operations
pub type Result<T> = std::result::Result<T, Error>;

/// Minimal interface for rendering user-facing error information without
/// requiring heavyweight envelopes.
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same operation is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for analytics / structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for Error {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Error::Config(err) => err.user_message(),
            Error::Gate(err) => err.user_message(),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Error::Config(err) => err.user_hint(),
            Error::Gate(err) => err.user_hint(),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Error::Config(err) => err.user_code(),
            Error::Gate(err) => err.user_code(),
        }
    }
}

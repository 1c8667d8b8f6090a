//! CLI error handling

use std::fmt;

use sempool_errors::UserFacingError;

/// CLI-specific error type
#[derive(Debug)]
pub enum CliError {
    /// Configuration or gate error
    Gate(sempool_errors::Error),
    /// Invalid command arguments
    InvalidArguments(String),
    /// Failed to serialize output
    Output(serde_json::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Gate(e) => {
                write!(f, "{}", e.user_message())?;
                if let Some(code) = e.user_code() {
                    write!(f, "\n  Code: {code}")?;
                }
                if let Some(hint) = e.user_hint() {
                    write!(f, "\n  Hint: {hint}")?;
                }
                if e.is_retryable() {
                    write!(f, "\n  Retry: safe to retry this operation.")?;
                }
                Ok(())
            }
            CliError::InvalidArguments(msg) => write!(f, "Invalid arguments: {msg}"),
            CliError::Output(e) => write!(f, "Failed to render output: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Gate(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::InvalidArguments(_) => None,
        }
    }
}

impl From<sempool_errors::Error> for CliError {
    fn from(e: sempool_errors::Error) -> Self {
        CliError::Gate(e)
    }
}

impl From<sempool_errors::ConfigError> for CliError {
    fn from(e: sempool_errors::ConfigError) -> Self {
        CliError::Gate(e.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e)
    }
}

//! Gate and dispatch error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum GateError {
    #[error("unknown resource: {name}")]
    UnknownResource { name: String },

    #[error("gate closed for resource {resource}")]
    Closed { resource: String },
}

impl UserFacingError for GateError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownResource { .. } => {
                Some("Register the resource in the [[resources]] table of the configuration.")
            }
            Self::Closed { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::UnknownResource { .. } => Some("gate.unknown_resource"),
            Self::Closed { .. } => Some("gate.closed"),
        }
    }
}

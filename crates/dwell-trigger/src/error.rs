//! Error types for trigger registration, rendering and dwell resolution

use dwell_template::TemplateError;
use thiserror::Error;

/// Result type for trigger operations
pub type TriggerResult<T> = Result<T, TriggerError>;

/// Errors that reject a trigger registration
#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Invalid trigger configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid template {template:?}: {source}")]
    Template {
        template: String,
        #[source]
        source: RenderError,
    },

    #[error("Failed to render trigger variable {name}: {source}")]
    Variable {
        name: String,
        #[source]
        source: RenderError,
    },
}

/// A template failed to compile or render
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct RenderError {
    pub message: String,
}

impl RenderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<TemplateError> for RenderError {
    fn from(err: TemplateError) -> Self {
        Self::new(err.to_string())
    }
}

/// A dwell specification could not be turned into a duration
#[derive(Debug, Clone, Error)]
pub enum DurationError {
    #[error("failed to render {field}: {source}")]
    Render {
        field: &'static str,
        #[source]
        source: RenderError,
    },

    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("negative duration {0:?}")]
    Negative(String),

    #[error("duration {0:?} is out of range")]
    OutOfRange(String),
}

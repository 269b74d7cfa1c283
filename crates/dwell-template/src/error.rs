//! Error types for template rendering

use thiserror::Error;

/// Result type for template operations
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while compiling or rendering a template
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template does not parse
    #[error("invalid template syntax: {message}")]
    Syntax { message: String },

    /// An undefined value was used where a defined one is required
    #[error("undefined value: {message}")]
    Undefined { message: String },

    /// Anything else that failed while rendering
    #[error("failed to render template: {message}")]
    Render { message: String },
}

impl TemplateError {
    pub fn is_syntax(&self) -> bool {
        matches!(self, TemplateError::Syntax { .. })
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        let message = err.to_string();
        match err.kind() {
            minijinja::ErrorKind::SyntaxError => TemplateError::Syntax { message },
            minijinja::ErrorKind::UndefinedError => TemplateError::Undefined { message },
            _ => TemplateError::Render { message },
        }
    }
}

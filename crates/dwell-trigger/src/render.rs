//! Expression rendering seam
//!
//! The trigger engine never talks to a template language directly. It goes
//! through [`Renderer`], which [`TemplateEngine`] implements.

use crate::config::Variables;
use crate::error::RenderError;
use dwell_template::TemplateEngine;
use std::sync::Arc;

/// Renders template strings against a variable mapping
pub trait Renderer: Send + Sync {
    /// Compile without rendering; fails on syntax errors
    fn validate(&self, template: &str) -> Result<(), RenderError>;

    /// Render a template with the given variables
    fn render(&self, template: &str, variables: &Variables) -> Result<serde_json::Value, RenderError>;

    /// Whether a string needs rendering at all
    fn is_template(&self, text: &str) -> bool {
        has_template_syntax(text)
    }

    /// Whether a template can change value with time alone
    fn references_time(&self, _template: &str) -> bool {
        false
    }
}

pub type SharedRenderer = Arc<dyn Renderer>;

impl Renderer for TemplateEngine {
    fn validate(&self, template: &str) -> Result<(), RenderError> {
        TemplateEngine::validate(self, template).map_err(RenderError::from)
    }

    fn render(&self, template: &str, variables: &Variables) -> Result<serde_json::Value, RenderError> {
        self.render_with_context(template, variables)
            .map(serde_json::Value::String)
            .map_err(RenderError::from)
    }

    fn is_template(&self, text: &str) -> bool {
        TemplateEngine::is_template(text)
    }

    fn references_time(&self, template: &str) -> bool {
        TemplateEngine::references_time(template)
    }
}

/// Whether `text` contains Jinja delimiters
pub(crate) fn has_template_syntax(text: &str) -> bool {
    text.contains("{{") || text.contains("{%") || text.contains("{#")
}

/// Render a value if it is a string containing template syntax
pub(crate) fn render_value(
    renderer: &dyn Renderer,
    value: &serde_json::Value,
    variables: &Variables,
) -> Result<serde_json::Value, RenderError> {
    match value {
        serde_json::Value::String(text) if renderer.is_template(text) => {
            renderer.render(text, variables)
        }
        other => Ok(other.clone()),
    }
}

/// Rendered value as text for parsing
pub(crate) fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

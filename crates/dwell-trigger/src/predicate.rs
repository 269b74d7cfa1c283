//! Predicate evaluation and edge detection

use crate::config::Variables;
use crate::error::RenderError;
use crate::render::SharedRenderer;
use dwell_core::EntityId;
use tracing::error;

/// Map a rendered value to a boolean
///
/// Only boolean `true` and the string `"true"` (any case, surrounding
/// whitespace ignored) are true.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Direction of a predicate change between two evaluations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Unchanged,
}

impl Edge {
    pub fn between(previous: bool, current: bool) -> Self {
        match (previous, current) {
            (false, true) => Edge::Rising,
            (true, false) => Edge::Falling,
            _ => Edge::Unchanged,
        }
    }
}

/// Remembers the last predicate value of one trigger
#[derive(Debug, Clone, Copy, Default)]
pub struct EdgeDetector {
    last: bool,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a value without classifying it
    pub fn baseline(&mut self, value: bool) {
        self.last = value;
    }

    pub fn observe(&mut self, value: bool) -> Edge {
        let edge = Edge::between(self.last, value);
        self.last = value;
        edge
    }

    pub fn last(&self) -> bool {
        self.last
    }
}

/// Renders one predicate template and classifies the result
#[derive(Clone)]
pub struct PredicateEvaluator {
    template: String,
    renderer: SharedRenderer,
}

impl PredicateEvaluator {
    pub fn new(template: impl Into<String>, renderer: SharedRenderer) -> Self {
        Self {
            template: template.into(),
            renderer,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn try_evaluate(&self, variables: &Variables) -> Result<bool, RenderError> {
        self.renderer
            .render(&self.template, variables)
            .map(|value| is_truthy(&value))
    }

    /// Evaluate, treating a render failure as false
    pub fn evaluate(&self, variables: &Variables, entity_id: Option<&EntityId>) -> bool {
        match self.try_evaluate(variables) {
            Ok(result) => result,
            Err(e) => {
                error!(
                    entity_id = entity_id.map(tracing::field::display),
                    template = %self.template,
                    error = %e,
                    "Error evaluating template trigger"
                );
                false
            }
        }
    }
}

impl std::fmt::Debug for PredicateEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateEvaluator")
            .field("template", &self.template)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;
    use serde_json::json;
    use std::sync::Arc;

    /// Renders the template text itself, or fails when it says so
    struct EchoRenderer;

    impl Renderer for EchoRenderer {
        fn validate(&self, _template: &str) -> Result<(), RenderError> {
            Ok(())
        }

        fn render(&self, template: &str, _variables: &Variables) -> Result<serde_json::Value, RenderError> {
            if template == "fail" {
                Err(RenderError::new("boom"))
            } else {
                Ok(json!(template))
            }
        }
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("true")));
        assert!(is_truthy(&json!("  TrUe \n")));

        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!("false")));
        assert!(!is_truthy(&json!("yes")));
        assert!(!is_truthy(&json!("on")));
        assert!(!is_truthy(&json!(1)));
        assert!(!is_truthy(&json!([true])));
        assert!(!is_truthy(&json!({"a": true})));
        assert!(!is_truthy(&serde_json::Value::Null));
    }

    #[test]
    fn test_edge_between() {
        assert_eq!(Edge::between(false, true), Edge::Rising);
        assert_eq!(Edge::between(true, false), Edge::Falling);
        assert_eq!(Edge::between(true, true), Edge::Unchanged);
        assert_eq!(Edge::between(false, false), Edge::Unchanged);
    }

    #[test]
    fn test_detector_baseline_is_not_an_edge() {
        let mut detector = EdgeDetector::new();
        detector.baseline(true);
        assert_eq!(detector.observe(true), Edge::Unchanged);
        assert_eq!(detector.observe(false), Edge::Falling);
        assert_eq!(detector.observe(true), Edge::Rising);
        assert!(detector.last());
    }

    #[test]
    fn test_render_failure_is_false() {
        let renderer: SharedRenderer = Arc::new(EchoRenderer);
        let evaluator = PredicateEvaluator::new("fail", renderer.clone());
        assert!(evaluator.try_evaluate(&Variables::new()).is_err());
        assert!(!evaluator.evaluate(&Variables::new(), None));

        let evaluator = PredicateEvaluator::new("True", renderer);
        assert!(evaluator.evaluate(&Variables::new(), None));
    }
}

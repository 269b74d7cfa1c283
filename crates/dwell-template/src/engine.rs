//! Template environment wired to a state store and a clock

use crate::error::TemplateResult;
use crate::filters;
use crate::globals::{self, DateTimeWrapper};
use crate::states::{self, StatesObject};
use dwell_core::SharedClock;
use dwell_state_store::StateStore;
use minijinja::{Environment, Value};
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Template engine with the Home Assistant vocabulary needed by triggers
///
/// The engine provides:
/// - Access to entity states via the `states` object
/// - `now()` and `utcnow()` read from the injected clock
/// - State functions like `is_state()`, `state_attr()`, `has_value()`
/// - Lenient `int`, `float`, `bool` and `round` filters
pub struct TemplateEngine {
    env: Environment<'static>,
    states: Arc<StatesObject>,
}

impl TemplateEngine {
    pub fn new(store: Arc<StateStore>, clock: SharedClock) -> Self {
        let states = Arc::new(StatesObject::new(store));
        let mut env = Environment::new();
        env.set_debug(true);

        Self::register_filters(&mut env);
        Self::register_globals(&mut env, states.clone(), clock);
        Self::register_tests(&mut env);

        Self { env, states }
    }

    fn register_filters(env: &mut Environment<'static>) {
        env.add_filter("float", filters::to_float);
        env.add_filter("int", filters::to_int);
        env.add_filter("bool", filters::to_bool);
        env.add_filter("round", filters::round_filter);
        env.add_filter("regex_match", filters::regex_match);
        env.add_filter("regex_search", filters::regex_search);
        env.add_filter("as_timestamp", globals::as_timestamp);
    }

    fn register_globals(env: &mut Environment<'static>, states: Arc<StatesObject>, clock: SharedClock) {
        env.add_global("states", Value::from_object((*states).clone()));

        let utc_clock = clock.clone();
        env.add_function("utcnow", move || DateTimeWrapper::value(utc_clock.now()));
        // No timezone configuration, local time is UTC
        env.add_function("now", move || DateTimeWrapper::value(clock.now()));

        env.add_function("as_timestamp", globals::as_timestamp);
        env.add_function("iif", globals::iif);

        let s = states.clone();
        env.add_function("is_state", move |entity_id: &str, state: Value| {
            states::is_state_fn(&s, entity_id, state)
        });

        let s = states.clone();
        env.add_function("state_attr", move |entity_id: &str, attribute: &str| {
            s.state_attr(entity_id, attribute)
        });

        let s = states.clone();
        env.add_function(
            "is_state_attr",
            move |entity_id: &str, attribute: &str, value: Value| {
                states::is_state_attr_fn(&s, entity_id, attribute, value)
            },
        );

        env.add_function("has_value", move |entity_id: &str| states.has_value(entity_id));
    }

    fn register_tests(env: &mut Environment<'static>) {
        env.add_test("number", filters::is_number);
    }

    /// Render a template string
    pub fn render(&self, template: &str) -> TemplateResult<String> {
        self.render_with_context(template, ())
    }

    /// Render a template with additional context variables
    pub fn render_with_context(
        &self,
        template: &str,
        context: impl serde::Serialize,
    ) -> TemplateResult<String> {
        trace!(template, "rendering template");
        let tmpl = self.env.template_from_str(template)?;
        Ok(tmpl.render(context)?)
    }

    /// Compile a template without rendering it
    pub fn validate(&self, template: &str) -> TemplateResult<()> {
        self.env.template_from_str(template)?;
        Ok(())
    }

    /// Whether a string contains template syntax
    pub fn is_template(template: &str) -> bool {
        template.contains("{{") || template.contains("{%") || template.contains("{#")
    }

    /// Whether a template reads the current time
    ///
    /// Such templates can change value without any entity changing, so
    /// they need re-rendering on every time tick.
    pub fn references_time(template: &str) -> bool {
        static NOW_CALL: OnceLock<Option<Regex>> = OnceLock::new();
        NOW_CALL
            .get_or_init(|| Regex::new(r"\b(utc)?now\s*\(").ok())
            .as_ref()
            .is_some_and(|re| re.is_match(template))
    }

    pub fn states(&self) -> &StatesObject {
        &self.states
    }
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine").finish_non_exhaustive()
    }
}

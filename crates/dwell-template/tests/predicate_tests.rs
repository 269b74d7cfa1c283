//! Rendering of the kind of templates used as trigger predicates and dwell durations

use chrono::TimeZone;
use dwell_core::{Context, EntityId, ManualClock};
use dwell_event_bus::EventBus;
use dwell_state_store::StateStore;
use dwell_template::TemplateEngine;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn setup() -> (TemplateEngine, Arc<StateStore>) {
    let clock = Arc::new(ManualClock::at(
        chrono::Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    ));
    let bus = Arc::new(EventBus::new());
    let store = Arc::new(StateStore::new(bus, clock.clone()));

    store.set(
        EntityId::new("sensor", "temperature").unwrap(),
        "23.5",
        HashMap::from([("unit_of_measurement".to_string(), json!("°C"))]),
        Context::new(),
    );
    store.set(
        EntityId::new("test", "entity").unwrap(),
        "hello",
        HashMap::new(),
        Context::new(),
    );

    (TemplateEngine::new(store.clone(), clock), store)
}

#[test]
fn test_numeric_threshold() {
    let (engine, store) = setup();
    let template = "{{ states('sensor.temperature') | float > 25 }}";
    assert_eq!(engine.render(template).unwrap(), "false");

    store.set(
        EntityId::new("sensor", "temperature").unwrap(),
        "26.1",
        HashMap::new(),
        Context::new(),
    );
    assert_eq!(engine.render(template).unwrap(), "true");
}

#[test]
fn test_boolean_renders_as_python_style_text() {
    let (engine, _) = setup();
    assert_eq!(engine.render("{{ true }}").unwrap(), "true");
    assert_eq!(engine.render("{{ 'world' == 'world' }}").unwrap(), "true");
    assert_eq!(
        engine
            .render("{{ is_state('test.entity', 'world') }}")
            .unwrap(),
        "false"
    );
}

#[test]
fn test_statement_template() {
    let (engine, _) = setup();
    let template = "{% if states.test.entity.state == 'hello' %}true{% endif %}";
    assert_eq!(engine.render(template).unwrap(), "true");
}

#[test]
fn test_division_by_zero_is_not_true() {
    let (engine, _) = setup();
    let rendered = engine.render("{{ 84 / 0 }}");
    assert!(rendered.map_or(true, |text| text != "true"));
}

#[test]
fn test_duration_expressions() {
    let (engine, _) = setup();
    assert_eq!(engine.render("{{ 5 }}").unwrap(), "5");
    assert_eq!(
        engine
            .render_with_context("{{ seconds }}", json!({"seconds": 5}))
            .unwrap(),
        "5"
    );
    assert_eq!(engine.render("{{ '0:00:05' }}").unwrap(), "0:00:05");
}

#[test]
fn test_int_filter_with_default() {
    let (engine, _) = setup();
    assert_eq!(engine.render("{{ 'abc' | int(3) }}").unwrap(), "3");
    assert_eq!(engine.render("{{ states('sensor.missing') | int(0) }}").unwrap(), "0");
}

#[test]
fn test_syntax_error_fails_validation() {
    let (engine, _) = setup();
    assert!(engine.validate("{{ states('test.entity') ").is_err());
}

#[test]
fn test_round_and_number_test() {
    let (engine, _) = setup();
    assert_eq!(
        engine
            .render("{{ states('sensor.temperature') | float | round(0) }}")
            .unwrap(),
        "24.0"
    );
    assert_eq!(
        engine
            .render("{{ states('sensor.temperature') is number }}")
            .unwrap(),
        "true"
    );
}

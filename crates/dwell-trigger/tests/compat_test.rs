//! Config shapes accepted from YAML and JSON automation files

use dwell_trigger::{DurationComponents, DurationField, ForSpec, TriggerConfig};
use serde_json::json;

fn parse_yaml(yaml: &str) -> TriggerConfig {
    serde_yaml::from_str(yaml).unwrap()
}

#[test]
fn test_yaml_trigger_list() {
    let triggers: Vec<TriggerConfig> = serde_yaml::from_str(
        r#"
- platform: template
  value_template: "{{ is_state('binary_sensor.door', 'on') }}"
- trigger: template
  id: door_open_long
  value_template: "{{ is_state('binary_sensor.door', 'on') }}"
  for:
    minutes: 5
- value_template: "{{ states('sensor.temp') | float > 25 }}"
  for: "00:00:{{ delay }}"
  variables:
    delay: 30
"#,
    )
    .unwrap();

    assert_eq!(triggers.len(), 3);
    assert!(triggers.iter().all(|t| t.platform == "template"));
    assert!(triggers.iter().all(|t| t.validate().is_ok()));

    assert_eq!(triggers[1].id.as_deref(), Some("door_open_long"));
    assert_eq!(
        triggers[1].r#for,
        Some(ForSpec::Components(DurationComponents {
            minutes: Some(DurationField::Number(5.0)),
            ..Default::default()
        }))
    );

    assert_eq!(
        triggers[2].r#for,
        Some(ForSpec::Text("00:00:{{ delay }}".to_string()))
    );
    assert_eq!(triggers[2].trigger_variables["delay"], json!(30));
}

#[test]
fn test_yaml_unquoted_clock_time_is_text() {
    let config = parse_yaml(
        r#"
value_template: "{{ true }}"
for: 00:00:05
"#,
    );
    assert_eq!(config.r#for, Some(ForSpec::Text("00:00:05".to_string())));
}

#[test]
fn test_yaml_templated_components() {
    let config = parse_yaml(
        r#"
value_template: "{{ true }}"
for:
  hours: 1
  seconds: "{{ states('input_number.delay') }}"
  milliseconds: 250.5
"#,
    );
    let Some(ForSpec::Components(components)) = &config.r#for else {
        panic!("expected components, got {:?}", config.r#for);
    };
    assert_eq!(components.hours, Some(DurationField::Number(1.0)));
    assert_eq!(
        components.seconds,
        Some(DurationField::Template(
            "{{ states('input_number.delay') }}".to_string()
        ))
    );
    assert_eq!(components.milliseconds, Some(DurationField::Number(250.5)));
    assert_eq!(
        config.r#for.as_ref().unwrap().templates(),
        vec!["{{ states('input_number.delay') }}"]
    );
}

#[test]
fn test_json_numeric_for() {
    let config: TriggerConfig = serde_json::from_value(json!({
        "platform": "template",
        "value_template": "{{ true }}",
        "for": 2.5
    }))
    .unwrap();
    assert_eq!(config.r#for, Some(ForSpec::Seconds(2.5)));
}

#[test]
fn test_unknown_keys_rejected() {
    let result: Result<TriggerConfig, _> = serde_yaml::from_str(
        r#"
value_template: "{{ true }}"
entity_id: light.kitchen
"#,
    );
    assert!(result.is_err());

    let result: Result<TriggerConfig, _> = serde_yaml::from_str(
        r#"
value_template: "{{ true }}"
for:
  weeks: 1
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_missing_value_template_rejected() {
    let result: Result<TriggerConfig, _> = serde_yaml::from_str("platform: template\nid: x\n");
    assert!(result.is_err());
}

#[test]
fn test_structurally_invalid_configs() {
    let cases = [
        json!({"value_template": "   "}),
        json!({"value_template": "{{ true }}", "for": -1}),
        json!({"value_template": "{{ true }}", "for": ""}),
        json!({"value_template": "{{ true }}", "for": {}}),
        json!({"platform": "numeric_state", "value_template": "{{ true }}"}),
    ];

    for case in cases {
        let config: TriggerConfig = serde_json::from_value(case.clone()).unwrap();
        assert!(config.validate().is_err(), "{case} should be rejected");
    }
}

#[test]
fn test_serialize_round_trip_keeps_for_key() {
    let config = TriggerConfig::new("{{ true }}")
        .with_id("t1")
        .with_for(DurationComponents::seconds("{{ 5 }}"));
    let value = serde_json::to_value(&config).unwrap();

    assert_eq!(value["for"], json!({"seconds": "{{ 5 }}"}));
    assert!(value.get("trigger_variables").is_none());

    let back: TriggerConfig = serde_json::from_value(value).unwrap();
    assert_eq!(back, config);
}

//! Template trigger configuration
//!
//! Accepts the same shapes as a Home Assistant template trigger:
//!
//! ```yaml
//! platform: template
//! id: door_open_long
//! value_template: "{{ is_state('binary_sensor.door', 'on') }}"
//! for:
//!   minutes: "{{ delay }}"
//! trigger_variables:
//!   delay: 5
//! ```

use crate::duration;
use crate::error::{TriggerError, TriggerResult};
use serde::{Deserialize, Serialize};

/// Variable mapping passed to templates
pub type Variables = serde_json::Map<String, serde_json::Value>;

pub const PLATFORM: &str = "template";

fn default_platform() -> String {
    PLATFORM.to_string()
}

/// Configuration of one template trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerConfig {
    #[serde(alias = "trigger", default = "default_platform")]
    pub platform: String,

    /// Optional trigger ID copied into every invocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Predicate rendered on every state change
    pub value_template: String,

    /// How long the predicate must stay true before firing
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub r#for: Option<ForSpec>,

    /// Variables merged into the template context
    #[serde(alias = "variables", default, skip_serializing_if = "Variables::is_empty")]
    pub trigger_variables: Variables,
}

impl TriggerConfig {
    pub fn new(value_template: impl Into<String>) -> Self {
        Self {
            platform: default_platform(),
            id: None,
            value_template: value_template.into(),
            r#for: None,
            trigger_variables: Variables::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_for(mut self, spec: impl Into<ForSpec>) -> Self {
        self.r#for = Some(spec.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.trigger_variables.insert(name.into(), value.into());
        self
    }

    /// Structural checks that need no renderer
    pub fn validate(&self) -> TriggerResult<()> {
        if self.platform != PLATFORM {
            return Err(TriggerError::InvalidConfig(format!(
                "unsupported platform {:?}, expected {PLATFORM:?}",
                self.platform
            )));
        }

        if self.value_template.trim().is_empty() {
            return Err(TriggerError::InvalidConfig(
                "value_template must not be empty".to_string(),
            ));
        }

        if let Some(spec) = &self.r#for {
            spec.validate()?;
        }

        Ok(())
    }
}

/// Dwell specification
///
/// Fixed values are checked at registration; anything containing a template
/// is resolved each time the predicate turns true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ForSpec {
    /// Seconds, integer or fractional
    Seconds(f64),

    /// `H:MM:SS`-style text, possibly containing template fragments
    Text(String),

    /// Structured unit mapping
    Components(DurationComponents),
}

impl ForSpec {
    fn validate(&self) -> TriggerResult<()> {
        if let ForSpec::Components(components) = self {
            if components.is_empty() {
                return Err(TriggerError::InvalidConfig(
                    "for mapping needs at least one unit".to_string(),
                ));
            }
        }
        duration::check_fixed(self)
            .map_err(|e| TriggerError::InvalidConfig(format!("invalid for: {e}")))
    }

    /// Every template string this dwell renders
    pub fn templates(&self) -> Vec<&str> {
        match self {
            ForSpec::Seconds(_) => Vec::new(),
            ForSpec::Text(text) => vec![text.as_str()],
            ForSpec::Components(components) => components
                .fields()
                .into_iter()
                .filter_map(|(_, field)| match field {
                    DurationField::Template(t) => Some(t.as_str()),
                    DurationField::Number(_) => None,
                })
                .collect(),
        }
    }
}

impl From<std::time::Duration> for ForSpec {
    fn from(duration: std::time::Duration) -> Self {
        ForSpec::Seconds(duration.as_secs_f64())
    }
}

impl From<&str> for ForSpec {
    fn from(text: &str) -> Self {
        ForSpec::Text(text.to_string())
    }
}

impl From<DurationComponents> for ForSpec {
    fn from(components: DurationComponents) -> Self {
        ForSpec::Components(components)
    }
}

/// `{days, hours, minutes, seconds, milliseconds}` with each unit a number or template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DurationComponents {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<DurationField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<DurationField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<DurationField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<DurationField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub milliseconds: Option<DurationField>,
}

impl DurationComponents {
    pub fn seconds(value: impl Into<DurationField>) -> Self {
        Self {
            seconds: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Present units with their length in seconds
    pub(crate) fn fields(&self) -> Vec<(&'static str, &DurationField)> {
        [
            ("days", &self.days),
            ("hours", &self.hours),
            ("minutes", &self.minutes),
            ("seconds", &self.seconds),
            ("milliseconds", &self.milliseconds),
        ]
        .into_iter()
        .filter_map(|(name, field)| field.as_ref().map(|f| (name, f)))
        .collect()
    }
}

/// One unit of a [`DurationComponents`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationField {
    Number(f64),
    Template(String),
}

impl From<f64> for DurationField {
    fn from(value: f64) -> Self {
        DurationField::Number(value)
    }
}

impl From<u32> for DurationField {
    fn from(value: u32) -> Self {
        DurationField::Number(f64::from(value))
    }
}

impl From<&str> for DurationField {
    fn from(value: &str) -> Self {
        DurationField::Template(value.to_string())
    }
}

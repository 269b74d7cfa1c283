//! Runner configuration file
//!
//! ```yaml
//! max_level: debug
//! tick_interval: 1
//! initial_states:
//!   binary_sensor.door: "off"
//!   sensor.temp:
//!     state: "21.5"
//!     attributes:
//!       unit_of_measurement: "°C"
//! triggers:
//!   - id: door_open_long
//!     value_template: "{{ is_state('binary_sensor.door', 'on') }}"
//!     for: "00:05:00"
//! ```

use anyhow::{bail, Context as _, Result};
use dwell_trigger::{RuntimeConfig, TriggerConfig};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,

    /// States written to the store before any trigger is registered
    #[serde(default)]
    pub initial_states: BTreeMap<String, InitialState>,

    /// Buffered registration commands for the trigger runtime
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Seconds between re-renders of time-dependent templates
    #[serde(default = "default_tick_interval")]
    pub tick_interval: f64,

    /// Log filter used when `RUST_LOG` is not set
    #[serde(default = "default_max_level")]
    pub max_level: String,
}

fn default_channel_capacity() -> usize {
    RuntimeConfig::default().command_capacity
}

fn default_tick_interval() -> f64 {
    RuntimeConfig::default().tick_interval.as_secs_f64()
}

fn default_max_level() -> String {
    "info".to_string()
}

/// Either a bare state or a state with attributes
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InitialState {
    State(String),
    Full {
        state: String,
        #[serde(default)]
        attributes: BTreeMap<String, serde_json::Value>,
    },
}

impl InitialState {
    pub fn state(&self) -> &str {
        match self {
            InitialState::State(state) | InitialState::Full { state, .. } => state,
        }
    }

    pub fn attributes(&self) -> dwell_state_store::Attributes {
        match self {
            InitialState::State(_) => Default::default(),
            InitialState::Full { attributes, .. } => attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

impl RunnerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("loading {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: RunnerConfig = serde_yaml::from_str(content).context("parsing YAML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !self.tick_interval.is_finite() || self.tick_interval <= 0.0 {
            bail!("tick_interval must be a positive number of seconds");
        }
        for (index, trigger) in self.triggers.iter().enumerate() {
            trigger
                .validate()
                .with_context(|| format!("trigger {index}"))?;
        }
        Ok(())
    }

    pub fn runtime(&self) -> RuntimeConfig {
        RuntimeConfig {
            command_capacity: self.channel_capacity,
            tick_interval: Duration::from_secs_f64(self.tick_interval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
max_level: debug
tick_interval: 0.5
initial_states:
  binary_sensor.door: "off"
  sensor.temp:
    state: "21.5"
    attributes:
      unit: C
triggers:
  - id: door_open_long
    value_template: "{{{{ is_state('binary_sensor.door', 'on') }}}}"
    for: "00:05:00"
"#
        )
        .unwrap();

        let config = RunnerConfig::load(file.path()).unwrap();
        assert_eq!(config.max_level, "debug");
        assert_eq!(config.triggers.len(), 1);
        assert_eq!(config.triggers[0].id.as_deref(), Some("door_open_long"));
        assert_eq!(config.initial_states["binary_sensor.door"].state(), "off");

        let temp = &config.initial_states["sensor.temp"];
        assert_eq!(temp.state(), "21.5");
        assert_eq!(temp.attributes()["unit"], "C");

        let runtime = config.runtime();
        assert_eq!(runtime.tick_interval, Duration::from_millis(500));
        assert_eq!(runtime.command_capacity, 32);
    }

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::from_yaml("{}").unwrap();
        assert!(config.triggers.is_empty());
        assert_eq!(config.max_level, "info");
        assert_eq!(config.runtime().tick_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_trigger_rejected() {
        let err = RunnerConfig::from_yaml(
            r#"
triggers:
  - value_template: "{{ true }}"
    for: -5
"#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("trigger 0"));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunnerConfig::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }

    #[test]
    fn test_zero_tick_rejected() {
        assert!(RunnerConfig::from_yaml("tick_interval: 0").is_err());
    }
}

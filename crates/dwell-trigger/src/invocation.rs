//! What a fired trigger hands to its action

use crate::config::{Variables, PLATFORM};
use chrono::{DateTime, Utc};
use dwell_core::{Context, EntityId, State};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// The change that produced a predicate edge
///
/// Time-driven re-evaluations have no entity and no states.
#[derive(Debug, Clone)]
pub struct TriggerCause {
    pub entity_id: Option<EntityId>,
    pub from_state: Option<State>,
    pub to_state: Option<State>,
    pub context: Context,
}

impl TriggerCause {
    pub fn state_change(
        entity_id: EntityId,
        from_state: Option<State>,
        to_state: Option<State>,
        context: Context,
    ) -> Self {
        Self {
            entity_id: Some(entity_id),
            from_state,
            to_state,
            context,
        }
    }

    pub fn time_change() -> Self {
        Self {
            entity_id: None,
            from_state: None,
            to_state: None,
            context: Context::new(),
        }
    }

    pub fn description(&self) -> String {
        match &self.entity_id {
            Some(entity_id) => format!("{entity_id} via template"),
            None => "time change or manual update via template".to_string(),
        }
    }

    /// `trigger` variable seen by dwell templates
    pub fn to_variable(&self) -> serde_json::Value {
        serde_json::json!({
            "platform": PLATFORM,
            "entity_id": self.entity_id,
            "from_state": self.from_state,
            "to_state": self.to_state,
        })
    }
}

/// Payload passed to the action when a trigger fires
#[derive(Debug, Clone, Serialize)]
pub struct TriggerInvocation {
    pub platform: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub entity_id: Option<EntityId>,
    pub from_state: Option<State>,
    pub to_state: Option<State>,

    /// Dwell that elapsed before firing; `None` when no `for` was configured
    #[serde(rename = "for", serialize_with = "serialize_for")]
    pub r#for: Option<Duration>,

    pub description: String,
    pub fired_at: DateTime<Utc>,

    /// Context of the change that caused the fire
    pub context: Context,
}

impl TriggerInvocation {
    pub(crate) fn new(
        id: Option<String>,
        cause: TriggerCause,
        r#for: Option<Duration>,
        fired_at: DateTime<Utc>,
    ) -> Self {
        Self {
            platform: PLATFORM,
            id,
            description: cause.description(),
            entity_id: cause.entity_id,
            from_state: cause.from_state,
            to_state: cause.to_state,
            r#for,
            fired_at,
            context: cause.context,
        }
    }

    /// Context for whatever the trigger starts, parented to the cause
    pub fn action_context(&self) -> Context {
        self.context.child()
    }

    /// `for` as displayed to templates, e.g. `0:00:05`
    pub fn for_display(&self) -> Option<String> {
        self.r#for.map(format_duration)
    }

    /// The invocation as a `trigger` template variable
    pub fn to_variables(&self) -> Variables {
        let mut variables = Variables::new();
        if let Ok(value) = serde_json::to_value(self) {
            variables.insert("trigger".to_string(), value);
        }
        variables
    }
}

fn serialize_for<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_str(&format_duration(*d)),
        None => serializer.serialize_none(),
    }
}

/// Format a duration the way Python prints a timedelta
///
/// `0:00:05`, `1:30:00`, `2 days, 0:00:00`, `0:00:01.500000`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    let micros = duration.subsec_micros();

    let mut out = match days {
        0 => String::new(),
        1 => "1 day, ".to_string(),
        n => format!("{n} days, "),
    };
    out.push_str(&format!("{hours}:{minutes:02}:{seconds:02}"));
    if micros > 0 {
        out.push_str(&format!(".{micros:06}"));
    }
    out
}

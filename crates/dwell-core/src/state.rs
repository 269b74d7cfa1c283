//! Snapshot of an entity's state

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId};

/// An entity's state at a point in time
///
/// States are immutable once observed. A change produces a new `State` via
/// [`State::updated`], which keeps `last_changed` when only the attributes or
/// the context moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    pub entity_id: EntityId,

    /// Opaque state value (e.g. "on", "23.5", "world")
    pub state: String,

    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the state value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state or attributes were last written
    pub last_updated: DateTime<Utc>,

    /// Context of the change that produced this state
    pub context: Context,
}

impl State {
    /// Create the first state of an entity, observed at `now`
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Derive the next state from this one
    pub fn updated(
        &self,
        new_state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
        now: DateTime<Utc>,
    ) -> Self {
        let new_state = new_state.into();
        let last_changed = if self.state == new_state {
            self.last_changed
        } else {
            now
        };

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes,
            last_changed,
            last_updated: now,
            context,
        }
    }

    /// Whether `state` and `attributes` match, ignoring timestamps and context
    pub fn same_value(&self, state: &str, attributes: &HashMap<String, serde_json::Value>) -> bool {
        self.state == state && &self.attributes == attributes
    }

    pub fn is_unavailable(&self) -> bool {
        self.state == "unavailable"
    }

    pub fn is_unknown(&self) -> bool {
        self.state == "unknown"
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

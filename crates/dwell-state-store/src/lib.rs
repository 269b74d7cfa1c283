//! Entity state storage for dwell
//!
//! The StateStore holds the current state of every entity and publishes a
//! `state_changed` event on the bus whenever one of them is written with a new
//! value. Timestamps come from the injected clock, so a simulated clock
//! produces simulated `last_changed` values.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use dwell_core::events::StateChangedData;
use dwell_core::{Context, EntityId, SharedClock, State};
use dwell_event_bus::EventBus;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

/// Attribute mapping of a state
pub type Attributes = HashMap<String, serde_json::Value>;

/// Current state of all entities
pub struct StateStore {
    /// Entity states keyed by entity_id string
    states: DashMap<String, State>,
    /// Entity ids grouped by domain
    domain_index: DashMap<String, Vec<String>>,
    event_bus: Arc<EventBus>,
    clock: SharedClock,
}

impl StateStore {
    pub fn new(event_bus: Arc<EventBus>, clock: SharedClock) -> Self {
        Self {
            states: DashMap::new(),
            domain_index: DashMap::new(),
            event_bus,
            clock,
        }
    }

    /// Set the state of an entity
    ///
    /// Writing the value and attributes an entity already has is a no-op;
    /// use [`StateStore::set_with`] with `force_update` to publish anyway.
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
        context: Context,
    ) -> State {
        self.set_with(entity_id, state, attributes, context, false)
    }

    /// Set the state of an entity, optionally publishing an unchanged value
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set_with(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: Attributes,
        context: Context,
        force_update: bool,
    ) -> State {
        let key = entity_id.to_string();
        let state = state.into();
        let now = self.clock.now();

        // The entry guard keeps the read, the write and the publish for one
        // entity in a single critical section
        let entry = self.states.entry(key.clone());
        let old_state = match &entry {
            Entry::Occupied(occupied) => Some(occupied.get().clone()),
            Entry::Vacant(_) => None,
        };

        if let Some(existing) = &old_state {
            if !force_update && existing.same_value(&state, &attributes) {
                trace!("State unchanged, not publishing");
                return existing.clone();
            }
        }

        let new_state = match &old_state {
            Some(existing) => existing.updated(state, attributes, context.clone(), now),
            None => State::new(entity_id.clone(), state, attributes, context.clone(), now),
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map_or(true, |s| s.state != new_state.state),
            "Setting entity state"
        );

        let _written = match entry {
            Entry::Occupied(mut occupied) => {
                occupied.insert(new_state.clone());
                occupied.into_ref()
            }
            Entry::Vacant(vacant) => {
                self.domain_index
                    .entry(entity_id.domain().to_string())
                    .or_default()
                    .push(key);
                vacant.insert(new_state.clone())
            }
        };

        self.event_bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            },
            context,
        );

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// The state value, or None if the entity doesn't exist
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get_state(entity_id).as_deref() == Some(state)
    }

    /// All entity ids in a domain
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        self.domain_index
            .get(domain)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// All states in a domain
    pub fn domain_states(&self, domain: &str) -> Vec<State> {
        self.entity_ids(domain)
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// Remove an entity, publishing a change with no new state
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let key = entity_id.to_string();
        let old_state = self.states.remove(&key).map(|(_, s)| s)?;

        trace!("Removing entity state");
        if let Some(mut ids) = self.domain_index.get_mut(entity_id.domain()) {
            ids.retain(|id| id != &key);
        }

        self.event_bus.fire_typed(
            StateChangedData {
                entity_id: entity_id.clone(),
                old_state: Some(old_state.clone()),
                new_state: None,
            },
            context,
        );

        Some(old_state)
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

/// Thread-safe wrapper for StateStore
pub type SharedStateStore = Arc<StateStore>;

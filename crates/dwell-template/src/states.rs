//! The `states` object and state helper functions exposed to templates

use dwell_core::State;
use dwell_state_store::StateStore;
use minijinja::value::{Object, ObjectRepr, Value};
use minijinja::{Error, ErrorKind};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only view of the state store for templates
///
/// Reachable as:
/// - `states('entity_id')` - state value as string
/// - `states.domain.object_id` - full state object
/// - `states['domain.object_id']` - full state object
/// - `states.domain()` - all states of a domain
#[derive(Clone)]
pub struct StatesObject {
    store: Arc<StateStore>,
}

impl std::fmt::Debug for StatesObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatesObject").finish_non_exhaustive()
    }
}

impl StatesObject {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.store.get_state(entity_id)
    }

    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.store.is_state(entity_id, state)
    }

    /// Attribute value, undefined when the entity or attribute is missing
    pub fn state_attr(&self, entity_id: &str, attribute: &str) -> Value {
        self.store
            .get(entity_id)
            .and_then(|s| s.attributes.get(attribute).cloned())
            .map(json_to_value)
            .unwrap_or(Value::UNDEFINED)
    }

    /// Entity exists and is neither unknown nor unavailable
    pub fn has_value(&self, entity_id: &str) -> bool {
        self.store
            .get(entity_id)
            .is_some_and(|s| !s.is_unavailable() && !s.is_unknown())
    }
}

impl Object for StatesObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;

        if key.contains('.') {
            return self.store.get(key).map(state_to_value);
        }

        Some(Value::from_object(DomainProxy {
            domain: key.to_string(),
            store: self.store.clone(),
        }))
    }

    fn call(self: &Arc<Self>, _state: &minijinja::State, args: &[Value]) -> Result<Value, Error> {
        let entity_id = args.first().and_then(|v| v.as_str()).ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "states() requires an entity_id")
        })?;

        // Missing entities read as "unknown", like the original states()
        Ok(Value::from(
            self.get_state(entity_id)
                .unwrap_or_else(|| "unknown".to_string()),
        ))
    }
}

/// `states.<domain>` proxy resolving `states.<domain>.<object_id>`
#[derive(Clone)]
struct DomainProxy {
    domain: String,
    store: Arc<StateStore>,
}

impl std::fmt::Debug for DomainProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainProxy")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

impl Object for DomainProxy {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let entity_id = format!("{}.{}", self.domain, key.as_str()?);
        self.store.get(&entity_id).map(state_to_value)
    }

    fn call(self: &Arc<Self>, _state: &minijinja::State, _args: &[Value]) -> Result<Value, Error> {
        let states: Vec<Value> = self
            .store
            .domain_states(&self.domain)
            .into_iter()
            .map(state_to_value)
            .collect();
        Ok(Value::from(states))
    }
}

fn state_to_value(state: State) -> Value {
    Value::from_object(StateWrapper(state))
}

/// A State as seen from a template
#[derive(Debug, Clone)]
pub struct StateWrapper(pub State);

impl Object for StateWrapper {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        match key.as_str()? {
            "state" => Some(Value::from(self.0.state.as_str())),
            "entity_id" => Some(Value::from(self.0.entity_id.to_string())),
            "domain" => Some(Value::from(self.0.entity_id.domain())),
            "object_id" => Some(Value::from(self.0.entity_id.object_id())),
            "last_changed" => Some(Value::from(self.0.last_changed.to_rfc3339())),
            "last_updated" => Some(Value::from(self.0.last_updated.to_rfc3339())),
            "context" => Some(Value::from(self.0.context.id.as_str())),
            "attributes" => {
                let attrs: BTreeMap<String, Value> = self
                    .0
                    .attributes
                    .iter()
                    .map(|(k, v)| (k.clone(), json_to_value(v.clone())))
                    .collect();
                Some(Value::from_object(attrs))
            }
            other => self.0.attributes.get(other).cloned().map(json_to_value),
        }
    }

    fn render(self: &Arc<Self>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.state)
    }
}

/// Convert serde_json::Value to a template Value
pub(crate) fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::from(()),
        serde_json::Value::Bool(b) => Value::from(b),
        serde_json::Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::from(i),
            (None, Some(f)) => Value::from(f),
            _ => Value::from(n.to_string()),
        },
        serde_json::Value::String(s) => Value::from(s),
        serde_json::Value::Array(items) => {
            Value::from(items.into_iter().map(json_to_value).collect::<Vec<_>>())
        }
        serde_json::Value::Object(obj) => {
            let map: BTreeMap<String, Value> = obj
                .into_iter()
                .map(|(k, v)| (k, json_to_value(v)))
                .collect();
            Value::from_object(map)
        }
    }
}

/// `is_state(entity_id, state_or_list)`
pub fn is_state_fn(states: &StatesObject, entity_id: &str, state: Value) -> bool {
    // Strings are iterable, so they have to be checked first
    if let Some(s) = state.as_str() {
        return states.is_state(entity_id, s);
    }
    let Some(current) = states.get_state(entity_id) else {
        return false;
    };
    state
        .try_iter()
        .map(|mut iter| iter.any(|v| v.as_str() == Some(current.as_str())))
        .unwrap_or(false)
}

/// `is_state_attr(entity_id, attribute, value)`
pub fn is_state_attr_fn(states: &StatesObject, entity_id: &str, attribute: &str, value: Value) -> bool {
    let actual = states.state_attr(entity_id, attribute);
    !actual.is_undefined() && actual == value
}

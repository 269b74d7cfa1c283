//! Events delivered on the bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Context;

/// Typed payload of an event
///
/// Implementors name the event type they travel under, which lets the bus
/// route and decode them without string plumbing at every call site.
pub trait EventData: Clone + Send + Sync + 'static {
    fn event_type() -> &'static str;
}

/// Event type identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventType(String);

impl EventType {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Event type that subscribes to every event
    pub fn match_all() -> Self {
        Self("*".to_string())
    }

    pub fn is_match_all(&self) -> bool {
        self.0 == "*"
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EventType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An event fired on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    pub event_type: EventType,

    pub data: T,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,

    /// What caused the event
    pub context: Context,
}

impl<T> Event<T> {
    /// Create an event stamped with the wall clock
    pub fn new(event_type: impl Into<EventType>, data: T, context: Context) -> Self {
        Self::at(event_type, data, context, Utc::now())
    }

    /// Create an event with an explicit firing time
    pub fn at(
        event_type: impl Into<EventType>,
        data: T,
        context: Context,
        time_fired: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            time_fired,
            context,
        }
    }

    /// Swap the payload, keeping type, timestamp and context
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Event<U> {
        Event {
            event_type: self.event_type,
            data: f(self.data),
            time_fired: self.time_fired,
            context: self.context,
        }
    }
}

impl<T: EventData> Event<T> {
    /// Create a typed event from EventData
    pub fn typed(data: T, context: Context) -> Self {
        Self::new(T::event_type(), data, context)
    }
}

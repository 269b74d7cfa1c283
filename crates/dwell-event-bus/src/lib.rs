//! Event bus for dwell
//!
//! The bus is the state change feed: the state store publishes
//! `state_changed` events on it, the host publishes `time_changed` events when
//! its clock moves, and trigger runtimes subscribe to both.
//!
//! Every subscription is an explicit [`Subscription`] handle. Dropping it (or
//! calling [`Subscription::unsubscribe`]) detaches the listener.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dwell_core::events::TimeChangedData;
use dwell_core::{Context, Event, EventData, EventType};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Untyped event as carried on the wire
pub type RawEvent = Event<serde_json::Value>;

/// A unique identifier for an event listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Broadcast bus keyed by event type
pub struct EventBus {
    channels: DashMap<EventType, broadcast::Sender<RawEvent>>,
    match_all: broadcast::Sender<RawEvent>,
    /// Live listeners, shared with their handles so drop can deregister
    active: Arc<DashMap<ListenerId, EventType>>,
    next_listener_id: AtomicU64,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus whose per-type channels buffer `capacity` events
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all, _) = broadcast::channel(capacity);
        Self {
            channels: DashMap::new(),
            match_all,
            active: Arc::new(DashMap::new()),
            next_listener_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Subscribe to one event type, or to everything with `"*"`
    pub fn subscribe(&self, event_type: impl Into<EventType>) -> Subscription {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        let rx = if event_type.is_match_all() {
            self.match_all.subscribe()
        } else {
            self.channels
                .entry(event_type.clone())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };

        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        self.active.insert(id, event_type);

        Subscription {
            id,
            rx,
            active: self.active.clone(),
        }
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(EventType::match_all())
    }

    /// Subscribe to a typed event, decoding payloads on receipt
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedSubscription<T> {
        TypedSubscription {
            inner: self.subscribe(T::event_type()),
            _phantom: PhantomData,
        }
    }

    /// Deliver an event to its type's subscribers and to match-all subscribers
    pub fn fire(&self, event: RawEvent) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.channels.get(&event.event_type) {
            // A send error only means nobody is listening
            let _ = sender.send(event.clone());
        }
        let _ = self.match_all.send(event);
    }

    /// Fire a typed event
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        let event = Event::typed(data, context);
        let event = event.map(|data| serde_json::to_value(&data).unwrap_or_default());
        self.fire(event);
    }

    /// Announce that the host's notion of "now" moved to `now`
    pub fn fire_time_changed(&self, now: DateTime<Utc>) {
        let data = serde_json::to_value(TimeChangedData { now }).unwrap_or_default();
        self.fire(Event::at(
            TimeChangedData::event_type(),
            data,
            Context::new(),
            now,
        ));
    }

    /// Number of live subscriptions
    pub fn listener_count(&self) -> usize {
        self.active.len()
    }

    /// Number of live subscriptions for one event type
    pub fn listeners_for(&self, event_type: &str) -> usize {
        self.active
            .iter()
            .filter(|entry| entry.value().as_str() == event_type)
            .count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one subscription
///
/// Receives raw events. Dropping the handle unsubscribes.
pub struct Subscription {
    id: ListenerId,
    rx: broadcast::Receiver<RawEvent>,
    active: Arc<DashMap<ListenerId, EventType>>,
}

impl Subscription {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Wait for the next event
    pub async fn recv(&mut self) -> Result<RawEvent, broadcast::error::RecvError> {
        self.rx.recv().await
    }

    /// Take an already-delivered event without waiting
    pub fn try_recv(&mut self) -> Result<RawEvent, broadcast::error::TryRecvError> {
        self.rx.try_recv()
    }

    /// Detach from the bus
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        trace!(listener = ?self.id, "Unsubscribing");
        self.active.remove(&self.id);
    }
}

/// A subscription that decodes payloads into `T`
pub struct TypedSubscription<T> {
    inner: Subscription,
    _phantom: PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedSubscription<T> {
    /// Receive the next event whose payload decodes as `T`
    ///
    /// Events that fail to decode are skipped.
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.inner.recv().await?;
            if let Ok(data) = serde_json::from_value::<T>(event.data.clone()) {
                return Ok(event.map(|_| data));
            }
        }
    }

    pub fn id(&self) -> ListenerId {
        self.inner.id()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use dwell_core::events::{StateChangedData, STATE_CHANGED, TIME_CHANGED};
    use dwell_core::{EntityId, State};
    use serde_json::json;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe("test_event");

        bus.fire(Event::new("test_event", json!({"key": "value"}), Context::new()));

        let received = sub.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), "test_event");
        assert_eq!(received.data["key"], "value");
    }

    #[tokio::test]
    async fn test_match_all_subscription() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_all();

        bus.fire(Event::new("event_a", json!({}), Context::new()));
        bus.fire(Event::new("event_b", json!({}), Context::new()));

        assert_eq!(sub.recv().await.unwrap().event_type.as_str(), "event_a");
        assert_eq!(sub.recv().await.unwrap().event_type.as_str(), "event_b");
    }

    #[tokio::test]
    async fn test_typed_subscription() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_typed::<StateChangedData>();

        let entity_id: EntityId = "test.entity".parse().unwrap();
        let new_state = State::new(
            entity_id.clone(),
            "world",
            HashMap::new(),
            Context::new(),
            Utc::now(),
        );
        let context = Context::with_id("cause");
        bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state: None,
                new_state: Some(new_state),
            },
            context.clone(),
        );

        let received = sub.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), STATE_CHANGED);
        assert_eq!(received.data.entity_id.to_string(), "test.entity");
        assert_eq!(received.context, context);
    }

    #[tokio::test]
    async fn test_time_changed_event() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_typed::<TimeChangedData>();

        let now = Utc::now();
        bus.fire_time_changed(now);

        let received = sub.recv().await.unwrap();
        assert_eq!(received.event_type.as_str(), TIME_CHANGED);
        assert_eq!(received.data.now, now);
        assert_eq!(received.time_fired, now);
    }

    #[test]
    fn test_no_cross_event_pollution() {
        let bus = EventBus::new();
        let mut sub_a = bus.subscribe("event_a");
        let mut sub_b = bus.subscribe("event_b");

        bus.fire(Event::new("event_a", json!({"type": "a"}), Context::new()));

        assert_eq!(sub_a.try_recv().unwrap().data["type"], "a");
        assert!(sub_b.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe_releases_listener() {
        let bus = EventBus::new();
        let first = bus.subscribe(STATE_CHANGED);
        let second = bus.subscribe(STATE_CHANGED);
        assert_ne!(first.id(), second.id());
        assert_eq!(bus.listeners_for(STATE_CHANGED), 2);

        first.unsubscribe();
        assert_eq!(bus.listeners_for(STATE_CHANGED), 1);

        drop(second);
        assert_eq!(bus.listener_count(), 0);
    }
}

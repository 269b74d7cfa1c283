//! Shared harness: real bus, store and template engine on a manual clock

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use dwell_core::{Context, EntityId, ManualClock};
use dwell_event_bus::{EventBus, Subscription};
use dwell_state_store::{Attributes, StateStore};
use dwell_template::TemplateEngine;
use dwell_trigger::{
    TriggerConfig, TriggerEngine, TriggerHandle, TriggerInvocation, TriggerResult, Variables,
};
use std::sync::{Arc, Mutex};

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub bus: Arc<EventBus>,
    pub store: Arc<StateStore>,
    pub clock: Arc<ManualClock>,
    pub engine: TriggerEngine,
    pub calls: Arc<Mutex<Vec<TriggerInvocation>>>,
    events: Subscription,
}

impl Harness {
    /// `test.entity` starts out as `hello`
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::at(start_time()));
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(StateStore::new(bus.clone(), clock.clone()));
        let renderer = Arc::new(TemplateEngine::new(store.clone(), clock.clone()));
        let engine = TriggerEngine::new(renderer, clock.clone());
        let events = bus.subscribe_all();

        let mut harness = Self {
            bus,
            store,
            clock,
            engine,
            calls: Arc::new(Mutex::new(Vec::new())),
            events,
        };
        harness.set("test.entity", "hello");
        harness
    }

    pub fn try_register(&mut self, config: TriggerConfig) -> TriggerResult<TriggerHandle> {
        let calls = self.calls.clone();
        self.engine.register(config, Variables::new(), move |invocation| {
            calls.lock().unwrap().push(invocation)
        })
    }

    pub fn register(&mut self, config: TriggerConfig) -> TriggerHandle {
        self.try_register(config).unwrap()
    }

    pub fn register_json(&mut self, json: serde_json::Value) -> TriggerHandle {
        self.register(serde_json::from_value(json).unwrap())
    }

    pub fn set(&mut self, entity_id: &str, state: &str) {
        self.set_full(entity_id, state, Attributes::new(), Context::new(), false);
    }

    pub fn set_with_context(&mut self, entity_id: &str, state: &str, context: Context) {
        self.set_full(entity_id, state, Attributes::new(), context, false);
    }

    pub fn force(&mut self, entity_id: &str, state: &str) {
        self.set_full(entity_id, state, Attributes::new(), Context::new(), true);
    }

    pub fn set_full(
        &mut self,
        entity_id: &str,
        state: &str,
        attributes: Attributes,
        context: Context,
        force_update: bool,
    ) {
        let entity_id: EntityId = entity_id.parse().unwrap();
        self.store
            .set_with(entity_id, state, attributes, context, force_update);
        self.pump();
    }

    pub fn remove(&mut self, entity_id: &str) {
        let entity_id: EntityId = entity_id.parse().unwrap();
        self.store.remove(&entity_id, Context::new());
        self.pump();
    }

    /// Move the clock forward and announce it on the bus
    pub fn advance(&mut self, seconds: i64) {
        let now = self.clock.advance_seconds(seconds);
        self.bus.fire_time_changed(now);
        self.pump();
    }

    pub fn time_changed_at(&mut self, now: DateTime<Utc>) {
        self.clock.set(now);
        self.bus.fire_time_changed(now);
        self.pump();
    }

    /// Deliver everything the bus has queued to the engine
    pub fn pump(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.engine.dispatch(&event);
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call(&self, index: usize) -> TriggerInvocation {
        self.calls.lock().unwrap()[index].clone()
    }
}

pub fn template(value_template: &str) -> TriggerConfig {
    TriggerConfig::new(value_template)
}

//! Core types for dwell
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: EntityId, State, Event, Context and the Clock abstraction
//! that lets the rest of the system run against real or simulated time.

mod context;
mod entity_id;
mod event;
mod state;
pub mod time;

pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use state::State;
pub use time::{Clock, ManualClock, SharedClock, SystemClock};

/// Standard event types carried on the bus
pub mod events {
    use super::*;
    use chrono::{DateTime, Utc};

    /// Event type for state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type fired when the notion of "now" moves forward
    pub const TIME_CHANGED: &str = "time_changed";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }

    /// Data for TIME_CHANGED events
    #[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
    pub struct TimeChangedData {
        pub now: DateTime<Utc>,
    }

    impl EventData for TimeChangedData {
        fn event_type() -> &'static str {
            TIME_CHANGED
        }
    }
}

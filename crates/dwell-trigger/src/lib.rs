//! Edge-triggered, debounced template triggers
//!
//! A template trigger renders a predicate on every state change and fires
//! once each time the predicate goes from not-true to true. With a `for`
//! dwell it fires only after the predicate has stayed true that long.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = TriggerEngine::new(renderer, clock);
//! let handle = engine.register(
//!     TriggerConfig::new("{{ is_state('test.entity', 'world') }}")
//!         .with_for(ForSpec::Seconds(5.0)),
//!     Variables::new(),
//!     |invocation| println!("{}", invocation.description),
//! )?;
//! ```

mod config;
pub mod duration;
mod engine;
mod error;
mod invocation;
pub mod predicate;
mod render;
mod runtime;
pub mod scheduler;

pub use config::{DurationComponents, DurationField, ForSpec, TriggerConfig, Variables, PLATFORM};
pub use engine::{Action, TriggerEngine, TriggerHandle};
pub use error::{DurationError, RenderError, TriggerError, TriggerResult};
pub use invocation::{format_duration, TriggerCause, TriggerInvocation};
pub use predicate::{is_truthy, Edge, EdgeDetector, PredicateEvaluator};
pub use render::{Renderer, SharedRenderer};
pub use runtime::{RuntimeConfig, RuntimeError, RuntimeHandle, TriggerRuntime};
pub use scheduler::{DwellScheduler, PendingConfirmation};

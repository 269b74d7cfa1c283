//! Jinja2-compatible expression renderer for dwell
//!
//! A deliberately small template engine built on minijinja, with just enough
//! of the Home Assistant template vocabulary to write trigger predicates and
//! dwell durations:
//!
//! # State Access
//!
//! - `states('entity_id')` - Entity state as string
//! - `states.test.entity.state` - State object access
//! - `is_state('entity_id', 'on')` - State comparison
//! - `state_attr('entity_id', 'brightness')` - Attribute value
//! - `has_value('entity_id')` - Entity exists and is not unknown/unavailable
//!
//! # Time
//!
//! - `now()` / `utcnow()` - Current time from the engine's clock
//! - `as_timestamp(value)` - UNIX timestamp
//!
//! # Filters
//!
//! - `| int` / `| float` / `| bool` - Lenient conversions with defaults
//! - `| round(2)` - Rounding with `method=` support
//!
//! # Example
//!
//! ```ignore
//! let engine = TemplateEngine::new(store, clock);
//! let rendered = engine.render("{{ is_state('test.entity', 'world') }}")?;
//! ```

mod engine;
mod error;
mod filters;
mod globals;
mod states;

pub use engine::TemplateEngine;
pub use error::{TemplateError, TemplateResult};
pub use globals::DateTimeWrapper;
pub use states::{StateWrapper, StatesObject};

pub use minijinja::Value;

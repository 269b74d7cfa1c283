//! Edge-triggered, debounced template trigger engine
//!
//! Every registered trigger is a two-state machine:
//!
//! - `Idle`: waiting for the predicate to go from not-true to true. On that
//!   edge it fires right away when there is no dwell (or a zero dwell), and
//!   otherwise arms its dwell timer.
//! - `ArmedWaiting`: a timer is pending. The predicate turning false cancels
//!   it; the deadline passing fires with the state recorded when it was armed.
//!
//! The engine is synchronous and owned by a single driver, usually
//! [`crate::TriggerRuntime`]. It never spawns tasks; timers are deadlines
//! checked against the injected clock.

use crate::config::{ForSpec, TriggerConfig, Variables};
use crate::duration;
use crate::error::{TriggerError, TriggerResult};
use crate::invocation::{TriggerCause, TriggerInvocation};
use crate::predicate::{Edge, EdgeDetector, PredicateEvaluator};
use crate::render::{render_value, SharedRenderer};
use crate::scheduler::{DwellScheduler, PendingConfirmation};
use chrono::{DateTime, Utc};
use dwell_core::events::{StateChangedData, TimeChangedData, STATE_CHANGED, TIME_CHANGED};
use dwell_core::{Context, SharedClock};
use dwell_event_bus::RawEvent;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn, Span};

/// Callback run when a trigger fires
pub type Action = Box<dyn FnMut(TriggerInvocation) + Send>;

/// Identifies a registered trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TriggerHandle(u64);

impl fmt::Display for TriggerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger#{}", self.0)
    }
}

struct TriggerInstance {
    id: Option<String>,
    predicate: PredicateEvaluator,
    r#for: Option<ForSpec>,
    variables: Variables,
    edges: EdgeDetector,
    scheduler: DwellScheduler,
    /// Re-evaluated on time changes as well as state changes
    time_driven: bool,
    action: Action,
}

impl TriggerInstance {
    fn fire(&mut self, handle: TriggerHandle, cause: TriggerCause, dwell: Option<Duration>, now: DateTime<Utc>) {
        let invocation = TriggerInvocation::new(self.id.clone(), cause, dwell, now);
        info!(
            %handle,
            trigger_id = ?self.id,
            description = %invocation.description,
            dwell = ?invocation.for_display(),
            "Template trigger fired"
        );
        (self.action)(invocation);
    }

    /// Re-render the predicate at expiry; a falling edge cancels the dwell
    fn still_true(&mut self, handle: TriggerHandle) -> bool {
        let result = self.predicate.evaluate(&self.variables, None);
        if self.edges.observe(result) == Edge::Falling && self.scheduler.cancel().is_some() {
            debug!(%handle, "Template false at dwell expiry, pending dwell cancelled");
        }
        result
    }

    /// Re-render the predicate and act on the edge it produces
    fn evaluate(&mut self, handle: TriggerHandle, renderer: &SharedRenderer, cause: TriggerCause, now: DateTime<Utc>) {
        let result = self.predicate.evaluate(&self.variables, cause.entity_id.as_ref());

        match self.edges.observe(result) {
            Edge::Unchanged => {
                trace!(%handle, result, "Template result unchanged");
            }
            Edge::Falling => {
                if self.scheduler.cancel().is_some() {
                    debug!(%handle, "Template no longer true, pending dwell cancelled");
                }
            }
            Edge::Rising => {
                let dwell = match &self.r#for {
                    None => Ok(None),
                    Some(spec) => {
                        let mut variables = self.variables.clone();
                        variables.insert("trigger".to_string(), cause.to_variable());
                        duration::resolve(Some(spec), renderer.as_ref(), &variables)
                    }
                };

                match dwell {
                    Err(e) => {
                        error!(
                            %handle,
                            entity_id = cause.entity_id.as_ref().map(tracing::field::display),
                            error = %e,
                            "Error rendering 'for' of template trigger"
                        );
                    }
                    Ok(Some(d)) if !d.is_zero() => match self.scheduler.arm(cause, d, now) {
                        Ok(_) => debug!(%handle, dwell = ?d, "Template true, waiting for dwell"),
                        Err(e) => error!(%handle, error = %e, "Cannot arm dwell of template trigger"),
                    },
                    Ok(dwell) => self.fire(handle, cause, dwell, now),
                }
            }
        }
    }
}

/// Owns registered template triggers and feeds them events
pub struct TriggerEngine {
    renderer: SharedRenderer,
    clock: SharedClock,
    triggers: BTreeMap<TriggerHandle, TriggerInstance>,
    next_handle: u64,
    span: Span,
}

impl TriggerEngine {
    pub fn new(renderer: SharedRenderer, clock: SharedClock) -> Self {
        Self::with_span(renderer, clock, tracing::info_span!("trigger_engine"))
    }

    /// Create an engine whose log records are all emitted inside `span`
    pub fn with_span(renderer: SharedRenderer, clock: SharedClock, span: Span) -> Self {
        Self {
            renderer,
            clock,
            triggers: BTreeMap::new(),
            next_handle: 0,
            span,
        }
    }

    /// Validate and install a trigger
    ///
    /// `variables` come from the host; `trigger_variables` from the config
    /// are rendered on top of them. The predicate is evaluated once to
    /// record its current value; that evaluation never fires.
    pub fn register<F>(
        &mut self,
        config: TriggerConfig,
        variables: Variables,
        on_fire: F,
    ) -> TriggerResult<TriggerHandle>
    where
        F: FnMut(TriggerInvocation) + Send + 'static,
    {
        let span = self.span.clone();
        let _entered = span.enter();

        config.validate()?;

        let renderer = self.renderer.as_ref();
        let check = |template: &str| {
            renderer
                .validate(template)
                .map_err(|source| TriggerError::Template {
                    template: template.to_string(),
                    source,
                })
        };
        check(&config.value_template)?;
        if let Some(spec) = &config.r#for {
            for template in spec.templates() {
                if renderer.is_template(template) {
                    check(template)?;
                }
            }
        }

        let TriggerConfig {
            id,
            value_template,
            r#for,
            trigger_variables,
            ..
        } = config;

        let mut variables = variables;
        for (name, value) in trigger_variables {
            let rendered = render_value(renderer, &value, &variables)
                .map_err(|source| TriggerError::Variable {
                    name: name.clone(),
                    source,
                })?;
            variables.insert(name, rendered);
        }

        let time_driven = renderer.references_time(&value_template);
        let predicate = PredicateEvaluator::new(value_template, self.renderer.clone());
        let mut edges = EdgeDetector::new();
        edges.baseline(predicate.evaluate(&variables, None));

        self.next_handle += 1;
        let handle = TriggerHandle(self.next_handle);

        debug!(
            %handle,
            trigger_id = ?id,
            template = %predicate.template(),
            initial = edges.last(),
            time_driven,
            "Registered template trigger"
        );

        self.triggers.insert(
            handle,
            TriggerInstance {
                id,
                predicate,
                r#for,
                variables,
                edges,
                scheduler: DwellScheduler::new(),
                time_driven,
                action: Box::new(on_fire),
            },
        );

        Ok(handle)
    }

    /// Remove a trigger, cancelling its pending dwell
    pub fn unregister(&mut self, handle: TriggerHandle) -> bool {
        let _entered = self.span.enter();

        match self.triggers.remove(&handle) {
            Some(mut trigger) => {
                if trigger.scheduler.cancel().is_some() {
                    debug!(%handle, "Cancelled pending dwell of removed trigger");
                }
                debug!(%handle, "Unregistered template trigger");
                true
            }
            None => false,
        }
    }

    /// Feed one bus event to every trigger
    pub fn dispatch(&mut self, event: &RawEvent) {
        match event.event_type.as_str() {
            STATE_CHANGED => match serde_json::from_value::<StateChangedData>(event.data.clone()) {
                Ok(data) => self.handle_state_changed(&data, &event.context),
                Err(e) => warn!(error = %e, "Malformed state_changed event"),
            },
            TIME_CHANGED => match serde_json::from_value::<TimeChangedData>(event.data.clone()) {
                Ok(data) => self.handle_time_changed(data.now),
                Err(e) => warn!(error = %e, "Malformed time_changed event"),
            },
            other => trace!(event_type = other, "Ignoring event"),
        }
    }

    /// Re-evaluate every trigger against a state change
    pub fn handle_state_changed(&mut self, data: &StateChangedData, context: &Context) {
        let span = self.span.clone();
        let _entered = span.enter();

        let now = self.clock.now();
        self.fire_due(now);

        trace!(entity_id = %data.entity_id, "Evaluating template triggers");
        for (handle, trigger) in self.triggers.iter_mut() {
            let cause = TriggerCause::state_change(
                data.entity_id.clone(),
                data.old_state.clone(),
                data.new_state.clone(),
                context.clone(),
            );
            trigger.evaluate(*handle, &self.renderer, cause, now);
        }
    }

    /// Fire due dwells, then re-evaluate triggers that read the time
    pub fn handle_time_changed(&mut self, now: DateTime<Utc>) {
        let span = self.span.clone();
        let _entered = span.enter();

        self.fire_due(now);

        for (handle, trigger) in self.triggers.iter_mut().filter(|(_, t)| t.time_driven) {
            trigger.evaluate(*handle, &self.renderer, TriggerCause::time_change(), now);
        }
    }

    /// Fire every dwell whose deadline is at or before `now`
    ///
    /// A time-driven predicate can turn false without any event, so it is
    /// rendered once more at expiry and a false result cancels the dwell.
    pub fn fire_due(&mut self, now: DateTime<Utc>) -> usize {
        let mut fired = 0;
        for (handle, trigger) in self.triggers.iter_mut() {
            let due = trigger.scheduler.next_deadline().is_some_and(|d| d <= now);
            if due && trigger.time_driven && !trigger.still_true(*handle) {
                continue;
            }
            if let Some(pending) = trigger.scheduler.take_due(now) {
                trigger.fire(*handle, pending.cause, Some(pending.duration), now);
                fired += 1;
            }
        }
        fired
    }

    /// Earliest pending dwell deadline across all triggers
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.triggers
            .values()
            .filter_map(|t| t.scheduler.next_deadline())
            .min()
    }

    pub fn pending(&self, handle: TriggerHandle) -> Option<&PendingConfirmation> {
        self.triggers.get(&handle)?.scheduler.pending()
    }

    pub fn is_armed(&self, handle: TriggerHandle) -> bool {
        self.pending(handle).is_some()
    }

    pub fn contains(&self, handle: TriggerHandle) -> bool {
        self.triggers.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

impl fmt::Debug for TriggerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerEngine")
            .field("triggers", &self.triggers.len())
            .finish_non_exhaustive()
    }
}

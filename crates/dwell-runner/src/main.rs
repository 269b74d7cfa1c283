//! dwell runner
//!
//! Loads template triggers from a YAML file, then reads `entity_id state`
//! lines from stdin and writes one JSON line per trigger invocation to
//! stdout.
//!
//! ```text
//! dwell triggers.yaml < states.txt
//! ```

mod config;
mod input;

use anyhow::{Context as _, Result};
use config::RunnerConfig;
use dwell_core::{Context, SharedClock, SystemClock};
use dwell_event_bus::EventBus;
use dwell_state_store::{Attributes, StateStore};
use dwell_template::TemplateEngine;
use dwell_trigger::{RuntimeHandle, TriggerEngine, TriggerInvocation, TriggerRuntime, Variables};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Everything the triggers run against
pub struct Dwell {
    pub bus: Arc<EventBus>,
    pub store: Arc<StateStore>,
    pub clock: SharedClock,
}

impl Dwell {
    pub fn new() -> Self {
        let clock: SharedClock = Arc::new(SystemClock);
        let bus = Arc::new(EventBus::new());
        let store = Arc::new(StateStore::new(bus.clone(), clock.clone()));

        Self { bus, store, clock }
    }

    fn seed(&self, config: &RunnerConfig) -> Result<()> {
        for (entity_id, initial) in &config.initial_states {
            let entity_id = entity_id
                .parse()
                .with_context(|| format!("initial state for {entity_id}"))?;
            self.store.set(
                entity_id,
                initial.state(),
                initial.attributes(),
                Context::new(),
            );
        }
        Ok(())
    }

    fn start(&self, config: &RunnerConfig) -> RuntimeHandle {
        let renderer = Arc::new(TemplateEngine::new(self.store.clone(), self.clock.clone()));
        let engine = TriggerEngine::new(renderer, self.clock.clone());
        TriggerRuntime::spawn(engine, &self.bus, config.runtime())
    }
}

impl Default for Dwell {
    fn default() -> Self {
        Self::new()
    }
}

fn print_invocation(invocation: TriggerInvocation) {
    match serde_json::to_string(&invocation) {
        Ok(line) => println!("{line}"),
        Err(e) => error!(error = %e, "Cannot serialize trigger invocation"),
    }
}

async fn read_states(dwell: &Dwell) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        match input::parse_line(&line) {
            None => {}
            Some(Ok(update)) => {
                dwell
                    .store
                    .set(update.entity_id, update.state, Attributes::new(), Context::new());
            }
            Some(Err(e)) => warn!(line = %line, error = %e, "Skipping invalid input line"),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: dwell <config.yaml>")?;
    let config = RunnerConfig::load(&path)?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.max_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!(config = %path, triggers = config.triggers.len(), "Starting dwell");

    let dwell = Dwell::new();
    dwell.seed(&config)?;

    let runtime = dwell.start(&config);
    for trigger in config.triggers.iter().cloned() {
        let id = trigger.id.clone();
        let handle = runtime
            .register(trigger, Variables::new(), print_invocation)
            .await
            .with_context(|| format!("registering trigger {}", id.as_deref().unwrap_or("<unnamed>")))?;
        info!(%handle, trigger_id = ?id, "Trigger registered");
    }

    tokio::select! {
        result = read_states(&dwell) => {
            result?;
            info!("End of input");
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Shutting down...");
        }
    }

    let engine = runtime.shutdown().await?;
    info!(armed = engine.next_deadline().is_some(), "Stopped");

    Ok(())
}

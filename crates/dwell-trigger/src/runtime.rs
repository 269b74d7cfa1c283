//! Async driver for a [`TriggerEngine`]
//!
//! One tokio task owns the engine. Bus events, dwell deadlines, periodic
//! ticks and registration commands all go through one `select!` loop, so
//! the engine never sees two things at once.

use crate::config::{TriggerConfig, Variables};
use crate::engine::{Action, TriggerEngine, TriggerHandle};
use crate::error::TriggerError;
use crate::invocation::TriggerInvocation;
use dwell_core::SharedClock;
use dwell_event_bus::{EventBus, Subscription};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("trigger runtime is not running")]
    Closed,

    #[error(transparent)]
    Trigger(#[from] TriggerError),

    #[error("trigger runtime task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Buffered registration commands
    pub command_capacity: usize,
    /// How often time-driven templates are re-rendered
    pub tick_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_capacity: 32,
            tick_interval: Duration::from_secs(1),
        }
    }
}

enum Command {
    Register {
        config: TriggerConfig,
        variables: Variables,
        action: Action,
        reply: oneshot::Sender<Result<TriggerHandle, TriggerError>>,
    },
    Unregister {
        handle: TriggerHandle,
        reply: oneshot::Sender<bool>,
    },
    Shutdown,
}

/// The task side of a running engine
pub struct TriggerRuntime {
    engine: TriggerEngine,
    events: Subscription,
    commands: mpsc::Receiver<Command>,
    clock: SharedClock,
    config: RuntimeConfig,
}

impl TriggerRuntime {
    /// Move `engine` into a new task fed by `bus`
    ///
    /// The bus subscription exists before this returns, so nothing fired
    /// afterwards is missed.
    pub fn spawn(engine: TriggerEngine, bus: &EventBus, config: RuntimeConfig) -> RuntimeHandle {
        let (tx, rx) = mpsc::channel(config.command_capacity.max(1));
        let runtime = TriggerRuntime {
            clock: engine.clock().clone(),
            engine,
            events: bus.subscribe_all(),
            commands: rx,
            config,
        };

        let task = tokio::spawn(runtime.run());
        RuntimeHandle { commands: tx, task }
    }

    async fn run(mut self) -> TriggerEngine {
        info!(triggers = self.engine.len(), "Starting trigger runtime");

        let mut tick = tokio::time::interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let wait = self.engine.next_deadline().map(|deadline| {
                (deadline - self.clock.now())
                    .to_std()
                    .unwrap_or(Duration::ZERO)
            });

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Register { config, variables, action, reply }) => {
                        let _ = reply.send(self.engine.register(config, variables, action));
                    }
                    Some(Command::Unregister { handle, reply }) => {
                        let _ = reply.send(self.engine.unregister(handle));
                    }
                    Some(Command::Shutdown) | None => {
                        info!("Received shutdown signal");
                        break;
                    }
                },
                event = self.events.recv() => match event {
                    Ok(event) => self.engine.dispatch(&event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "Trigger runtime lagged behind the event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event bus closed, stopping trigger runtime");
                        break;
                    }
                },
                _ = tokio::time::sleep(wait.unwrap_or_default()), if wait.is_some() => {
                    let fired = self.engine.fire_due(self.clock.now());
                    debug!(fired, "Dwell deadline reached");
                }
                _ = tick.tick() => {
                    self.engine.handle_time_changed(self.clock.now());
                }
            }
        }

        info!("Trigger runtime stopped");
        self.engine
    }
}

/// Control side of a running engine
pub struct RuntimeHandle {
    commands: mpsc::Sender<Command>,
    task: JoinHandle<TriggerEngine>,
}

impl RuntimeHandle {
    pub async fn register<F>(
        &self,
        config: TriggerConfig,
        variables: Variables,
        on_fire: F,
    ) -> Result<TriggerHandle, RuntimeError>
    where
        F: FnMut(TriggerInvocation) + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Register {
            config,
            variables,
            action: Box::new(on_fire),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| RuntimeError::Closed)??)
    }

    pub async fn unregister(&self, handle: TriggerHandle) -> Result<bool, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Unregister { handle, reply }).await?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Stop the task and hand the engine back
    pub async fn shutdown(self) -> Result<TriggerEngine, RuntimeError> {
        // A closed channel means the task already stopped on its own
        let _ = self.commands.send(Command::Shutdown).await;
        Ok(self.task.await?)
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    async fn send(&self, command: Command) -> Result<(), RuntimeError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RuntimeError::Closed)
    }
}

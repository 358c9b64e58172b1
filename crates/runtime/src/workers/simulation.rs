//! Simulation worker that owns the authoritative [`combat_core::WorldState`].
//!
//! Receives commands from [`crate::RuntimeHandle`], runs them through
//! [`combat_core::CombatEngine`], and publishes the drained engine events to
//! the EventBus. With a non-zero tick interval the worker also advances the
//! world on its own timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use combat_core::{CombatEngine, GameTime, Unit, UnitCommand, UnitId, WorldState};

use super::{CombatLog, SimulationMetrics};
use crate::api::{Result, RuntimeError};
use crate::events::{CombatRecord, Event, EventBus, WorldEvent};
use crate::oracle::OracleManager;

/// Commands that can be sent to the simulation worker
pub enum Command {
    /// Apply a unit command through the engine.
    Issue {
        unit: UnitId,
        command: UnitCommand,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Add a unit to the world.
    Spawn {
        unit: Box<Unit>,
        reply: oneshot::Sender<Result<UnitId>>,
    },
    /// Remove a unit from the world, returning its final state.
    Despawn {
        unit: UnitId,
        reply: oneshot::Sender<Result<Box<Unit>>>,
    },
    /// Advance the world clock manually.
    Advance {
        diff_ms: u64,
        reply: oneshot::Sender<GameTime>,
    },
    /// Snapshot one unit (read-only).
    QueryUnit {
        unit: UnitId,
        reply: oneshot::Sender<Option<Unit>>,
    },
    /// Snapshot the whole world (read-only).
    QueryWorld { reply: oneshot::Sender<Box<WorldState>> },
}

/// Background task that processes combat commands.
pub struct SimulationWorker {
    state: WorldState,
    oracles: OracleManager,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
    metrics: Arc<SimulationMetrics>,
    combat_log: Option<CombatLog>,
    tick_interval_ms: u64,
}

impl SimulationWorker {
    /// Creates a new simulation worker.
    pub fn new(
        state: WorldState,
        oracles: OracleManager,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
        metrics: Arc<SimulationMetrics>,
    ) -> Self {
        info!(
            seed = state.seed,
            units = state.units.len(),
            spells = oracles.spells().len(),
            "SimulationWorker initialized"
        );

        Self {
            state,
            oracles,
            command_rx,
            event_bus,
            metrics,
            combat_log: None,
            tick_interval_ms: 0,
        }
    }

    /// Advance the world by `interval_ms` on a timer; zero disables the timer.
    pub fn with_tick_interval(mut self, interval_ms: u64) -> Self {
        self.tick_interval_ms = interval_ms;
        self
    }

    pub fn with_combat_log(mut self, log: CombatLog) -> Self {
        self.combat_log = Some(log);
        self
    }

    /// Spawns the units the world starts with.
    pub fn spawn_initial(&mut self, units: Vec<Unit>) -> Result<()> {
        for unit in units {
            self.spawn_unit(unit)?;
        }
        Ok(())
    }

    /// Main worker loop.
    pub async fn run(mut self) {
        let mut ticker = (self.tick_interval_ms > 0).then(|| {
            let mut interval = tokio::time::interval(Duration::from_millis(self.tick_interval_ms));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            tokio::select! {
                maybe_cmd = self.command_rx.recv() => match maybe_cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => break,
                },
                _ = next_tick(&mut ticker) => {
                    self.advance(self.tick_interval_ms);
                }
            }
            self.flush_log();
        }

        info!(
            clock = %self.state.clock,
            ticks = self.metrics.ticks(),
            events = self.metrics.events(),
            "SimulationWorker stopped"
        );
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Issue {
                unit,
                command,
                reply,
            } => {
                let result = self.issue(unit, command);
                if reply.send(result).is_err() {
                    debug!("Issue reply channel closed (caller dropped)");
                }
            }
            Command::Spawn { unit, reply } => {
                let result = self.spawn_unit(*unit);
                if reply.send(result).is_err() {
                    debug!("Spawn reply channel closed (caller dropped)");
                }
            }
            Command::Despawn { unit, reply } => {
                let result = self.despawn_unit(unit).map(Box::new);
                if reply.send(result).is_err() {
                    debug!("Despawn reply channel closed (caller dropped)");
                }
            }
            Command::Advance { diff_ms, reply } => {
                let clock = self.advance(diff_ms);
                if reply.send(clock).is_err() {
                    debug!("Advance reply channel closed (caller dropped)");
                }
            }
            Command::QueryUnit { unit, reply } => {
                if reply.send(self.state.unit(unit).cloned()).is_err() {
                    debug!("QueryUnit reply channel closed (caller dropped)");
                }
            }
            Command::QueryWorld { reply } => {
                if reply.send(Box::new(self.state.clone())).is_err() {
                    debug!("QueryWorld reply channel closed (caller dropped)");
                }
            }
        }
    }

    fn issue(&mut self, unit: UnitId, command: UnitCommand) -> Result<()> {
        let result = {
            let mut engine = CombatEngine::new(&mut self.state, self.oracles.as_combat_env());
            engine.handle_command(unit, command)
        };
        self.metrics.record_command(result.is_ok());
        if let Err(e) = &result {
            warn!(%unit, ?command, error = %e, "command rejected");
        }
        // a rejected cast still emits its failure notification
        self.publish_drained();
        result.map_err(RuntimeError::from)
    }

    fn spawn_unit(&mut self, unit: Unit) -> Result<UnitId> {
        let id = {
            let mut engine = CombatEngine::new(&mut self.state, self.oracles.as_combat_env());
            engine.spawn(unit)?
        };
        debug!(unit = %id, "unit spawned");
        let clock = self.state.clock;
        self.publish(Event::World(WorldEvent::UnitSpawned { clock, unit: id }));
        self.publish_drained();
        Ok(id)
    }

    fn despawn_unit(&mut self, id: UnitId) -> Result<Unit> {
        let unit = {
            let mut engine = CombatEngine::new(&mut self.state, self.oracles.as_combat_env());
            engine.despawn(id)?
        };
        debug!(unit = %id, "unit despawned");
        self.publish_drained();
        let clock = self.state.clock;
        self.publish(Event::World(WorldEvent::UnitDespawned { clock, unit: id }));
        Ok(unit)
    }

    fn advance(&mut self, diff_ms: u64) -> GameTime {
        {
            let mut engine = CombatEngine::new(&mut self.state, self.oracles.as_combat_env());
            engine.update_world(diff_ms);
        }
        self.metrics.record_tick(diff_ms);
        self.publish_drained();
        let clock = self.state.clock;
        self.publish(Event::World(WorldEvent::Tick { clock, diff_ms }));
        clock
    }

    /// Drains buffered engine events and publishes them in emission order.
    fn publish_drained(&mut self) {
        let clock = self.state.clock;
        for event in self.state.drain_events() {
            self.publish(Event::Combat(CombatRecord { clock, event }));
        }
    }

    fn flush_log(&mut self) {
        if let Some(log) = self.combat_log.as_mut()
            && let Err(e) = log.flush()
        {
            error!(path = %log.path().display(), error = %e, "failed to flush combat log");
        }
    }

    fn publish(&mut self, event: Event) {
        if let Some(log) = self.combat_log.as_mut()
            && let Err(e) = log.append(&event)
        {
            error!(path = %log.path().display(), error = %e, "failed to write combat log");
        }
        self.metrics.record_events(1);
        self.event_bus.publish(event);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

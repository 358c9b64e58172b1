//! High-level runtime orchestrator.
//!
//! The runtime owns the simulation worker, wires up command/event channels,
//! and exposes a builder-based API for clients to drive the world.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use combat_content::ContentFactory;
use combat_core::{GameTime, RngOracle, Unit, UnitId, WorldState};

use crate::api::{CommandProvider, Result, RuntimeError, RuntimeHandle};
use crate::events::{Event, EventBus, Topic};
use crate::oracle::OracleManager;
use crate::workers::{CombatLog, Command, SimulationMetrics, SimulationWorker};

/// Runtime configuration shared across the orchestrator and workers.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
    /// Timed world update period; 0 leaves the clock to [`RuntimeHandle::advance`].
    pub tick_interval_ms: u64,
    /// World roll seed; drawn at random when unset.
    pub world_seed: Option<u64>,
    /// JSON-lines log of every published event.
    pub combat_log_path: Option<PathBuf>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 100,
            command_buffer_size: 32,
            tick_interval_ms: 0,
            world_seed: None,
            combat_log_path: None,
        }
    }
}

/// Main runtime that orchestrates the combat simulation
///
/// Design: Runtime owns workers and coordinates execution.
/// [`RuntimeHandle`] provides a cloneable façade for clients.
pub struct Runtime {
    // Shared handle (can be cloned for clients)
    handle: RuntimeHandle,

    // Per-unit command providers (injected by user)
    providers: BTreeMap<UnitId, Box<dyn CommandProvider>>,

    metrics: Arc<SimulationMetrics>,

    // Background worker
    sim_worker_handle: JoinHandle<()>,
}

impl Runtime {
    /// Create a new runtime builder
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Get a cloneable handle to this runtime
    ///
    /// The handle can be shared across clients and async tasks.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Subscribe to one event topic
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.handle.subscribe(topic)
    }

    pub fn metrics(&self) -> &SimulationMetrics {
        &self.metrics
    }

    /// Asks every provider for a command, applies them, then advances the
    /// world by `diff_ms`.
    ///
    /// Commands the engine rejects are logged and skipped; channel failures
    /// abort the step.
    pub async fn step(&mut self, diff_ms: u64) -> Result<GameTime> {
        for (&unit, provider) in &self.providers {
            let Some(snapshot) = self.handle.query_unit(unit).await? else {
                continue;
            };
            let Some(command) = provider.provide_command(unit, &snapshot).await? else {
                continue;
            };
            match self.handle.command(unit, command).await {
                Ok(()) => {}
                Err(RuntimeError::Engine(error)) => {
                    warn!(%unit, ?command, %error, "provider command rejected");
                }
                Err(error) => return Err(error),
            }
        }

        self.handle.advance(diff_ms).await
    }

    /// Run `steps` provider rounds of `diff_ms` each.
    pub async fn run_for(&mut self, steps: u32, diff_ms: u64) -> Result<GameTime> {
        let mut clock = GameTime::ZERO;
        for _ in 0..steps {
            clock = self.step(diff_ms).await?;
        }
        Ok(clock)
    }

    /// Set the command provider driving `unit`
    pub fn set_provider(&mut self, unit: UnitId, provider: impl CommandProvider + 'static) {
        self.providers.insert(unit, Box::new(provider));
    }

    pub fn remove_provider(&mut self, unit: UnitId) -> bool {
        self.providers.remove(&unit).is_some()
    }

    /// Shutdown the runtime gracefully
    ///
    /// Waits for the simulation worker, which exits once every handle clone
    /// has been dropped.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);
        drop(self.providers);

        self.sim_worker_handle
            .await
            .map_err(RuntimeError::WorkerJoin)?;

        Ok(())
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    oracles: Option<OracleManager>,
    content: Option<ContentFactory>,
    rng: Option<Arc<dyn RngOracle>>,
    units: Vec<Unit>,
    providers: BTreeMap<UnitId, Box<dyn CommandProvider>>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            oracles: None,
            content: None,
            rng: None,
            units: Vec::new(),
            providers: BTreeMap::new(),
        }
    }

    /// Override runtime configuration
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the oracle manager directly
    pub fn oracles(mut self, oracles: OracleManager) -> Self {
        self.oracles = Some(oracles);
        self
    }

    /// Load oracles and starting units from a content directory.
    ///
    /// Ignored for oracles when [`Self::oracles`] is also set; units from
    /// `units.ron` are spawned before any added with [`Self::unit`].
    pub fn content(mut self, factory: ContentFactory) -> Self {
        self.content = Some(factory);
        self
    }

    /// Replace the roll source of whichever oracles are used
    pub fn rng(mut self, rng: impl RngOracle + 'static) -> Self {
        self.rng = Some(Arc::new(rng));
        self
    }

    /// Add a unit spawned when the runtime starts
    pub fn unit(mut self, unit: Unit) -> Self {
        self.units.push(unit);
        self
    }

    /// Set the command provider for one unit
    pub fn provider(mut self, unit: UnitId, provider: impl CommandProvider + 'static) -> Self {
        self.providers.insert(unit, Box::new(provider));
        self
    }

    pub fn tick_interval_ms(mut self, interval_ms: u64) -> Self {
        self.config.tick_interval_ms = interval_ms;
        self
    }

    pub fn world_seed(mut self, seed: u64) -> Self {
        self.config.world_seed = Some(seed);
        self
    }

    pub fn combat_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.combat_log_path = Some(path.into());
        self
    }

    /// Build the runtime
    pub async fn build(self) -> Result<Runtime> {
        let mut units = Vec::new();
        let oracles = match (self.oracles, &self.content) {
            (Some(oracles), _) => oracles,
            (None, Some(factory)) => OracleManager::from_factory(factory)
                .map_err(|e| RuntimeError::Content(format!("{e:#}")))?,
            (None, None) => return Err(RuntimeError::MissingOracles),
        };
        if let Some(factory) = &self.content {
            let templates = factory
                .load_units()
                .map_err(|e| RuntimeError::Content(format!("{e:#}")))?;
            units.extend(templates.iter().map(|template| template.to_unit()));
        }
        units.extend(self.units);

        let oracles = match self.rng {
            Some(rng) => OracleManager { rng, ..oracles },
            None => oracles,
        };

        let seed = self.config.world_seed.unwrap_or_else(rand::random);
        let state = WorldState::new(seed);

        let (command_tx, command_rx) = mpsc::channel::<Command>(self.config.command_buffer_size);
        let event_bus = EventBus::with_capacity(self.config.event_buffer_size);
        let metrics = Arc::new(SimulationMetrics::new());

        let handle = RuntimeHandle::new(command_tx, event_bus.clone());

        let mut sim_worker =
            SimulationWorker::new(state, oracles, command_rx, event_bus, Arc::clone(&metrics))
                .with_tick_interval(self.config.tick_interval_ms);
        if let Some(path) = &self.config.combat_log_path {
            sim_worker = sim_worker.with_combat_log(CombatLog::open(path)?);
        }
        let spawned = units.len();
        sim_worker.spawn_initial(units)?;

        let sim_worker_handle = tokio::spawn(sim_worker.run());
        info!(
            seed,
            units = spawned,
            providers = self.providers.len(),
            tick_interval_ms = self.config.tick_interval_ms,
            "combat runtime started"
        );

        Ok(Runtime {
            handle,
            providers: self.providers,
            metrics,
            sim_worker_handle,
        })
    }
}

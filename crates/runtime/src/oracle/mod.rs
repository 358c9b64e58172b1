//! Runtime bundle of the read-only combat environment.
//!
//! The engine borrows its spell catalog, scripts, configuration and roll
//! source through [`combat_core::CombatEnv`]. [`OracleManager`] owns them
//! behind `Arc`s so the simulation worker can build an environment for every
//! command without copying content.
use std::sync::Arc;

use combat_content::ContentFactory;
use combat_core::{CombatConfig, CombatEnv, PcgRng, RngOracle, SpellCatalog, SpellScriptRegistry};

/// Manages all oracle implementations and provides unified access
#[derive(Clone)]
pub struct OracleManager {
    pub(crate) spells: Arc<SpellCatalog>,
    pub(crate) scripts: Arc<SpellScriptRegistry>,
    pub(crate) config: Arc<CombatConfig>,
    pub(crate) rng: Arc<dyn RngOracle>,
}

impl OracleManager {
    /// Creates a new oracle manager rolling with [`PcgRng`].
    pub fn new(spells: SpellCatalog, scripts: SpellScriptRegistry, config: CombatConfig) -> Self {
        Self {
            spells: Arc::new(spells),
            scripts: Arc::new(scripts),
            config: Arc::new(config),
            rng: Arc::new(PcgRng),
        }
    }

    /// Loads configuration, spells and scripts from a content directory.
    pub fn from_factory(factory: &ContentFactory) -> anyhow::Result<Self> {
        let config = factory.load_config()?;
        let spells = factory.load_spells()?;
        tracing::info!(
            dir = %factory.data_dir().display(),
            spells = spells.len(),
            "combat content loaded"
        );
        Ok(Self::new(spells, factory.scripts(), config))
    }

    /// Replaces the roll source, e.g. with a scripted one in tests.
    pub fn with_rng(mut self, rng: impl RngOracle + 'static) -> Self {
        self.rng = Arc::new(rng);
        self
    }

    /// Converts the manager into the environment the engine borrows.
    pub fn as_combat_env(&self) -> CombatEnv<'_> {
        CombatEnv::new(self.spells.as_ref(), self.rng.as_ref(), &self.scripts, &self.config)
    }

    pub fn spells(&self) -> &SpellCatalog {
        &self.spells
    }

    pub fn config(&self) -> &CombatConfig {
        &self.config
    }
}

impl std::fmt::Debug for OracleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleManager")
            .field("spells", &self.spells.len())
            .field("scripts", &self.scripts.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

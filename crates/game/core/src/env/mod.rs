//! Read-only collaborators of the engine.
//!
//! Static spell metadata, the RNG and the registered per-spell scripts are
//! consumed through [`CombatEnv`], which bundles them with the engine
//! configuration so every engine entry point receives them by reference.
mod rng;
mod scripts;

use std::collections::BTreeMap;

pub use rng::{PcgRng, RngOracle, RollContext, ScriptedRng, compute_seed};
pub use scripts::{
    AbsorbHook, AuraRemoveHook, CheckProcHook, DamageTakenContext, DamageTakenHook, DummyContext,
    DummyHook, ProcHook, ProcHookResult, SpellScriptRegistry,
};

use crate::config::CombatConfig;
use crate::spell::SpellInfo;
use crate::state::SpellId;

/// Static spell metadata lookup.
///
/// The engine treats the store as immutable; a missing id is a data error
/// that aborts the operation that asked for it.
pub trait SpellOracle: Send + Sync {
    fn spell(&self, id: SpellId) -> Option<&SpellInfo>;
}

/// In-memory spell catalog.
#[derive(Clone, Debug, Default)]
pub struct SpellCatalog {
    spells: BTreeMap<SpellId, SpellInfo>,
}

impl SpellCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a definition, replacing any previous one with the same id.
    pub fn insert(&mut self, info: SpellInfo) {
        self.spells.insert(info.id, info);
    }

    pub fn with(mut self, info: SpellInfo) -> Self {
        self.insert(info);
        self
    }

    pub fn len(&self) -> usize {
        self.spells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpellInfo> {
        self.spells.values()
    }
}

impl FromIterator<SpellInfo> for SpellCatalog {
    fn from_iter<T: IntoIterator<Item = SpellInfo>>(iter: T) -> Self {
        let mut catalog = Self::new();
        for info in iter {
            catalog.insert(info);
        }
        catalog
    }
}

impl SpellOracle for SpellCatalog {
    fn spell(&self, id: SpellId) -> Option<&SpellInfo> {
        self.spells.get(&id)
    }
}

/// Aggregates the read-only inputs of the engine.
#[derive(Clone, Copy)]
pub struct CombatEnv<'a> {
    spells: &'a dyn SpellOracle,
    rng: &'a dyn RngOracle,
    scripts: &'a SpellScriptRegistry,
    config: &'a CombatConfig,
}

impl<'a> CombatEnv<'a> {
    pub fn new(
        spells: &'a dyn SpellOracle,
        rng: &'a dyn RngOracle,
        scripts: &'a SpellScriptRegistry,
        config: &'a CombatConfig,
    ) -> Self {
        Self {
            spells,
            rng,
            scripts,
            config,
        }
    }

    pub fn spells(&self) -> &'a dyn SpellOracle {
        self.spells
    }

    pub fn spell(&self, id: SpellId) -> Option<&'a SpellInfo> {
        self.spells.spell(id)
    }

    pub fn rng(&self) -> &'a dyn RngOracle {
        self.rng
    }

    pub fn scripts(&self) -> &'a SpellScriptRegistry {
        self.scripts
    }

    pub fn config(&self) -> &'a CombatConfig {
        self.config
    }
}

impl core::fmt::Debug for CombatEnv<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CombatEnv")
            .field("scripts", self.scripts)
            .field("config", self.config)
            .finish_non_exhaustive()
    }
}

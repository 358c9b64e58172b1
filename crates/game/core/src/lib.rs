//! Deterministic combat rules shared by the runtime and offline tools.
//!
//! `combat-core` owns the unit combat model: auras and their effect store,
//! cast slots, hit outcome rolls, the damage and healing pipeline, procs,
//! threat and the per-tick update loop. It performs no I/O and never spawns
//! tasks; all state mutation flows through [`engine::CombatEngine`], which
//! borrows a [`state::WorldState`] together with a read-only
//! [`env::CombatEnv`].
pub mod aura;
pub mod combat;
pub mod config;
pub mod engine;
pub mod env;
pub mod error;
pub mod event;
pub mod proc;
pub mod spell;
pub mod state;

pub use aura::{
    Aura, AuraApplication, AuraRemoveMode, AuraState, AuraType, EffectMask, EffectQuery,
    EffectStore, LoadedAuraState,
};
pub use combat::{
    CalcDamageInfo, DamageEffectType, DamageInfo, HealInfo, MeleeHitOutcome, SpellMissInfo,
};
pub use config::CombatConfig;
pub use engine::CombatEngine;
pub use env::{
    CombatEnv, PcgRng, RngOracle, RollContext, ScriptedRng, SpellCatalog, SpellOracle,
    SpellScriptRegistry,
};
pub use error::{CastError, EngineError, ErrorContext, ErrorSeverity, GameError};
pub use event::{CombatEvent, UnitCommand};
pub use proc::{ProcEntry, ProcEventInfo, ProcFlags, ProcHitMask, ProcTrigger};
pub use spell::{
    CurrentSpellType, SchoolMask, SpellEffectInfo, SpellEffectKind, SpellInfo, SpellTargets,
};
pub use state::{
    AuraId, CastId, GameTime, Position, SpellId, Unit, UnitId, UnitRole, UnitState, WorldState,
};

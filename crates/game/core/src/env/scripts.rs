//! Per-spell special cases.
//!
//! The engine stays generic; spell-specific behavior is registered here
//! against a [`SpellId`] and looked up at the few points where the engine
//! lets content intervene. Hooks are plain function pointers so the registry
//! is `Send + Sync` and can live in the read-only environment.

use std::collections::BTreeMap;

use crate::aura::AuraRemoveMode;
use crate::combat::DamageInfo;
use crate::engine::CombatEngine;
use crate::proc::ProcEventInfo;
use crate::state::{AuraId, SpellId, UnitId};

/// Whether the default proc handling still runs after a hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProcHookResult {
    Continue,
    PreventDefault,
}

/// Extra eligibility check for a proc candidate. Returning false drops it.
pub type CheckProcHook = fn(&CombatEngine<'_>, AuraId, &ProcEventInfo) -> bool;

/// Runs when a proc fires, before the default effect handlers.
pub type ProcHook = fn(&mut CombatEngine<'_>, AuraId, &ProcEventInfo) -> ProcHookResult;

/// Adjusts how much a shield absorbs. Receives the amount the engine would
/// absorb and returns the amount to absorb.
pub type AbsorbHook = fn(&CombatEngine<'_>, AuraId, &DamageInfo, u32) -> u32;

/// Runs after an aura application has been removed from `target`.
pub type AuraRemoveHook = fn(&mut CombatEngine<'_>, AuraId, UnitId, AuraRemoveMode);

/// Implements a dummy spell effect.
pub type DummyHook = fn(&mut CombatEngine<'_>, &DummyContext);

/// Runs once per damage commit for each aura on the victim that registered it.
pub type DamageTakenHook = fn(&mut CombatEngine<'_>, &DamageTakenContext);

/// Inputs of a dummy effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DummyContext {
    pub caster: UnitId,
    pub target: Option<UnitId>,
    pub spell: SpellId,
    pub effect_index: u8,
    pub amount: i32,
}

/// Inputs of a damage-taken hook.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DamageTakenContext {
    pub aura: AuraId,
    pub victim: UnitId,
    pub attacker: Option<UnitId>,
    pub damage: u32,
}

/// Spell id keyed table of script hooks.
#[derive(Clone, Default)]
pub struct SpellScriptRegistry {
    check_proc: BTreeMap<SpellId, CheckProcHook>,
    on_proc: BTreeMap<SpellId, ProcHook>,
    on_absorb: BTreeMap<SpellId, AbsorbHook>,
    on_aura_remove: BTreeMap<SpellId, AuraRemoveHook>,
    on_dummy: BTreeMap<SpellId, DummyHook>,
    on_damage_taken: BTreeMap<SpellId, DamageTakenHook>,
}

impl SpellScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_check_proc(&mut self, spell: SpellId, hook: CheckProcHook) -> &mut Self {
        self.check_proc.insert(spell, hook);
        self
    }

    pub fn register_on_proc(&mut self, spell: SpellId, hook: ProcHook) -> &mut Self {
        self.on_proc.insert(spell, hook);
        self
    }

    pub fn register_on_absorb(&mut self, spell: SpellId, hook: AbsorbHook) -> &mut Self {
        self.on_absorb.insert(spell, hook);
        self
    }

    pub fn register_on_aura_remove(&mut self, spell: SpellId, hook: AuraRemoveHook) -> &mut Self {
        self.on_aura_remove.insert(spell, hook);
        self
    }

    pub fn register_on_dummy(&mut self, spell: SpellId, hook: DummyHook) -> &mut Self {
        self.on_dummy.insert(spell, hook);
        self
    }

    pub fn register_on_damage_taken(&mut self, spell: SpellId, hook: DamageTakenHook) -> &mut Self {
        self.on_damage_taken.insert(spell, hook);
        self
    }

    pub fn check_proc(&self, spell: SpellId) -> Option<CheckProcHook> {
        self.check_proc.get(&spell).copied()
    }

    pub fn on_proc(&self, spell: SpellId) -> Option<ProcHook> {
        self.on_proc.get(&spell).copied()
    }

    pub fn on_absorb(&self, spell: SpellId) -> Option<AbsorbHook> {
        self.on_absorb.get(&spell).copied()
    }

    pub fn on_aura_remove(&self, spell: SpellId) -> Option<AuraRemoveHook> {
        self.on_aura_remove.get(&spell).copied()
    }

    pub fn on_dummy(&self, spell: SpellId) -> Option<DummyHook> {
        self.on_dummy.get(&spell).copied()
    }

    pub fn on_damage_taken(&self, spell: SpellId) -> Option<DamageTakenHook> {
        self.on_damage_taken.get(&spell).copied()
    }

    pub fn has_damage_taken_hooks(&self) -> bool {
        !self.on_damage_taken.is_empty()
    }

    /// Total number of registered hooks.
    pub fn len(&self) -> usize {
        self.check_proc.len()
            + self.on_proc.len()
            + self.on_absorb.len()
            + self.on_aura_remove.len()
            + self.on_dummy.len()
            + self.on_damage_taken.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for SpellScriptRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpellScriptRegistry")
            .field("check_proc", &self.check_proc.keys().collect::<Vec<_>>())
            .field("on_proc", &self.on_proc.keys().collect::<Vec<_>>())
            .field("on_absorb", &self.on_absorb.keys().collect::<Vec<_>>())
            .field("on_aura_remove", &self.on_aura_remove.keys().collect::<Vec<_>>())
            .field("on_dummy", &self.on_dummy.keys().collect::<Vec<_>>())
            .field("on_damage_taken", &self.on_damage_taken.keys().collect::<Vec<_>>())
            .finish()
    }
}

//! The combat engine: the only mutator of [`WorldState`].
//!
//! [`CombatEngine`] borrows the world mutably and the read-only environment
//! for the duration of one call (a tick, a command, a scripted action). Every
//! subsystem adds its operations as `impl CombatEngine` blocks in its own
//! module, so the aura, spell, combat and proc code all share this context.
//!
//! # Design
//!
//! Cross-references between units, auras and casts are ids resolved through
//! the world on every access. A lookup that fails is a normal case (the
//! caster died, the aura was removed by a nested handler) and is handled by
//! skipping the work, never by panicking. Programmer invariant violations
//! (double apply, non-quiescent despawn, proc depth leak) are `assert!`s.

mod command;
mod spawn;
mod update;

use tracing::trace;

use crate::aura::{Aura, EffectQuery, EffectStore};
use crate::config::CombatConfig;
use crate::env::{CombatEnv, RollContext, compute_seed};
use crate::event::CombatEvent;
use crate::spell::{SpellCast, SpellInfo};
use crate::state::{AuraId, CastId, GameTime, SpellId, Unit, UnitId, WorldState};

static EMPTY_EFFECTS: EffectStore = EffectStore::new();

/// Mutable view of one world plus its environment.
pub struct CombatEngine<'a> {
    state: &'a mut WorldState,
    env: CombatEnv<'a>,
}

impl<'a> CombatEngine<'a> {
    pub fn new(state: &'a mut WorldState, env: CombatEnv<'a>) -> Self {
        Self { state, env }
    }

    pub fn state(&self) -> &WorldState {
        self.state
    }

    /// Direct access for loaders and tests. Game logic goes through the
    /// engine operations.
    pub fn state_mut(&mut self) -> &mut WorldState {
        self.state
    }

    pub fn env(&self) -> CombatEnv<'a> {
        self.env
    }

    pub fn config(&self) -> &'a CombatConfig {
        self.env.config()
    }

    pub fn now(&self) -> GameTime {
        self.state.clock
    }

    // ===== lookups =====

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.state.unit(id)
    }

    pub(crate) fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.state.unit_mut(id)
    }

    pub fn is_alive(&self, id: UnitId) -> bool {
        self.unit(id).is_some_and(Unit::is_alive)
    }

    pub fn spell_info(&self, id: SpellId) -> Option<&'a SpellInfo> {
        self.env.spell(id)
    }

    pub fn aura(&self, id: AuraId) -> Option<&Aura> {
        self.state.auras.get(id)
    }

    pub(crate) fn aura_mut(&mut self, id: AuraId) -> Option<&mut Aura> {
        self.state.auras.get_mut(id)
    }

    pub fn cast(&self, id: CastId) -> Option<&SpellCast> {
        self.state.casts.get(id)
    }

    pub(crate) fn cast_mut(&mut self, id: CastId) -> Option<&mut SpellCast> {
        self.state.casts.get_mut(id)
    }

    /// Aggregate queries over a unit's applied effects. A missing unit
    /// queries as if it had no effects.
    pub fn effects_of(&self, unit: UnitId) -> EffectQuery<'_> {
        let store = self.unit(unit).map_or(&EMPTY_EFFECTS, |u| &u.effects);
        EffectQuery::new(store, &self.state.auras, self.env.spells())
    }

    // ===== rolls =====

    fn seed_for(&mut self, unit: UnitId, context: RollContext) -> u64 {
        let nonce = self.state.next_nonce();
        compute_seed(self.state.seed, nonce, unit.0, context)
    }

    /// Uniform roll in `0..10000`.
    pub(crate) fn roll_per_10000(&mut self, unit: UnitId, context: RollContext) -> u32 {
        let seed = self.seed_for(unit, context);
        let roll = self.env.rng().roll_per_10000(seed);
        trace!(unit = %unit, ?context, roll, "roll");
        roll
    }

    /// True with probability `chance / 10000`. Certain outcomes do not
    /// consume a roll.
    pub(crate) fn roll_chance(&mut self, unit: UnitId, context: RollContext, chance: i32) -> bool {
        if chance <= 0 {
            return false;
        }
        if chance >= 10_000 {
            return true;
        }
        let seed = self.seed_for(unit, context);
        let hit = self.env.rng().roll_chance_per_10000(seed, chance);
        trace!(unit = %unit, ?context, chance, hit, "chance roll");
        hit
    }

    /// Uniform value in `min..=max`.
    pub(crate) fn roll_range(
        &mut self,
        unit: UnitId,
        context: RollContext,
        min: u32,
        max: u32,
    ) -> u32 {
        if min >= max {
            return min;
        }
        let seed = self.seed_for(unit, context);
        self.env.rng().range(seed, min, max)
    }

    // ===== notifications =====

    pub(crate) fn emit(&mut self, event: CombatEvent) {
        trace!(?event, "combat event");
        self.state.push_event(event);
    }
}

impl core::fmt::Debug for CombatEngine<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CombatEngine")
            .field("clock", &self.state.clock)
            .field("units", &self.state.units.len())
            .field("auras", &self.state.auras.len())
            .field("casts", &self.state.casts.len())
            .finish()
    }
}

//! Authoritative combat state.
//!
//! [`WorldState`] owns every unit, the aura and cast arenas, the world clock
//! and the outbound event buffer. Runtime layers read it freely but mutate it
//! only through [`crate::engine::CombatEngine`].
mod deferred;
mod ids;
mod unit;

use std::collections::BTreeMap;

pub use deferred::{DeferredEvent, DeferredQueue};
pub use ids::{AuraId, CastId, GameTime, SpellId, UnitId};
pub use unit::{
    AvoidanceProfile, PowerType, Position, Unit, UnitRole, UnitState, UnitStatistics, UnitStats,
    WeaponAttackType, WeaponProfile,
};

use crate::aura::AuraArena;
use crate::event::CombatEvent;
use crate::spell::CastArena;

/// Every unit of one simulated world plus shared storage.
#[derive(Clone, Debug, Default)]
pub struct WorldState {
    /// RNG seed, set once at world creation.
    pub seed: u64,
    /// Incremented on every roll, combined with `seed` for the next one.
    roll_nonce: u64,
    pub clock: GameTime,
    pub units: BTreeMap<UnitId, Unit>,
    pub auras: AuraArena,
    pub casts: CastArena,
    events: Vec<CombatEvent>,
}

impl WorldState {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    /// Returns the nonce for the next roll and advances it.
    pub fn next_nonce(&mut self) -> u64 {
        let nonce = self.roll_nonce;
        self.roll_nonce = self.roll_nonce.wrapping_add(1);
        nonce
    }

    pub fn roll_nonce(&self) -> u64 {
        self.roll_nonce
    }

    pub fn push_event(&mut self, event: CombatEvent) {
        self.events.push(event);
    }

    /// Events produced since the last drain.
    pub fn events(&self) -> &[CombatEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<CombatEvent> {
        core::mem::take(&mut self.events)
    }
}

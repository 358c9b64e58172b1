//! In-flight spell casts.

use std::collections::BTreeMap;

use strum::{Display, EnumCount, EnumIter};

use crate::state::{AuraId, CastId, GameTime, SpellId, UnitId};

/// The four concurrent cast slots of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumCount, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CurrentSpellType {
    Generic = 0,
    Channeled = 1,
    Melee = 2,
    Autorepeat = 3,
}

impl CurrentSpellType {
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Lifecycle of a cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CastState {
    /// Cast bar running (or waiting for the next swing / autorepeat tick).
    Preparing,
    /// Channel in progress.
    Casting,
    /// Launched; waiting for a projectile to land.
    Delayed,
    Finished,
    Cancelled,
}

impl CastState {
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }
}

/// Explicit targets of a cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpellTargets {
    pub unit: Option<UnitId>,
}

impl SpellTargets {
    pub const fn unit(unit: UnitId) -> Self {
        Self { unit: Some(unit) }
    }

    pub const fn none() -> Self {
        Self { unit: None }
    }
}

/// What caused a triggered cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerSource {
    /// Proc or periodic trigger of an aura.
    Aura(AuraId),
    /// Trigger-spell effect of another spell.
    Spell(SpellId),
    /// Engine or script without a specific origin.
    Script,
}

/// One in-flight cast.
#[derive(Clone, Debug, PartialEq)]
pub struct SpellCast {
    pub id: CastId,
    pub spell: SpellId,
    pub caster: UnitId,
    pub targets: SpellTargets,
    pub state: CastState,
    /// Remaining cast (or channel) time.
    pub timer_ms: i64,
    pub cast_time_ms: u32,
    pub triggered_by: Option<TriggerSource>,
    /// Slot this cast occupies, if any.
    pub slot: Option<CurrentSpellType>,
    /// Cleared when the slot lets go of the cast; queued work for an
    /// unreferenced cancelled cast becomes a no-op.
    pub referenced_from_current: bool,
    pub pushback_count: u8,
    pub started_at: GameTime,
    /// Cast by an extra attack.
    pub from_extra_attack: bool,
}

impl SpellCast {
    pub fn new(id: CastId, spell: SpellId, caster: UnitId, targets: SpellTargets) -> Self {
        Self {
            id,
            spell,
            caster,
            targets,
            state: CastState::Preparing,
            timer_ms: 0,
            cast_time_ms: 0,
            triggered_by: None,
            slot: None,
            referenced_from_current: false,
            pushback_count: 0,
            started_at: GameTime::ZERO,
            from_extra_attack: false,
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered_by.is_some()
    }

    /// Instant casts never raise the casting unit state.
    pub fn is_instant(&self) -> bool {
        self.cast_time_ms == 0
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_done()
    }
}

/// Storage for every in-flight cast in the world.
#[derive(Clone, Debug, Default)]
pub struct CastArena {
    casts: BTreeMap<CastId, SpellCast>,
    next_id: u64,
}

impl CastArena {
    pub fn next_id(&mut self) -> CastId {
        self.next_id += 1;
        CastId(self.next_id)
    }

    pub fn insert(&mut self, cast: SpellCast) {
        self.casts.insert(cast.id, cast);
    }

    pub fn get(&self, id: CastId) -> Option<&SpellCast> {
        self.casts.get(&id)
    }

    pub fn get_mut(&mut self, id: CastId) -> Option<&mut SpellCast> {
        self.casts.get_mut(&id)
    }

    pub fn remove(&mut self, id: CastId) -> Option<SpellCast> {
        self.casts.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.casts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.casts.is_empty()
    }

    /// Casts of one caster, in creation order.
    pub fn by_caster(&self, caster: UnitId) -> impl Iterator<Item = &SpellCast> {
        self.casts.values().filter(move |c| c.caster == caster)
    }
}

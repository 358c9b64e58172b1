//! Spells: static definitions, in-flight casts, cast slots and execution.
//!
//! # Design
//!
//! [`SpellInfo`] is immutable content shared through the spell oracle. A
//! [`SpellCast`] is the runtime object of one cast and lives in the world's
//! [`CastArena`]; units reference it from one of their four cast slots.
//!
//! ```text
//! cast_spell -> checks -> slot matrix -> timer -> execute -> (projectile) -> hit
//! ```

mod cast;
mod cooldown;
mod executor;
mod info;
mod slots;

pub use cast::{CastArena, CastState, CurrentSpellType, SpellCast, SpellTargets, TriggerSource};
pub use cooldown::SpellHistory;
pub use slots::slot_for;
pub use info::{
    AuraInterruptFlags, DamageClass, DispelType, EffectTarget, Mechanic, SchoolMask,
    SpellAttributes, SpellEffectInfo, SpellEffectKind, SpellGroup, SpellInfo, SpellInterruptFlags,
    StackRule,
};

pub use crate::state::SpellId;

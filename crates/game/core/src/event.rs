//! Outbound notifications and inbound commands.
//!
//! The engine never talks to clients. It buffers [`CombatEvent`]s on the
//! world, and the runtime drains them after every tick and publishes them on
//! its event bus. [`UnitCommand`] is the inbound counterpart, one per player
//! or AI decision.

use crate::aura::{AuraRemoveMode, AuraType};
use crate::combat::{MeleeHitOutcome, SpellMissInfo};
use crate::error::CastError;
use crate::spell::{CurrentSpellType, SchoolMask, SpellTargets};
use crate::state::{AuraId, CastId, PowerType, SpellId, UnitId, WeaponAttackType};

/// Everything observers can learn about a fight.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CombatEvent {
    /// Result of a white swing.
    AttackStateUpdate {
        attacker: UnitId,
        victim: UnitId,
        attack_type: WeaponAttackType,
        outcome: MeleeHitOutcome,
        damage: u32,
        school: SchoolMask,
        absorbed: u32,
        resisted: u32,
        blocked: u32,
    },
    SpellDamageLog {
        caster: Option<UnitId>,
        target: UnitId,
        spell: SpellId,
        damage: u32,
        school: SchoolMask,
        absorbed: u32,
        resisted: u32,
        blocked: u32,
        critical: bool,
    },
    PeriodicAuraLog {
        target: UnitId,
        caster: Option<UnitId>,
        spell: SpellId,
        aura_type: AuraType,
        amount: u32,
        absorbed: u32,
        resisted: u32,
    },
    HealLog {
        healer: Option<UnitId>,
        target: UnitId,
        spell: Option<SpellId>,
        /// Nominal heal after heal absorbs.
        amount: u32,
        /// Health actually restored.
        gain: u32,
        overheal: u32,
        absorbed: u32,
        critical: bool,
    },
    Energize {
        caster: Option<UnitId>,
        target: UnitId,
        spell: SpellId,
        power_type: PowerType,
        amount: i32,
    },
    SpellMiss {
        caster: UnitId,
        target: UnitId,
        spell: SpellId,
        miss: SpellMissInfo,
    },
    AuraApplied {
        target: UnitId,
        aura: AuraId,
        spell: SpellId,
        caster: Option<UnitId>,
        slot: Option<u8>,
        stack: u8,
    },
    AuraRemoved {
        target: UnitId,
        aura: AuraId,
        spell: SpellId,
        mode: AuraRemoveMode,
    },
    AuraStackChanged {
        target: UnitId,
        aura: AuraId,
        spell: SpellId,
        stack: u8,
        charges: u8,
    },
    SpellStart {
        caster: UnitId,
        spell: SpellId,
        cast: CastId,
        cast_time_ms: u32,
    },
    SpellGo {
        caster: UnitId,
        spell: SpellId,
        cast: CastId,
        target: Option<UnitId>,
    },
    SpellFailure {
        caster: UnitId,
        spell: SpellId,
        reason: CastError,
    },
    SpellInterrupted {
        caster: UnitId,
        spell: SpellId,
        cast: CastId,
    },
    AttackStart {
        attacker: UnitId,
        victim: UnitId,
    },
    AttackStop {
        attacker: UnitId,
        victim: Option<UnitId>,
    },
    UnitDied {
        unit: UnitId,
        killer: Option<UnitId>,
    },
    /// A durability roll succeeded. `slot` is `None` for the all-items loss
    /// on death.
    DurabilityLoss {
        unit: UnitId,
        slot: Option<u8>,
    },
}

impl CombatEvent {
    /// Unit the event is primarily about, used for topic routing.
    pub fn subject(&self) -> UnitId {
        match self {
            Self::AttackStateUpdate { victim, .. } => *victim,
            Self::SpellDamageLog { target, .. }
            | Self::PeriodicAuraLog { target, .. }
            | Self::HealLog { target, .. }
            | Self::Energize { target, .. }
            | Self::SpellMiss { target, .. }
            | Self::AuraApplied { target, .. }
            | Self::AuraRemoved { target, .. }
            | Self::AuraStackChanged { target, .. } => *target,
            Self::SpellStart { caster, .. }
            | Self::SpellGo { caster, .. }
            | Self::SpellFailure { caster, .. }
            | Self::SpellInterrupted { caster, .. } => *caster,
            Self::AttackStart { attacker, .. } | Self::AttackStop { attacker, .. } => *attacker,
            Self::UnitDied { unit, .. } | Self::DurabilityLoss { unit, .. } => *unit,
        }
    }

    pub fn is_aura_event(&self) -> bool {
        matches!(
            self,
            Self::AuraApplied { .. } | Self::AuraRemoved { .. } | Self::AuraStackChanged { .. }
        )
    }

    pub fn is_cast_event(&self) -> bool {
        matches!(
            self,
            Self::SpellStart { .. }
                | Self::SpellGo { .. }
                | Self::SpellFailure { .. }
                | Self::SpellInterrupted { .. }
        )
    }
}

/// One request from a session or an AI controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitCommand {
    CastSpell {
        spell: SpellId,
        targets: SpellTargets,
    },
    AttackStart {
        target: UnitId,
    },
    AttackStop,
    InterruptCast {
        slot: CurrentSpellType,
    },
}

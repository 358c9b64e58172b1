//! Proc vocabulary: event flags, per-spell proc entries and event payloads.
//!
//! # Design
//!
//! Every combat event is described by a [`ProcEventInfo`]: who acted, who
//! was acted upon, which event flags fire on each side, and the hit result.
//! An aura can proc when its spell carries a [`ProcEntry`] whose masks match
//! the event. Dispatch itself lives in [`dispatch`].

pub mod dispatch;

use bitflags::bitflags;

pub use dispatch::ProcCandidate;

use crate::combat::{DamageInfo, HealInfo};
use crate::spell::SchoolMask;
use crate::state::{SpellId, UnitId, WeaponAttackType};

bitflags! {
    /// Combat events that can trigger procs, split by done/taken side.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ProcFlags: u32 {
        const KILLED = 0x0000_0001;
        const KILL = 0x0000_0002;
        const DONE_MELEE_AUTO_ATTACK = 0x0000_0004;
        const TAKEN_MELEE_AUTO_ATTACK = 0x0000_0008;
        const DONE_SPELL_MELEE_DMG_CLASS = 0x0000_0010;
        const TAKEN_SPELL_MELEE_DMG_CLASS = 0x0000_0020;
        const DONE_RANGED_AUTO_ATTACK = 0x0000_0040;
        const TAKEN_RANGED_AUTO_ATTACK = 0x0000_0080;
        const DONE_SPELL_RANGED_DMG_CLASS = 0x0000_0100;
        const TAKEN_SPELL_RANGED_DMG_CLASS = 0x0000_0200;
        const DONE_SPELL_NONE_DMG_CLASS_POS = 0x0000_0400;
        const TAKEN_SPELL_NONE_DMG_CLASS_POS = 0x0000_0800;
        const DONE_SPELL_NONE_DMG_CLASS_NEG = 0x0000_1000;
        const TAKEN_SPELL_NONE_DMG_CLASS_NEG = 0x0000_2000;
        const DONE_SPELL_MAGIC_DMG_CLASS_POS = 0x0000_4000;
        const TAKEN_SPELL_MAGIC_DMG_CLASS_POS = 0x0000_8000;
        const DONE_SPELL_MAGIC_DMG_CLASS_NEG = 0x0001_0000;
        const TAKEN_SPELL_MAGIC_DMG_CLASS_NEG = 0x0002_0000;
        const DONE_PERIODIC = 0x0004_0000;
        const TAKEN_PERIODIC = 0x0008_0000;
        const TAKEN_DAMAGE = 0x0010_0000;
        const DONE_MAINHAND_ATTACK = 0x0040_0000;
        const DONE_OFFHAND_ATTACK = 0x0080_0000;
        const DEATH = 0x0100_0000;

        const MELEE = Self::DONE_MELEE_AUTO_ATTACK.bits()
            | Self::TAKEN_MELEE_AUTO_ATTACK.bits()
            | Self::DONE_SPELL_MELEE_DMG_CLASS.bits()
            | Self::TAKEN_SPELL_MELEE_DMG_CLASS.bits()
            | Self::DONE_RANGED_AUTO_ATTACK.bits()
            | Self::TAKEN_RANGED_AUTO_ATTACK.bits()
            | Self::DONE_SPELL_RANGED_DMG_CLASS.bits()
            | Self::TAKEN_SPELL_RANGED_DMG_CLASS.bits();

        const DONE_HIT = Self::DONE_MELEE_AUTO_ATTACK.bits()
            | Self::DONE_RANGED_AUTO_ATTACK.bits()
            | Self::DONE_SPELL_MELEE_DMG_CLASS.bits()
            | Self::DONE_SPELL_RANGED_DMG_CLASS.bits()
            | Self::DONE_SPELL_NONE_DMG_CLASS_POS.bits()
            | Self::DONE_SPELL_NONE_DMG_CLASS_NEG.bits()
            | Self::DONE_SPELL_MAGIC_DMG_CLASS_POS.bits()
            | Self::DONE_SPELL_MAGIC_DMG_CLASS_NEG.bits()
            | Self::DONE_PERIODIC.bits()
            | Self::DONE_MAINHAND_ATTACK.bits()
            | Self::DONE_OFFHAND_ATTACK.bits();

        const TAKEN_HIT = Self::TAKEN_MELEE_AUTO_ATTACK.bits()
            | Self::TAKEN_RANGED_AUTO_ATTACK.bits()
            | Self::TAKEN_SPELL_MELEE_DMG_CLASS.bits()
            | Self::TAKEN_SPELL_RANGED_DMG_CLASS.bits()
            | Self::TAKEN_SPELL_NONE_DMG_CLASS_POS.bits()
            | Self::TAKEN_SPELL_NONE_DMG_CLASS_NEG.bits()
            | Self::TAKEN_SPELL_MAGIC_DMG_CLASS_POS.bits()
            | Self::TAKEN_SPELL_MAGIC_DMG_CLASS_NEG.bits()
            | Self::TAKEN_PERIODIC.bits()
            | Self::TAKEN_DAMAGE.bits();

        /// Events raised by a spell, where spell type and phase are checked.
        const REQ_SPELL_PHASE = Self::DONE_SPELL_MELEE_DMG_CLASS.bits()
            | Self::TAKEN_SPELL_MELEE_DMG_CLASS.bits()
            | Self::DONE_SPELL_RANGED_DMG_CLASS.bits()
            | Self::TAKEN_SPELL_RANGED_DMG_CLASS.bits()
            | Self::DONE_SPELL_NONE_DMG_CLASS_POS.bits()
            | Self::TAKEN_SPELL_NONE_DMG_CLASS_POS.bits()
            | Self::DONE_SPELL_NONE_DMG_CLASS_NEG.bits()
            | Self::TAKEN_SPELL_NONE_DMG_CLASS_NEG.bits()
            | Self::DONE_SPELL_MAGIC_DMG_CLASS_POS.bits()
            | Self::TAKEN_SPELL_MAGIC_DMG_CLASS_POS.bits()
            | Self::DONE_SPELL_MAGIC_DMG_CLASS_NEG.bits()
            | Self::TAKEN_SPELL_MAGIC_DMG_CLASS_NEG.bits()
            | Self::DONE_PERIODIC.bits()
            | Self::TAKEN_PERIODIC.bits();
    }
}

bitflags! {
    /// What the triggering spell did.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ProcSpellType: u8 {
        const DAMAGE = 0x1;
        const HEAL = 0x2;
        const NO_DMG_HEAL = 0x4;
        const MASK_ALL = 0x7;
    }
}

bitflags! {
    /// Stage of the triggering cast.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ProcSpellPhase: u8 {
        const CAST = 0x1;
        const HIT = 0x2;
        const FINISH = 0x4;
        const MASK_ALL = 0x7;
    }
}

bitflags! {
    /// Result of the triggering hit.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ProcHitMask: u32 {
        const NORMAL = 0x0001;
        const CRITICAL = 0x0002;
        const MISS = 0x0004;
        const FULL_RESIST = 0x0008;
        const DODGE = 0x0010;
        const PARRY = 0x0020;
        const BLOCK = 0x0040;
        const EVADE = 0x0080;
        const IMMUNE = 0x0100;
        const DEFLECT = 0x0200;
        const ABSORB = 0x0400;
        const REFLECT = 0x0800;
        const INTERRUPT = 0x1000;
        const FULL_BLOCK = 0x2000;
    }
}

bitflags! {
    /// Behavior switches of a proc entry.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ProcAttributes: u32 {
        /// Triggered spells may still proc this aura.
        const TRIGGERED_CAN_PROC = 0x02;
        /// Only spells with a power cost can proc this aura.
        const REQ_MANA_COST = 0x04;
        /// Consume stacks instead of charges.
        const USE_STACKS_FOR_CHARGES = 0x10;
        /// Chance drops by a thirtieth per level above 60.
        const REDUCE_PROC_60 = 0x80;
    }
}

/// Proc configuration of a spell.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ProcEntry {
    pub flags: ProcFlags,
    /// Empty matches any school.
    pub school_mask: SchoolMask,
    /// Empty matches any spell type.
    pub spell_type_mask: ProcSpellType,
    /// Empty means `HIT`.
    pub spell_phase_mask: ProcSpellPhase,
    /// Empty selects the side-dependent default.
    pub hit_mask: ProcHitMask,
    pub attributes: ProcAttributes,
    /// Procs per minute; when positive it replaces `chance`.
    pub procs_per_minute: f32,
    /// Percent chance.
    pub chance: f32,
    pub cooldown_ms: u32,
    /// Charges granted on application; zero keeps the spell's own.
    pub charges: u8,
}

impl Default for ProcEntry {
    fn default() -> Self {
        Self {
            flags: ProcFlags::empty(),
            school_mask: SchoolMask::empty(),
            spell_type_mask: ProcSpellType::empty(),
            spell_phase_mask: ProcSpellPhase::empty(),
            hit_mask: ProcHitMask::empty(),
            attributes: ProcAttributes::empty(),
            procs_per_minute: 0.0,
            chance: 100.0,
            cooldown_ms: 0,
            charges: 0,
        }
    }
}

impl ProcEntry {
    pub fn new(flags: ProcFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn with_chance(mut self, chance: f32) -> Self {
        self.chance = chance;
        self
    }

    pub fn with_ppm(mut self, procs_per_minute: f32) -> Self {
        self.procs_per_minute = procs_per_minute;
        self
    }

    pub fn with_cooldown(mut self, cooldown_ms: u32) -> Self {
        self.cooldown_ms = cooldown_ms;
        self
    }

    pub fn with_hit_mask(mut self, hit_mask: ProcHitMask) -> Self {
        self.hit_mask = hit_mask;
        self
    }

    pub fn with_spell_type(mut self, spell_type: ProcSpellType) -> Self {
        self.spell_type_mask = spell_type;
        self
    }

    pub fn with_phase(mut self, phase: ProcSpellPhase) -> Self {
        self.spell_phase_mask = phase;
        self
    }

    pub fn with_school(mut self, school: SchoolMask) -> Self {
        self.school_mask = school;
        self
    }

    pub fn with_attributes(mut self, attributes: ProcAttributes) -> Self {
        self.attributes |= attributes;
        self
    }
}

/// One combat event as seen by the proc system.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcEventInfo {
    pub actor: UnitId,
    pub action_target: Option<UnitId>,
    /// The other side of the event for the unit whose auras are scanned.
    pub proc_target: Option<UnitId>,
    pub type_mask: ProcFlags,
    pub spell_type: ProcSpellType,
    pub spell_phase: ProcSpellPhase,
    pub hit_mask: ProcHitMask,
    pub spell: Option<SpellId>,
    /// Spell was cast as a trigger of another effect.
    pub triggered: bool,
    pub school: SchoolMask,
    pub attack_type: WeaponAttackType,
    pub damage: Option<DamageInfo>,
    pub heal: Option<HealInfo>,
}

impl ProcEventInfo {
    pub fn new(actor: UnitId, action_target: Option<UnitId>, type_mask: ProcFlags) -> Self {
        Self {
            actor,
            action_target,
            proc_target: action_target,
            type_mask,
            spell_type: ProcSpellType::empty(),
            spell_phase: ProcSpellPhase::empty(),
            hit_mask: ProcHitMask::empty(),
            spell: None,
            triggered: false,
            school: SchoolMask::NORMAL,
            attack_type: WeaponAttackType::Base,
            damage: None,
            heal: None,
        }
    }
}

/// Everything a call to the dispatcher describes, for both sides.
#[derive(Clone, Debug, PartialEq)]
pub struct ProcTrigger {
    pub actor: UnitId,
    pub target: Option<UnitId>,
    pub type_mask_actor: ProcFlags,
    pub type_mask_target: ProcFlags,
    pub spell_type: ProcSpellType,
    pub spell_phase: ProcSpellPhase,
    pub hit_mask: ProcHitMask,
    pub spell: Option<SpellId>,
    pub triggered: bool,
    pub school: SchoolMask,
    pub attack_type: WeaponAttackType,
    pub damage: Option<DamageInfo>,
    pub heal: Option<HealInfo>,
}

impl ProcTrigger {
    pub fn new(actor: UnitId, target: Option<UnitId>) -> Self {
        Self {
            actor,
            target,
            type_mask_actor: ProcFlags::empty(),
            type_mask_target: ProcFlags::empty(),
            spell_type: ProcSpellType::empty(),
            spell_phase: ProcSpellPhase::empty(),
            hit_mask: ProcHitMask::empty(),
            spell: None,
            triggered: false,
            school: SchoolMask::NORMAL,
            attack_type: WeaponAttackType::Base,
            damage: None,
            heal: None,
        }
    }

    pub fn with_flags(mut self, actor: ProcFlags, target: ProcFlags) -> Self {
        self.type_mask_actor = actor;
        self.type_mask_target = target;
        self
    }

    pub fn with_spell(
        mut self,
        spell: SpellId,
        spell_type: ProcSpellType,
        spell_phase: ProcSpellPhase,
        triggered: bool,
    ) -> Self {
        self.spell = Some(spell);
        self.spell_type = spell_type;
        self.spell_phase = spell_phase;
        self.triggered = triggered;
        self
    }

    pub fn with_hit(mut self, hit_mask: ProcHitMask) -> Self {
        self.hit_mask = hit_mask;
        self
    }

    pub fn with_school(mut self, school: SchoolMask) -> Self {
        self.school = school;
        self
    }

    pub fn with_attack_type(mut self, attack_type: WeaponAttackType) -> Self {
        self.attack_type = attack_type;
        self
    }

    pub fn with_damage(mut self, damage: DamageInfo) -> Self {
        self.damage = Some(damage);
        self
    }

    pub fn with_heal(mut self, heal: HealInfo) -> Self {
        self.heal = Some(heal);
        self
    }

    /// Event as seen by the unit at `actor_side` (true: the actor).
    pub(crate) fn event_for(&self, actor_side: bool) -> ProcEventInfo {
        ProcEventInfo {
            actor: self.actor,
            action_target: self.target,
            proc_target: if actor_side { self.target } else { Some(self.actor) },
            type_mask: if actor_side {
                self.type_mask_actor
            } else {
                self.type_mask_target
            },
            spell_type: self.spell_type,
            spell_phase: self.spell_phase,
            hit_mask: self.hit_mask,
            spell: self.spell,
            triggered: self.triggered,
            school: self.school,
            attack_type: self.attack_type,
            damage: self.damage,
            heal: self.heal,
        }
    }
}

/// Flags for the done/taken pair of a spell hit, by damage class and polarity.
pub fn spell_proc_flags(
    dmg_class: crate::spell::DamageClass,
    positive: bool,
) -> (ProcFlags, ProcFlags) {
    use crate::spell::DamageClass;
    match (dmg_class, positive) {
        (DamageClass::Melee, _) => (
            ProcFlags::DONE_SPELL_MELEE_DMG_CLASS,
            ProcFlags::TAKEN_SPELL_MELEE_DMG_CLASS,
        ),
        (DamageClass::Ranged, _) => (
            ProcFlags::DONE_SPELL_RANGED_DMG_CLASS,
            ProcFlags::TAKEN_SPELL_RANGED_DMG_CLASS,
        ),
        (DamageClass::Magic, true) => (
            ProcFlags::DONE_SPELL_MAGIC_DMG_CLASS_POS,
            ProcFlags::TAKEN_SPELL_MAGIC_DMG_CLASS_POS,
        ),
        (DamageClass::Magic, false) => (
            ProcFlags::DONE_SPELL_MAGIC_DMG_CLASS_NEG,
            ProcFlags::TAKEN_SPELL_MAGIC_DMG_CLASS_NEG,
        ),
        (DamageClass::None, true) => (
            ProcFlags::DONE_SPELL_NONE_DMG_CLASS_POS,
            ProcFlags::TAKEN_SPELL_NONE_DMG_CLASS_POS,
        ),
        (DamageClass::None, false) => (
            ProcFlags::DONE_SPELL_NONE_DMG_CLASS_NEG,
            ProcFlags::TAKEN_SPELL_NONE_DMG_CLASS_NEG,
        ),
    }
}

//! Static spell definitions.
//!
//! A [`SpellInfo`] is the immutable description of a spell as served by the
//! [`crate::env::SpellOracle`]. The engine never mutates one; per-cast and
//! per-aura state lives in [`super::SpellCast`] and [`crate::aura::Aura`].

use arrayvec::ArrayVec;
use bitflags::bitflags;
use strum::{Display, EnumCount, EnumIter};

use crate::aura::{AuraState, AuraType};
use crate::config::CombatConfig;
use crate::proc::ProcEntry;
use crate::state::{PowerType, SpellId};

bitflags! {
    /// Damage schools a spell or effect belongs to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SchoolMask: u8 {
        const NORMAL = 0x01;
        const HOLY = 0x02;
        const FIRE = 0x04;
        const NATURE = 0x08;
        const FROST = 0x10;
        const SHADOW = 0x20;
        const ARCANE = 0x40;

        const SPELL = Self::FIRE.bits() | Self::NATURE.bits() | Self::FROST.bits()
            | Self::SHADOW.bits() | Self::ARCANE.bits();
        const MAGIC = Self::HOLY.bits() | Self::SPELL.bits();
        const ALL = Self::NORMAL.bits() | Self::MAGIC.bits();
    }
}

impl SchoolMask {
    /// Number of distinct schools, and the length of per-school arrays.
    pub const COUNT: usize = 7;

    /// Indices (0 = physical .. 6 = arcane) of the schools in this mask.
    pub fn school_indices(self) -> impl Iterator<Item = usize> {
        (0..Self::COUNT).filter(move |i| self.bits() & (1 << i) != 0)
    }

    /// True if armor applies to damage of this mask.
    pub fn is_physical(self) -> bool {
        self.contains(SchoolMask::NORMAL)
    }
}

bitflags! {
    /// Behavioral switches on a spell definition.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SpellAttributes: u64 {
        /// Always-on aura, survives death, not shown.
        const PASSIVE = 1 << 0;
        /// Occupies the channeled slot; effects last while channeling.
        const CHANNELED = 1 << 1;
        /// Occupies the autorepeat slot (wand, auto shot).
        const AUTOREPEAT = 1 << 2;
        /// Replaces the next main-hand swing (melee slot).
        const ON_NEXT_SWING = 1 << 3;
        /// Aura is kept through the on-death removal pass.
        const DEATH_PERSISTENT = 1 << 4;
        /// Same spell from different casters coexists on one target.
        const STACK_FOR_DIFF_CASTERS = 1 << 5;
        /// A caster may have this aura active on one target only.
        const SINGLE_TARGET = 1 << 6;
        /// Done-side damage/heal bonuses do not apply.
        const NO_DONE_BONUS = 1 << 7;
        /// Resistance rolls are skipped.
        const IGNORE_RESISTANCES = 1 << 8;
        /// Hit tables are skipped after immunity/reflect checks.
        const IGNORE_HIT_RESULT = 1 << 9;
        /// Cannot be dodged, parried or blocked.
        const IMPOSSIBLE_DODGE_PARRY_BLOCK = 1 << 10;
        /// Melee-class spell that may be blocked.
        const BLOCKABLE = 1 << 11;
        /// Resisted fully or not at all.
        const BINARY = 1 << 12;
        /// Never crits.
        const CANT_CRIT = 1 << 13;
        /// Never reflected.
        const CANT_REFLECT = 1 << 14;
        /// Procs are suppressed while this spell (or aura) is processing.
        const DISABLE_PROC = 1 << 15;
        /// Triggered casts of this spell may still trigger procs.
        const TRIGGERED_CAN_PROC = 1 << 16;
        /// Damage from this spell does not delay the victim's casts.
        const NO_PUSHBACK = 1 << 17;
        /// Damage from this spell does not strip take-damage interruptible auras.
        const DAMAGE_DOESNT_BREAK_AURAS = 1 << 18;
        /// Fear from this spell is not broken by damage.
        const NO_DAMAGE_FEAR_BREAK = 1 << 19;
        /// May be cast while dead.
        const CASTABLE_WHILE_DEAD = 1 << 20;
        /// May be cast while stunned.
        const CASTABLE_WHILE_STUNNED = 1 << 21;
        /// May target dead units.
        const ALLOW_DEAD_TARGET = 1 << 22;
        /// Refreshing does not reset the duration.
        const NO_DURATION_REFRESH = 1 << 23;
    }
}

bitflags! {
    /// Events that cancel an in-progress cast.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SpellInterruptFlags: u32 {
        const MOVEMENT = 0x01;
        const PUSHBACK = 0x02;
        const INTERRUPT = 0x08;
        const ABORT_ON_DMG = 0x10;
    }
}

bitflags! {
    /// Events that remove an aura (or stop a channel) on its target.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct AuraInterruptFlags: u32 {
        const HIT_BY_SPELL = 0x0000_0001;
        const TAKE_DAMAGE = 0x0000_0002;
        const CAST = 0x0000_0004;
        const MOVE = 0x0000_0008;
        const MELEE_ATTACK = 0x0000_1000;
        const SPELL_ATTACK = 0x0000_2000;
        const DIRECT_DAMAGE = 0x0100_0000;
        const LEAVE_COMBAT = 0x8000_0000;
    }
}

/// How a spell's damage is resolved against avoidance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DamageClass {
    #[default]
    None,
    Magic,
    Melee,
    Ranged,
}

/// Crowd-control family of an effect, used by immunities and resist auras.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Mechanic {
    #[default]
    None = 0,
    Charm = 1,
    Disoriented = 2,
    Disarm = 3,
    Fear = 5,
    Root = 7,
    Silence = 9,
    Sleep = 10,
    Snare = 11,
    Stun = 12,
    Freeze = 13,
    Bleed = 15,
    Polymorph = 17,
    Banish = 18,
    Shield = 19,
    Interrupt = 26,
    Daze = 27,
}

impl Mechanic {
    /// Bit used by mechanic-mask aura misc values.
    pub const fn mask(self) -> i32 {
        if matches!(self, Mechanic::None) {
            0
        } else {
            1 << (self as u8)
        }
    }
}

/// Dispel category of an aura.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DispelType {
    #[default]
    None = 0,
    Magic = 1,
    Curse = 2,
    Disease = 3,
    Poison = 4,
    Stealth = 5,
    Invisibility = 6,
    All = 7,
    Enrage = 9,
}

impl DispelType {
    /// Misc value used by dispel effects and debuff-resistance auras.
    pub const fn as_misc(self) -> i32 {
        self as u8 as i32
    }

    pub fn from_misc(value: i32) -> Self {
        match value {
            1 => Self::Magic,
            2 => Self::Curse,
            3 => Self::Disease,
            4 => Self::Poison,
            5 => Self::Stealth,
            6 => Self::Invisibility,
            7 => Self::All,
            9 => Self::Enrage,
            _ => Self::None,
        }
    }
}

/// Stacking rule shared by every spell of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackRule {
    /// Members coexist freely.
    #[default]
    Default,
    /// Only one member of the group may be on a target.
    Exclusive,
    /// Only one member per caster may be on a target.
    ExclusiveFromSameCaster,
    /// Members coexist; aggregate queries count only the strongest.
    ExclusiveSameEffect,
    /// Only the strongest member survives; a weaker newcomer is dropped.
    ExclusiveHighest,
}

/// Membership of a spell in a stacking group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpellGroup {
    pub id: u32,
    pub rule: StackRule,
}

/// What an effect does when the spell lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumCount)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpellEffectKind {
    #[default]
    None,
    SchoolDamage,
    WeaponDamage,
    WeaponPercentDamage,
    Heal,
    ApplyAura,
    ApplyAreaAuraFriend,
    ApplyAreaAuraEnemy,
    TriggerSpell,
    Energize,
    AddExtraAttacks,
    Dispel,
    InterruptCast,
    Dummy,
}

impl SpellEffectKind {
    pub const fn is_aura(self) -> bool {
        matches!(
            self,
            Self::ApplyAura | Self::ApplyAreaAuraFriend | Self::ApplyAreaAuraEnemy
        )
    }

    pub const fn is_area_aura(self) -> bool {
        matches!(self, Self::ApplyAreaAuraFriend | Self::ApplyAreaAuraEnemy)
    }

    pub const fn is_damage(self) -> bool {
        matches!(
            self,
            Self::SchoolDamage | Self::WeaponDamage | Self::WeaponPercentDamage
        )
    }
}

/// Who an effect lands on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectTarget {
    /// The cast's explicit target.
    #[default]
    Target,
    /// The caster.
    Caster,
}

/// One of up to three effects of a spell.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpellEffectInfo {
    pub kind: SpellEffectKind,
    pub aura: Option<AuraType>,
    pub base_points: i32,
    /// Variance added to `base_points`, rolled in `0..=die_sides`.
    pub die_sides: u32,
    pub misc_value: i32,
    pub amplitude_ms: u32,
    pub trigger_spell: Option<SpellId>,
    pub radius: f32,
    /// Share of the caster's spell power (or attack power for weapon effects)
    /// added as done bonus.
    pub bonus_coefficient: f32,
    /// Resource spent per point of effect, e.g. mana per damage absorbed by a
    /// mana shield. Zero means one.
    pub value_multiplier: f32,
    pub mechanic: Mechanic,
    pub target: EffectTarget,
    /// Restricts a modifier aura to one spell; `None` affects every spell.
    pub affected_spell: Option<SpellId>,
}

impl Default for SpellEffectInfo {
    fn default() -> Self {
        Self {
            kind: SpellEffectKind::None,
            aura: None,
            base_points: 0,
            die_sides: 0,
            misc_value: 0,
            amplitude_ms: 0,
            trigger_spell: None,
            radius: 0.0,
            bonus_coefficient: 0.0,
            value_multiplier: 0.0,
            mechanic: Mechanic::None,
            target: EffectTarget::Target,
            affected_spell: None,
        }
    }
}

impl SpellEffectInfo {
    pub fn new(kind: SpellEffectKind, base_points: i32) -> Self {
        Self {
            kind,
            base_points,
            ..Self::default()
        }
    }

    /// An aura-applying effect.
    pub fn aura(aura: AuraType, base_points: i32) -> Self {
        Self {
            kind: SpellEffectKind::ApplyAura,
            aura: Some(aura),
            base_points,
            ..Self::default()
        }
    }

    pub fn with_misc(mut self, misc_value: i32) -> Self {
        self.misc_value = misc_value;
        self
    }

    pub fn with_amplitude(mut self, amplitude_ms: u32) -> Self {
        self.amplitude_ms = amplitude_ms;
        self
    }

    pub fn with_trigger(mut self, spell: SpellId) -> Self {
        self.trigger_spell = Some(spell);
        self
    }

    pub fn with_die_sides(mut self, die_sides: u32) -> Self {
        self.die_sides = die_sides;
        self
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_coefficient(mut self, coefficient: f32) -> Self {
        self.bonus_coefficient = coefficient;
        self
    }

    pub fn with_mechanic(mut self, mechanic: Mechanic) -> Self {
        self.mechanic = mechanic;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f32) -> Self {
        self.value_multiplier = multiplier;
        self
    }

    pub fn on_caster(mut self) -> Self {
        self.target = EffectTarget::Caster;
        self
    }

    pub fn affecting(mut self, spell: SpellId) -> Self {
        self.affected_spell = Some(spell);
        self
    }
}

/// Immutable definition of a spell.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpellInfo {
    pub id: SpellId,
    pub name: String,
    pub school: SchoolMask,
    pub dmg_class: DamageClass,
    pub attributes: SpellAttributes,
    pub mechanic: Mechanic,
    pub dispel: DispelType,

    pub cast_time_ms: u32,
    /// Aura or channel duration; `None` is permanent.
    pub duration_ms: Option<u32>,
    pub recovery_ms: u32,
    pub category: u32,
    pub category_recovery_ms: u32,

    pub power_type: PowerType,
    pub power_cost: u32,
    /// Maximum cast range; zero means unlimited.
    pub range_max: f32,
    /// Projectile speed in yards per second; zero lands instantly.
    pub speed: f32,

    pub max_stack: u8,
    pub proc_charges: u8,
    pub spell_level: u8,
    pub max_level: u8,

    pub stack_group: Option<SpellGroup>,
    pub interrupt_flags: SpellInterruptFlags,
    pub aura_interrupt_flags: AuraInterruptFlags,
    pub channel_interrupt_flags: AuraInterruptFlags,

    pub caster_aura_state: Option<AuraState>,
    pub target_aura_state: Option<AuraState>,
    /// State raised on the target while this aura is applied.
    pub aura_state: Option<AuraState>,

    /// Higher values are consumed first among absorb shields.
    pub absorb_priority: i32,
    pub positive: bool,
    pub proc: Option<ProcEntry>,
    pub effects: ArrayVec<SpellEffectInfo, { CombatConfig::MAX_SPELL_EFFECTS }>,
}

impl Default for SpellInfo {
    fn default() -> Self {
        Self::new(SpellId(0), "")
    }
}

impl SpellInfo {
    pub fn new(id: SpellId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            school: SchoolMask::NORMAL,
            dmg_class: DamageClass::None,
            attributes: SpellAttributes::empty(),
            mechanic: Mechanic::None,
            dispel: DispelType::None,
            cast_time_ms: 0,
            duration_ms: None,
            recovery_ms: 0,
            category: 0,
            category_recovery_ms: 0,
            power_type: PowerType::Mana,
            power_cost: 0,
            range_max: 0.0,
            speed: 0.0,
            max_stack: 0,
            proc_charges: 0,
            spell_level: 0,
            max_level: 0,
            stack_group: None,
            interrupt_flags: SpellInterruptFlags::empty(),
            aura_interrupt_flags: AuraInterruptFlags::empty(),
            channel_interrupt_flags: AuraInterruptFlags::empty(),
            caster_aura_state: None,
            target_aura_state: None,
            aura_state: None,
            absorb_priority: 0,
            positive: false,
            proc: None,
            effects: ArrayVec::new(),
        }
    }

    // ===== builder helpers =====

    /// Appends an effect. Effects beyond the third are dropped.
    pub fn with_effect(mut self, effect: SpellEffectInfo) -> Self {
        let _ = self.effects.try_push(effect);
        self
    }

    pub fn with_school(mut self, school: SchoolMask) -> Self {
        self.school = school;
        self
    }

    pub fn with_dmg_class(mut self, dmg_class: DamageClass) -> Self {
        self.dmg_class = dmg_class;
        self
    }

    pub fn with_attributes(mut self, attributes: SpellAttributes) -> Self {
        self.attributes |= attributes;
        self
    }

    pub fn with_duration(mut self, duration_ms: u32) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_cast_time(mut self, cast_time_ms: u32) -> Self {
        self.cast_time_ms = cast_time_ms;
        self
    }

    pub fn with_max_stack(mut self, max_stack: u8) -> Self {
        self.max_stack = max_stack;
        self
    }

    pub fn with_charges(mut self, charges: u8) -> Self {
        self.proc_charges = charges;
        self
    }

    pub fn with_stack_group(mut self, id: u32, rule: StackRule) -> Self {
        self.stack_group = Some(SpellGroup { id, rule });
        self
    }

    pub fn with_proc(mut self, proc: ProcEntry) -> Self {
        self.proc = Some(proc);
        self
    }

    pub fn with_power_cost(mut self, power_type: PowerType, cost: u32) -> Self {
        self.power_type = power_type;
        self.power_cost = cost;
        self
    }

    pub fn with_mechanic(mut self, mechanic: Mechanic) -> Self {
        self.mechanic = mechanic;
        self
    }

    pub fn with_dispel(mut self, dispel: DispelType) -> Self {
        self.dispel = dispel;
        self
    }

    pub fn with_aura_interrupt_flags(mut self, flags: AuraInterruptFlags) -> Self {
        self.aura_interrupt_flags = flags;
        self
    }

    pub fn with_recovery(mut self, recovery_ms: u32) -> Self {
        self.recovery_ms = recovery_ms;
        self
    }

    pub fn with_absorb_priority(mut self, priority: i32) -> Self {
        self.absorb_priority = priority;
        self
    }

    pub fn positive(mut self) -> Self {
        self.positive = true;
        self
    }

    // ===== queries =====

    pub fn has_attribute(&self, attribute: SpellAttributes) -> bool {
        self.attributes.contains(attribute)
    }

    pub fn is_passive(&self) -> bool {
        self.has_attribute(SpellAttributes::PASSIVE)
    }

    pub fn is_channeled(&self) -> bool {
        self.has_attribute(SpellAttributes::CHANNELED)
    }

    pub fn is_autorepeat(&self) -> bool {
        self.has_attribute(SpellAttributes::AUTOREPEAT)
    }

    pub fn is_next_melee_swing(&self) -> bool {
        self.has_attribute(SpellAttributes::ON_NEXT_SWING)
    }

    pub fn is_death_persistent(&self) -> bool {
        self.has_attribute(SpellAttributes::DEATH_PERSISTENT)
    }

    pub fn is_single_target(&self) -> bool {
        self.has_attribute(SpellAttributes::SINGLE_TARGET)
    }

    /// Charges an aura of this spell starts with, and is reset to on
    /// refresh: the larger of the proc entry's and the spell's own.
    pub fn initial_charges(&self) -> u8 {
        self.proc.as_ref().map_or(0, |p| p.charges).max(self.proc_charges)
    }

    pub fn effect(&self, index: usize) -> Option<&SpellEffectInfo> {
        self.effects.get(index)
    }

    /// Indices of effects that create an aura.
    pub fn aura_effect_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.effects
            .iter()
            .enumerate()
            .filter(|(_, e)| e.kind.is_aura())
            .map(|(i, _)| i)
    }

    pub fn has_aura_effect(&self) -> bool {
        self.aura_effect_indices().next().is_some()
    }

    pub fn has_damage_effect(&self) -> bool {
        self.effects.iter().any(|e| {
            e.kind.is_damage()
                || matches!(
                    e.aura,
                    Some(AuraType::PeriodicDamage | AuraType::ProcTriggerDamage)
                )
        })
    }

    pub fn has_effect(&self, kind: SpellEffectKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    pub fn has_aura(&self, aura: AuraType) -> bool {
        self.effects.iter().any(|e| e.aura == Some(aura))
    }

    /// Mechanic of an effect, falling back to the spell's own mechanic.
    pub fn effect_mechanic(&self, index: usize) -> Mechanic {
        match self.effects.get(index) {
            Some(effect) if effect.mechanic != Mechanic::None => effect.mechanic,
            _ => self.mechanic,
        }
    }

    /// Mask of every mechanic this spell carries.
    pub fn all_mechanics_mask(&self) -> i32 {
        let mut mask = self.mechanic.mask();
        for effect in &self.effects {
            mask |= effect.mechanic.mask();
        }
        mask
    }

    /// True if both spells belong to the same stacking group.
    pub fn shares_group_with(&self, other: &SpellInfo) -> Option<StackRule> {
        match (self.stack_group, other.stack_group) {
            (Some(a), Some(b)) if a.id == b.id => Some(a.rule),
            _ => None,
        }
    }

    pub fn is_reflectable(&self) -> bool {
        self.dmg_class == DamageClass::Magic
            && !self.positive
            && !self.has_attribute(SpellAttributes::CANT_REFLECT)
            && !self.is_passive()
    }

    /// Spell-power coefficient penalty for low-level spells cast by
    /// high-level units.
    pub fn level_penalty(&self, caster_level: u8) -> f32 {
        if self.spell_level == 0 || (self.max_level != 0 && self.spell_level >= self.max_level) {
            return 1.0;
        }
        let mut penalty = 0.0;
        if self.spell_level < 20 {
            penalty = (20.0 - f32::from(self.spell_level)) * 3.75;
        }
        let factor =
            ((f32::from(self.spell_level) + 6.0) / f32::from(caster_level.max(1))).min(1.0);
        (factor * (100.0 - penalty) / 100.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proc::ProcFlags;

    #[test]
    fn school_indices_walk_the_mask() {
        let mask = SchoolMask::NORMAL | SchoolMask::FROST;
        assert_eq!(mask.school_indices().collect::<Vec<_>>(), vec![0, 4]);
        assert!(SchoolMask::MAGIC.intersects(SchoolMask::FIRE));
        assert!(!SchoolMask::MAGIC.is_physical());
    }

    #[test]
    fn level_penalty_scales_low_rank_spells() {
        let spell = SpellInfo {
            spell_level: 10,
            max_level: 20,
            ..SpellInfo::new(SpellId(1), "Low rank")
        };
        // (10 + 6) / 60 * (100 - 37.5)%
        let penalty = spell.level_penalty(60);
        assert!((penalty - 0.1666).abs() < 0.001);

        let unranked = SpellInfo::new(SpellId(2), "No level");
        assert_eq!(unranked.level_penalty(80), 1.0);
    }

    #[test]
    fn group_rules_require_same_group() {
        let a = SpellInfo::new(SpellId(1), "A").with_stack_group(7, StackRule::Exclusive);
        let b = SpellInfo::new(SpellId(2), "B").with_stack_group(7, StackRule::Exclusive);
        let c = SpellInfo::new(SpellId(3), "C").with_stack_group(8, StackRule::Exclusive);
        assert_eq!(a.shares_group_with(&b), Some(StackRule::Exclusive));
        assert_eq!(a.shares_group_with(&c), None);
    }

    #[test]
    fn initial_charges_take_the_larger_source() {
        let plain = SpellInfo::new(SpellId(1), "Plain");
        assert_eq!(plain.initial_charges(), 0);

        let entry = ProcEntry {
            charges: 2,
            ..ProcEntry::new(ProcFlags::DONE_MELEE_AUTO_ATTACK)
        };
        let from_entry = SpellInfo::new(SpellId(2), "Entry").with_proc(entry.clone());
        assert_eq!(from_entry.initial_charges(), 2);

        let both = SpellInfo::new(SpellId(3), "Both").with_proc(entry).with_charges(5);
        assert_eq!(both.initial_charges(), 5);
    }
}

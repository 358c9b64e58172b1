//! Aura vocabulary: modifier types, removal reasons, aura states.

use bitflags::bitflags;
use strum::{Display, EnumIter};

/// Modifier type of an aura effect.
///
/// The effect store indexes applied effects by this type; every aggregate
/// query names one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuraType {
    Dummy,

    // periodic
    PeriodicDamage,
    PeriodicHeal,
    PeriodicEnergize,
    PeriodicTriggerSpell,

    // damage and healing modifiers (misc value = school mask)
    ModDamageDone,
    ModDamagePercentDone,
    ModDamageTaken,
    ModDamagePercentTaken,
    ModHealingDone,
    ModHealingDonePercent,
    ModHealingPct,
    ModCritDamageBonus,

    // shields
    SchoolAbsorb,
    ManaShield,
    SchoolHealAbsorb,
    SplitDamagePct,

    // mitigation
    ModResistance,
    ModTargetResistance,
    BypassArmorForCaster,
    ModArmorPenetrationPct,

    // hit table
    ModDodgePercent,
    ModParryPercent,
    ModBlockPercent,
    ModCritPercent,
    ModSpellCritChance,
    ModHitChance,
    ModSpellHitChance,
    ModAttackerMeleeHitChance,
    ModAttackerSpellHitChance,
    ModExpertise,
    ModMechanicResistance,
    ModDebuffResistance,
    DeflectSpells,
    ReflectSpells,
    IgnoreHitDirection,

    // control
    ModStun,
    ModFear,
    ModRoot,
    ModSilence,

    // immunities
    SchoolImmunity,
    MechanicImmunity,
    DamageImmunity,

    // stats
    ModIncreaseHealth,
    ModIncreaseHealthPercent,
    ModMeleeHaste,
    ModAttackPower,
    ModRageFromDamageDealt,

    // procs
    ProcTriggerSpell,
    ProcTriggerDamage,
}

impl AuraType {
    pub const fn is_periodic(self) -> bool {
        matches!(
            self,
            Self::PeriodicDamage
                | Self::PeriodicHeal
                | Self::PeriodicEnergize
                | Self::PeriodicTriggerSpell
        )
    }

    /// Types whose apply/remove changes cached unit stats.
    pub const fn affects_stats(self) -> bool {
        matches!(
            self,
            Self::ModResistance
                | Self::ModIncreaseHealth
                | Self::ModIncreaseHealthPercent
                | Self::ModMeleeHaste
                | Self::ModAttackPower
        )
    }

    /// Types that take control of the unit away from it.
    pub const fn is_loss_of_control(self) -> bool {
        matches!(self, Self::ModStun | Self::ModFear)
    }
}

/// Why an aura application goes away.
///
/// Threaded through every removal because some removal handlers behave
/// differently per reason.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AuraRemoveMode {
    Default,
    /// Removed by an aura interrupt flag.
    Interrupt,
    /// Cancelled by its owner.
    Cancel,
    /// Dispelled or consumed by a hostile spell (shields used up).
    EnemySpell,
    /// Ran out of duration or charges.
    Expire,
    Death,
    /// Explicitly removed by a hostile unit.
    ByEnemy,
    /// Replaced by an aura it cannot stack with.
    Stack,
}

/// Unit-level condition bits that spells can require.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum AuraState {
    Defense = 1,
    Healthless20Percent = 2,
    Berserking = 3,
    Frozen = 4,
    Judgement = 5,
    HunterParry = 7,
    VictoryRush = 10,
    FaerieFire = 12,
    Healthless35Percent = 13,
    Conflagrate = 14,
    Swiftmend = 15,
    DeadlyPoison = 16,
    Enrage = 17,
    Bleeding = 18,
    HealthAbove75Percent = 23,
}

impl AuraState {
    pub const fn bit(self) -> u32 {
        1 << (self as u8 - 1)
    }
}

bitflags! {
    /// Set of effect slots of an aura.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct EffectMask: u8 {
        const EFFECT_0 = 0x1;
        const EFFECT_1 = 0x2;
        const EFFECT_2 = 0x4;
    }
}

impl EffectMask {
    pub fn from_index(index: usize) -> Self {
        Self::from_bits_truncate(1 << index)
    }

    pub fn has_index(self, index: usize) -> bool {
        index < 3 && self.contains(Self::from_index(index))
    }

    /// Effect indices in slot order.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..3).filter(move |i| self.bits() & (1 << i) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effect_mask_iterates_in_slot_order() {
        let mask = EffectMask::EFFECT_2 | EffectMask::EFFECT_0;
        assert_eq!(mask.indices().collect::<Vec<_>>(), vec![0, 2]);
        assert!(mask.has_index(2));
        assert!(!mask.has_index(1));
    }

    #[test]
    fn aura_state_bits_are_distinct() {
        assert_eq!(AuraState::Defense.bit(), 1);
        assert_eq!(AuraState::Healthless20Percent.bit(), 2);
        assert_eq!(AuraState::HealthAbove75Percent.bit(), 1 << 22);
    }
}

//! Per-attack value objects.

use super::{DamageEffectType, MeleeHitOutcome};
use crate::proc::{ProcFlags, ProcHitMask};
use crate::spell::SchoolMask;
use crate::state::{SpellId, UnitId, WeaponAttackType};

/// Mitigation ledger of one damage event.
///
/// Created with the post-crit amount as `original`. Every mitigation stage
/// moves value from `damage` into exactly one bucket, so
/// `absorbed + resisted + blocked + damage == original` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageInfo {
    pub attacker: Option<UnitId>,
    pub victim: UnitId,
    pub spell: Option<SpellId>,
    pub school: SchoolMask,
    pub damage_type: DamageEffectType,
    pub attack_type: WeaponAttackType,
    pub hit_mask: ProcHitMask,
    original: u32,
    damage: u32,
    absorbed: u32,
    resisted: u32,
    blocked: u32,
}

impl DamageInfo {
    pub fn new(
        attacker: Option<UnitId>,
        victim: UnitId,
        amount: u32,
        spell: Option<SpellId>,
        school: SchoolMask,
        damage_type: DamageEffectType,
        attack_type: WeaponAttackType,
    ) -> Self {
        Self {
            attacker,
            victim,
            spell,
            school,
            damage_type,
            attack_type,
            hit_mask: ProcHitMask::empty(),
            original: amount,
            damage: amount,
            absorbed: 0,
            resisted: 0,
            blocked: 0,
        }
    }

    pub fn original(&self) -> u32 {
        self.original
    }

    /// Damage still to be dealt.
    pub fn damage(&self) -> u32 {
        self.damage
    }

    pub fn absorbed(&self) -> u32 {
        self.absorbed
    }

    pub fn resisted(&self) -> u32 {
        self.resisted
    }

    pub fn blocked(&self) -> u32 {
        self.blocked
    }

    /// Moves up to `amount` into the absorbed bucket. Returns what moved.
    pub fn absorb(&mut self, amount: u32) -> u32 {
        let amount = amount.min(self.damage);
        self.damage -= amount;
        self.absorbed += amount;
        if amount > 0 {
            self.hit_mask |= ProcHitMask::ABSORB;
        }
        amount
    }

    pub fn resist(&mut self, amount: u32) -> u32 {
        let amount = amount.min(self.damage);
        self.damage -= amount;
        self.resisted += amount;
        if self.damage == 0 && amount > 0 {
            self.hit_mask |= ProcHitMask::FULL_RESIST;
        }
        amount
    }

    pub fn block(&mut self, amount: u32) -> u32 {
        let amount = amount.min(self.damage);
        self.damage -= amount;
        self.blocked += amount;
        if amount > 0 {
            self.hit_mask |= ProcHitMask::BLOCK;
            if self.damage == 0 {
                self.hit_mask |= ProcHitMask::FULL_BLOCK;
            }
        }
        amount
    }

    /// Total taken out of `original` by mitigation.
    pub fn mitigated(&self) -> u32 {
        self.absorbed + self.resisted + self.blocked
    }

    pub fn ledger_holds(&self) -> bool {
        u64::from(self.mitigated()) + u64::from(self.damage) == u64::from(self.original)
    }
}

/// One heal, nominal and effective.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealInfo {
    pub healer: Option<UnitId>,
    pub target: UnitId,
    pub spell: Option<SpellId>,
    pub school: SchoolMask,
    pub critical: bool,
    original: u32,
    heal: u32,
    absorbed: u32,
    effective: u32,
}

impl HealInfo {
    pub fn new(
        healer: Option<UnitId>,
        target: UnitId,
        amount: u32,
        spell: Option<SpellId>,
        school: SchoolMask,
    ) -> Self {
        Self {
            healer,
            target,
            spell,
            school,
            critical: false,
            original: amount,
            heal: amount,
            absorbed: 0,
            effective: 0,
        }
    }

    /// Heal as computed, before heal absorbs.
    pub fn original(&self) -> u32 {
        self.original
    }

    /// Heal remaining after heal absorbs.
    pub fn heal(&self) -> u32 {
        self.heal
    }

    pub fn absorbed(&self) -> u32 {
        self.absorbed
    }

    /// Health actually restored.
    pub fn effective(&self) -> u32 {
        self.effective
    }

    pub fn overheal(&self) -> u32 {
        self.heal - self.effective
    }

    pub fn absorb(&mut self, amount: u32) -> u32 {
        let amount = amount.min(self.heal);
        self.heal -= amount;
        self.absorbed += amount;
        amount
    }

    pub(crate) fn set_effective(&mut self, gain: u32) {
        self.effective = gain.min(self.heal);
    }
}

/// Pre-mitigation result of a white swing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalcDamageInfo {
    pub attacker: UnitId,
    pub target: UnitId,
    pub attack_type: WeaponAttackType,
    pub school: SchoolMask,
    pub outcome: MeleeHitOutcome,
    /// Damage after roll, bonuses, armor and the outcome multiplier.
    pub damage: u32,
    /// Removed by armor and glancing before the ledger starts.
    pub clean_damage: u32,
    pub proc_attacker: ProcFlags,
    pub proc_victim: ProcFlags,
    pub hit_mask: ProcHitMask,
}

impl CalcDamageInfo {
    pub fn new(attacker: UnitId, target: UnitId, attack_type: WeaponAttackType) -> Self {
        let (proc_attacker, proc_victim) = match attack_type {
            WeaponAttackType::Base => (
                ProcFlags::DONE_MELEE_AUTO_ATTACK | ProcFlags::DONE_MAINHAND_ATTACK,
                ProcFlags::TAKEN_MELEE_AUTO_ATTACK,
            ),
            WeaponAttackType::Off => (
                ProcFlags::DONE_MELEE_AUTO_ATTACK | ProcFlags::DONE_OFFHAND_ATTACK,
                ProcFlags::TAKEN_MELEE_AUTO_ATTACK,
            ),
            WeaponAttackType::Ranged => (
                ProcFlags::DONE_RANGED_AUTO_ATTACK,
                ProcFlags::TAKEN_RANGED_AUTO_ATTACK,
            ),
        };
        Self {
            attacker,
            target,
            attack_type,
            school: SchoolMask::NORMAL,
            outcome: MeleeHitOutcome::Normal,
            damage: 0,
            clean_damage: 0,
            proc_attacker,
            proc_victim,
            hit_mask: ProcHitMask::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn info(amount: u32) -> DamageInfo {
        DamageInfo::new(
            Some(UnitId(1)),
            UnitId(2),
            amount,
            None,
            SchoolMask::FIRE,
            DamageEffectType::SpellDirect,
            WeaponAttackType::Base,
        )
    }

    #[test]
    fn buckets_cap_at_remaining_damage() {
        let mut dmg = info(100);
        assert_eq!(dmg.resist(30), 30);
        assert_eq!(dmg.absorb(500), 70);
        assert_eq!(dmg.block(10), 0);
        assert_eq!(dmg.damage(), 0);
        assert!(dmg.hit_mask.contains(ProcHitMask::ABSORB));
        assert!(dmg.ledger_holds());
    }

    #[test]
    fn heal_overheal_is_what_did_not_land() {
        let mut heal = HealInfo::new(None, UnitId(1), 500, None, SchoolMask::HOLY);
        heal.absorb(50);
        heal.set_effective(100);
        assert_eq!(heal.heal(), 450);
        assert_eq!(heal.overheal(), 350);
    }

    proptest! {
        #[test]
        fn ledger_holds_after_every_stage(
            amount in 0u32..1_000_000,
            resist in 0u32..2_000_000,
            absorb in 0u32..2_000_000,
            block in 0u32..2_000_000,
        ) {
            let mut dmg = info(amount);
            dmg.resist(resist);
            prop_assert!(dmg.ledger_holds());
            dmg.absorb(absorb);
            prop_assert!(dmg.ledger_holds());
            dmg.block(block);
            prop_assert!(dmg.ledger_holds());
            prop_assert!(dmg.damage() <= dmg.original());
        }
    }
}

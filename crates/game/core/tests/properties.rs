//! Property tests for the value objects and formulas the pipeline is built on.

use combat_core::combat::{
    MeleeChances, WeaponAttackType, average_resist, resist_bucket_chances, roll_melee_outcome,
    select_resist_bucket,
};
use combat_core::config::CombatConfig;
use combat_core::{
    DamageEffectType, DamageInfo, MeleeHitOutcome, SchoolMask, Unit, UnitId, UnitRole,
};
use proptest::prelude::*;

proptest! {
    #[test]
    fn health_stays_within_bounds(
        max_health in 1u32..1_000_000,
        start in 0u32..1_000_000,
        deltas in prop::collection::vec(any::<i32>(), 1..32),
    ) {
        let mut unit = Unit::new(UnitId(1), UnitRole::Creature, 60).with_health(start, max_health);
        for delta in deltas {
            let before = i64::from(unit.health());
            let applied = unit.modify_health(i64::from(delta));
            prop_assert!(unit.health() <= unit.max_health());
            prop_assert_eq!(i64::from(unit.health()) - before, applied);
        }
    }

    #[test]
    fn mitigation_ledger_balances(
        amount in any::<u32>(),
        absorb in any::<u32>(),
        resist in any::<u32>(),
        block in any::<u32>(),
    ) {
        let mut info = DamageInfo::new(
            Some(UnitId(1)),
            UnitId(2),
            amount,
            None,
            SchoolMask::FIRE,
            DamageEffectType::SpellDirect,
            WeaponAttackType::Base,
        );
        info.resist(resist);
        info.absorb(absorb);
        info.block(block);
        prop_assert!(info.ledger_holds());
        prop_assert!(info.damage() <= amount);
    }

    #[test]
    fn resist_bucket_is_always_in_range(
        resistance in 0.0f32..2_000.0,
        level in 1u8..=83,
        roll in 0.0f32..1.0,
    ) {
        let chances = resist_bucket_chances(average_resist(resistance, level));
        let bucket = select_resist_bucket(&chances, roll);
        prop_assert!(bucket < CombatConfig::RESIST_BUCKETS);
    }

    #[test]
    fn melee_ladder_respects_its_bounds(
        miss in 0i32..2_000,
        dodge in 0i32..2_000,
        parry in 0i32..2_000,
        block in 0i32..2_000,
        crit in 0i32..2_000,
        roll in 0i32..10_000,
    ) {
        let chances = MeleeChances { miss, dodge, parry, block, crit, ..MeleeChances::default() };
        let outcome = roll_melee_outcome(&chances, roll);
        if roll < miss {
            prop_assert_eq!(outcome, MeleeHitOutcome::Miss);
        }
        if roll >= miss + dodge + parry + block + crit {
            prop_assert_eq!(outcome, MeleeHitOutcome::Normal);
        }
    }
}

//! Rage generation.
//!
//! Rage is stored in tenths, so the helpers return tenths as well.

use super::DamageEffectType;
use crate::aura::AuraType;
use crate::engine::CombatEngine;
use crate::state::{PowerType, UnitId, WeaponAttackType};

/// Damage worth one full unit of rage conversion at `level`.
pub fn rage_conversion(level: u8) -> f32 {
    let level = f32::from(level);
    let mut conversion = 0.009_110_783_6 * level * level + 3.225_598_133 * level + 4.265_291_1;
    if level > 70.0 {
        conversion += 13.27 * (level - 70.0);
    }
    conversion
}

/// Rage (tenths) earned by dealing `damage` with a weapon swing.
///
/// `hit_factor` is the swing factor scaled by weapon speed: 3.5 for a normal
/// main-hand hit, 7.0 for a critical one, halved for the off-hand.
pub fn rage_from_damage_dealt(damage: u32, level: u8, hit_factor: f32, rate: f32) -> i32 {
    let rage = (damage as f32 / rage_conversion(level) * 7.5 + hit_factor) / 2.0;
    (rage * rate * 10.0).max(0.0) as i32
}

/// Rage (tenths) earned by taking `damage`.
pub fn rage_from_damage_taken(damage: u32, level: u8, rate: f32) -> i32 {
    let rage = damage as f32 / rage_conversion(level) * 2.5;
    (rage * rate * 10.0).max(0.0) as i32
}

impl CombatEngine<'_> {
    /// Rage for the attacker of a white swing.
    pub(crate) fn reward_rage_dealt(
        &mut self,
        attacker: UnitId,
        damage: u32,
        attack_type: WeaponAttackType,
        critical: bool,
    ) {
        let rate = self.config().rage_income_rate;
        let bonus_pct = self.effects_of(attacker).total_modifier(AuraType::ModRageFromDamageDealt);
        let Some(unit) = self.unit_mut(attacker) else {
            return;
        };
        if unit.power_type != PowerType::Rage || attack_type == WeaponAttackType::Ranged {
            return;
        }
        let speed = unit.weapons[attack_type.index()].attack_time_ms as f32 / 1000.0;
        let mut factor = match (attack_type, critical) {
            (WeaponAttackType::Off, true) => 3.5,
            (WeaponAttackType::Off, false) => 1.75,
            (_, true) => 7.0,
            (_, false) => 3.5,
        };
        factor *= speed;
        let mut rage = rage_from_damage_dealt(damage, unit.level, factor, rate);
        rage += rage * bonus_pct / 100;
        unit.modify_power(PowerType::Rage, rage);
    }

    /// Rage for the victim of any damage except redirected shares.
    pub(crate) fn reward_rage_taken(
        &mut self,
        victim: UnitId,
        damage: u32,
        damage_type: DamageEffectType,
    ) {
        if damage == 0 || damage_type == DamageEffectType::NoDamage {
            return;
        }
        let rate = self.config().rage_income_rate;
        let Some(unit) = self.unit_mut(victim) else {
            return;
        };
        if unit.power_type != PowerType::Rage {
            return;
        }
        let rage = rage_from_damage_taken(damage, unit.level, rate);
        unit.modify_power(PowerType::Rage, rage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_grows_faster_past_seventy() {
        let at_70 = rage_conversion(70);
        let at_80 = rage_conversion(80);
        assert!((at_70 - 274.7).abs() < 0.5, "{at_70}");
        assert!((at_80 - 453.3).abs() < 0.5, "{at_80}");
    }

    #[test]
    fn taken_rage_is_in_tenths() {
        // 453.3 damage at level 80 is 2.5 rage.
        let rage = rage_from_damage_taken(454, 80, 1.0);
        assert_eq!(rage, 25);
        assert_eq!(rage_from_damage_taken(454, 80, 2.0), 50);
    }
}

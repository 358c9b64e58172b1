//! Armor, resistance, absorb shields and block.
//!
//! Armor runs before the ledger starts and shrinks the computed amount. The
//! other stages move value out of [`DamageInfo::damage`] into one bucket each.

use tracing::debug;

use super::{DamageEffectType, DamageInfo};
use crate::aura::{AuraRemoveMode, AuraType, EffectHandle};
use crate::config::CombatConfig;
use crate::engine::CombatEngine;
use crate::env::RollContext;
use crate::event::CombatEvent;
use crate::spell::{SchoolMask, SpellAttributes, SpellInfo};
use crate::state::{AuraId, PowerType, UnitId};

// ============================================================================
// Formulas
// ============================================================================

/// Fraction of physical damage removed by `armor` against an attacker of
/// `attacker_level`, in `0..=0.75`.
pub fn armor_reduction(armor: f32, attacker_level: u8) -> f32 {
    if armor <= 0.0 {
        return 0.0;
    }
    let mut level = f32::from(attacker_level);
    if level > 59.0 {
        level += 4.5 * (level - 59.0);
    }
    let mut reduction = 0.1 * armor / (8.5 * level + 40.0);
    reduction /= 1.0 + reduction;
    reduction.clamp(0.0, CombatConfig::MAX_ARMOR_REDUCTION)
}

/// Expected resisted fraction of a magic hit.
pub fn average_resist(resistance: f32, victim_level: u8) -> f32 {
    if resistance <= 0.0 {
        return 0.0;
    }
    let constant = if victim_level == CombatConfig::BOSS_LEVEL {
        CombatConfig::BOSS_RESISTANCE_CONSTANT
    } else {
        f32::from(victim_level) * 5.0
    };
    resistance / (resistance + constant)
}

/// Probability of resisting `i * 10%` of a hit, for `i` in `0..=10`.
pub fn resist_bucket_chances(average: f32) -> [f32; CombatConfig::RESIST_BUCKETS] {
    let mut chances = [0.0_f32; CombatConfig::RESIST_BUCKETS];
    for (i, chance) in chances.iter_mut().enumerate() {
        *chance = (0.5 - 2.5 * (0.1 * i as f32 - average).abs()).max(0.0);
    }
    if average <= 0.1 {
        chances[0] = 1.0 - 7.5 * average;
        chances[1] = 5.0 * average;
        chances[2] = 2.5 * average;
    }
    chances
}

/// Bucket hit by a uniform `roll` in `0..1`.
pub fn select_resist_bucket(chances: &[f32; CombatConfig::RESIST_BUCKETS], roll: f32) -> usize {
    let mut index = 0;
    let mut sum = chances[0];
    while roll >= sum && index < CombatConfig::RESIST_BUCKETS - 1 {
        index += 1;
        sum += chances[index];
    }
    index
}

// ============================================================================
// Engine stages
// ============================================================================

impl CombatEngine<'_> {
    /// Physical damage after the victim's armor.
    pub fn armor_reduced_damage(
        &self,
        attacker: Option<UnitId>,
        victim: UnitId,
        damage: u32,
    ) -> u32 {
        if damage == 0 {
            return 0;
        }
        let Some(target) = self.unit(victim) else {
            return damage;
        };
        let mut armor = target.stats.armor as f32;
        let victim_level = target.level;
        let mut level = victim_level;

        if let Some(attacker) = attacker {
            let bypass = self
                .effects_of(victim)
                .total_modifier_where(AuraType::BypassArmorForCaster, |aura, _| {
                    aura.caster == Some(attacker)
                });
            armor -= armor * bypass as f32 / 100.0;

            let attacker_effects = self.effects_of(attacker);
            let physical = i32::from(SchoolMask::NORMAL.bits());
            armor += attacker_effects
                .total_modifier_by_misc_mask(AuraType::ModTargetResistance, physical)
                as f32;

            let penetration = attacker_effects.total_modifier(AuraType::ModArmorPenetrationPct);
            if penetration > 0 && armor > 0.0 {
                let victim_level = f32::from(victim_level);
                let mut cap = 400.0 + 85.0 * victim_level;
                if victim_level >= 60.0 {
                    cap += 4.5 * 85.0 * (victim_level - 59.0);
                }
                let cap = ((armor + cap) / 3.0).min(armor);
                armor -= cap * penetration.min(100) as f32 / 100.0;
            }
            if let Some(unit) = self.unit(attacker) {
                level = unit.level;
            }
        }

        if armor <= 0.0 {
            return damage;
        }
        let reduction = armor_reduction(armor, level);
        (damage as f32 * (1.0 - reduction)).max(1.0) as u32
    }

    /// Partial resist of a magic hit: one roll selects a 10% bucket.
    pub(crate) fn apply_resist(&mut self, info: &mut DamageInfo, spell: Option<&SpellInfo>) {
        if info.damage() == 0 || info.school.is_physical() {
            return;
        }
        if spell.is_some_and(|s| {
            s.has_attribute(SpellAttributes::IGNORE_RESISTANCES)
                || s.has_attribute(SpellAttributes::BINARY)
        }) {
            return;
        }
        let Some(victim) = self.unit(info.victim) else {
            return;
        };
        let victim_level = victim.level;
        let mut resistance = victim.stats.resistance(info.school) as f32;

        if let Some(attacker) = info.attacker {
            let school = i32::from(info.school.bits());
            resistance += self
                .effects_of(attacker)
                .total_modifier_by_misc_mask(AuraType::ModTargetResistance, school)
                as f32;
            if let Some(unit) = self.unit(attacker) {
                resistance += (f32::from(victim_level) - f32::from(unit.level)).max(0.0) * 5.0;
            }
        }
        let resistance = resistance.max(0.0);
        if resistance == 0.0 {
            return;
        }

        let chances = resist_bucket_chances(average_resist(resistance, victim_level));
        let roller = info.attacker.unwrap_or(info.victim);
        let roll = self.roll_per_10000(roller, RollContext::Resist) as f32 / 10_000.0;
        let bucket = select_resist_bucket(&chances, roll) as u32;
        let resisted = info.damage() * bucket / 10;
        if resisted > 0 {
            info.resist(resisted);
            debug!(victim = %info.victim, resisted, bucket, "partial resist");
        }
    }

    /// Runs every shield on the victim against `info`: school absorbs by
    /// priority, then mana shields, then damage split to living casters.
    pub(crate) fn apply_absorb(&mut self, info: &mut DamageInfo) {
        if info.damage() == 0 {
            return;
        }
        let school = i32::from(info.school.bits());
        let mut depleted: Vec<AuraId> = Vec::new();

        // school absorbs
        let mut shields = self.shield_snapshot(info.victim, AuraType::SchoolAbsorb);
        shields.sort_by_key(|(_, priority)| core::cmp::Reverse(*priority));
        for (handle, _) in shields {
            if info.damage() == 0 {
                break;
            }
            let Some(amount) = self.live_shield_amount(handle, school) else {
                continue;
            };
            let mut to_absorb = info.damage().min(amount.max(0) as u32);
            let hook = self
                .aura(handle.aura)
                .and_then(|a| self.env().scripts().on_absorb(a.spell));
            if let Some(hook) = hook {
                to_absorb = hook(self, handle.aura, &*info, to_absorb).min(info.damage());
            }
            let remaining = self.drain_shield(handle, to_absorb);
            info.absorb(to_absorb);
            if remaining <= 0 {
                depleted.push(handle.aura);
            }
        }

        // mana shields
        for (handle, _) in self.shield_snapshot(info.victim, AuraType::ManaShield) {
            if info.damage() == 0 {
                break;
            }
            let Some(amount) = self.live_shield_amount(handle, school) else {
                continue;
            };
            let multiplier = self.effect_multiplier(handle);
            let mut to_absorb = info.damage().min(amount.max(0) as u32);
            let mana = self
                .unit(info.victim)
                .map_or(0, |u| u.power(PowerType::Mana))
                .max(0) as f32;
            let cost = to_absorb as f32 * multiplier;
            if cost > mana {
                to_absorb = (mana / multiplier) as u32;
            }
            let drain = (to_absorb as f32 * multiplier) as i32;
            if let Some(victim) = self.unit_mut(info.victim) {
                victim.modify_power(PowerType::Mana, -drain);
            }
            let remaining = self.drain_shield(handle, to_absorb);
            info.absorb(to_absorb);
            if remaining <= 0 {
                depleted.push(handle.aura);
            }
        }

        for aura in depleted {
            if self.aura(aura).is_some_and(|a| !a.is_removed()) {
                self.remove_owned_aura(aura, AuraRemoveMode::EnemySpell);
            }
        }

        self.apply_split_damage(info);
    }

    fn apply_split_damage(&mut self, info: &mut DamageInfo) {
        let school = i32::from(info.school.bits());
        for (handle, _) in self.shield_snapshot(info.victim, AuraType::SplitDamagePct) {
            if info.damage() == 0 {
                break;
            }
            let Some(aura) = self.aura(handle.aura).filter(|a| !a.is_removed()) else {
                continue;
            };
            let Some(effect) = aura.effect(handle.index as usize) else {
                continue;
            };
            if effect.misc_value & school == 0 {
                continue;
            }
            let pct = effect.amount.clamp(0, 100) as u32;
            let spell = aura.spell;
            let Some(caster) = aura.caster.filter(|c| *c != info.victim && self.is_alive(*c)) else {
                continue;
            };
            let split = info.damage() * pct / 100;
            if split == 0 {
                continue;
            }
            info.absorb(split);

            let redirected = DamageInfo::new(
                info.attacker,
                caster,
                split,
                Some(spell),
                info.school,
                DamageEffectType::NoDamage,
                info.attack_type,
            );
            let dealt = self.deal_damage(&redirected, None, false);
            self.emit(CombatEvent::SpellDamageLog {
                caster: info.attacker,
                target: caster,
                spell,
                damage: dealt,
                school: info.school,
                absorbed: 0,
                resisted: 0,
                blocked: 0,
                critical: false,
            });
        }
    }

    /// Shield effects of one type on `unit` with their absorb priority, in
    /// application order.
    fn shield_snapshot(&self, unit: UnitId, aura_type: AuraType) -> Vec<(EffectHandle, i32)> {
        let Some(victim) = self.unit(unit) else {
            return Vec::new();
        };
        victim
            .effects
            .snapshot(aura_type)
            .into_iter()
            .map(|handle| {
                let priority = self
                    .aura(handle.aura)
                    .and_then(|a| self.spell_info(a.spell))
                    .map_or(0, |info| info.absorb_priority);
                (handle, priority)
            })
            .collect()
    }

    /// Remaining amount of a shield that still exists and covers `school`.
    fn live_shield_amount(&self, handle: EffectHandle, school: i32) -> Option<i32> {
        let aura = self.aura(handle.aura).filter(|a| !a.is_removed())?;
        let effect = aura.effect(handle.index as usize)?;
        if effect.misc_value & school == 0 || effect.amount <= 0 {
            return None;
        }
        Some(effect.amount)
    }

    fn drain_shield(&mut self, handle: EffectHandle, absorbed: u32) -> i32 {
        match self
            .aura_mut(handle.aura)
            .and_then(|a| a.effect_mut(handle.index as usize))
        {
            Some(effect) => {
                effect.amount = effect.amount.saturating_sub(absorbed.min(i32::MAX as u32) as i32);
                effect.amount
            }
            None => 0,
        }
    }

    fn effect_multiplier(&self, handle: EffectHandle) -> f32 {
        self.aura(handle.aura)
            .and_then(|a| self.spell_info(a.spell))
            .and_then(|info| info.effect(handle.index as usize))
            .map(|e| e.value_multiplier)
            .filter(|m| *m > 0.0)
            .unwrap_or(1.0)
    }

    /// Shield block of a blocked melee hit: a fixed share of the remaining
    /// damage, doubled on a critical block.
    pub(crate) fn apply_block(&mut self, info: &mut DamageInfo) {
        if info.damage() == 0 {
            return;
        }
        let config = self.config();
        let mut pct = config.block_percent;
        let critical_chance = config.critical_block_chance as i32;
        if self.roll_chance(info.victim, RollContext::CriticalBlock, critical_chance) {
            pct *= 2;
        }
        let amount =
            (u64::from(info.damage()) * u64::from(pct) / 100).min(u64::from(u32::MAX)) as u32;
        info.block(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn armor_curve_caps_at_three_quarters() {
        assert_eq!(armor_reduction(0.0, 80), 0.0);
        let mid = armor_reduction(10_000.0, 80);
        // 10000 / (10000 + 10 * (8.5 * 174.5 + 40))
        assert!((mid - 0.3963).abs() < 0.001, "{mid}");
        assert_eq!(armor_reduction(1_000_000.0, 80), 0.75);
    }

    #[test]
    fn bucket_table_sums_to_one() {
        for average in [0.0, 0.05, 0.1, 0.25, 0.5, 0.75] {
            let total: f32 = resist_bucket_chances(average).iter().sum();
            assert!((total - 1.0).abs() < 1e-4, "average {average}: {total}");
        }
    }

    #[test]
    fn sampled_buckets_converge_to_average_resist() {
        for resistance in [35.0, 150.0, 400.0] {
            let average = average_resist(resistance, 80);
            let chances = resist_bucket_chances(average);
            let samples = 20_000;
            let sum: usize = (0..samples)
                .map(|k| select_resist_bucket(&chances, (k as f32 + 0.5) / samples as f32))
                .sum();
            let mean = sum as f32 / samples as f32 / 10.0;
            assert!((mean - average).abs() < 0.01, "expected {average}, sampled {mean}");
        }
    }

    #[test]
    fn boss_level_uses_fixed_constant() {
        assert!((average_resist(510.0, 83) - 0.5).abs() < f32::EPSILON);
        assert!((average_resist(400.0, 80) - 0.5).abs() < f32::EPSILON);
    }
}

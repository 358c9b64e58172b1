//! Healing commit.

use tracing::debug;

use super::HealInfo;
use crate::aura::{AuraRemoveMode, AuraType};
use crate::engine::CombatEngine;
use crate::event::CombatEvent;
use crate::spell::{DamageClass, SpellAttributes, SpellInfo};
use crate::state::{AuraId, UnitId};

impl CombatEngine<'_> {
    /// Caster-side heal modifiers.
    pub fn spell_healing_bonus_done(
        &self,
        healer: UnitId,
        spell: &SpellInfo,
        effect_index: usize,
        heal: u32,
    ) -> u32 {
        if spell.has_attribute(SpellAttributes::NO_DONE_BONUS) {
            return heal;
        }
        let Some(unit) = self.unit(healer) else {
            return heal;
        };
        let query = self.effects_of(healer);
        let flat = query.total_modifier(AuraType::ModHealingDone);
        let power = (unit.stats.spell_power + flat).max(0) as f32;
        let coefficient = spell.effect(effect_index).map_or(0.0, |e| e.bonus_coefficient);
        let bonus = power * coefficient * spell.level_penalty(unit.level);
        let pct = query.total_multiplier(AuraType::ModHealingDonePercent);
        ((heal as f32 + bonus) * pct).max(0.0) as u32
    }

    /// Target-side heal modifiers.
    pub fn spell_healing_bonus_taken(&self, target: UnitId, heal: u32) -> u32 {
        let pct = self.effects_of(target).total_multiplier(AuraType::ModHealingPct);
        (heal as f32 * pct).max(0.0) as u32
    }

    /// Builds a heal from an amount that already carries the done bonus:
    /// taken modifiers, then crit.
    pub fn calculate_heal(
        &self,
        healer: Option<UnitId>,
        target: UnitId,
        spell: &SpellInfo,
        amount: u32,
        critical: bool,
    ) -> HealInfo {
        let mut heal = self.spell_healing_bonus_taken(target, amount);
        if critical && let Some(healer) = healer {
            heal = self.critical_damage(healer, heal, spell.school, DamageClass::Magic);
        }
        let mut info = HealInfo::new(healer, target, heal, Some(spell.id), spell.school);
        info.critical = critical;
        info
    }

    /// Heal absorbs eat the heal first; shields that run dry are removed.
    fn apply_heal_absorb(&mut self, info: &mut HealInfo) {
        let Some(unit) = self.unit(info.target) else {
            return;
        };
        let handles = unit.effects.snapshot(AuraType::SchoolHealAbsorb);
        let mut depleted: Vec<AuraId> = Vec::new();
        for handle in handles {
            if info.heal() == 0 {
                break;
            }
            let Some(aura) = self.aura_mut(handle.aura) else {
                continue;
            };
            if aura.is_removed() {
                continue;
            }
            let Some(effect) = aura.effect_mut(handle.index as usize) else {
                continue;
            };
            if effect.amount <= 0 {
                continue;
            }
            let taken = info.absorb(effect.amount as u32);
            effect.amount -= taken as i32;
            if effect.amount <= 0 {
                depleted.push(handle.aura);
            }
        }
        for aura in depleted {
            self.remove_owned_aura(aura, AuraRemoveMode::EnemySpell);
        }
    }

    /// Applies a heal. Returns the health actually restored.
    pub fn heal_unit(&mut self, info: &mut HealInfo) -> u32 {
        let target = info.target;
        if !self.is_alive(target) {
            return 0;
        }
        self.apply_heal_absorb(info);

        let gain = self
            .unit_mut(target)
            .map_or(0, |u| u.modify_health(i64::from(info.heal())))
            .max(0) as u32;
        info.set_effective(gain);

        let healer = info.healer.filter(|h| self.state().contains(*h));
        if let Some(healer) = healer
            && let Some(unit) = self.unit_mut(healer)
        {
            unit.statistics.healing_done += u64::from(gain);
            let highest = unit.statistics.highest_heal_cast.max(info.original());
            unit.statistics.highest_heal_cast = highest;
        }
        if let Some(unit) = self.unit_mut(target) {
            unit.statistics.healing_received += u64::from(gain);
            let highest = unit.statistics.highest_heal_received.max(info.original());
            unit.statistics.highest_heal_received = highest;
        }

        debug!(%target, heal = info.heal(), gain, "heal");
        self.emit(CombatEvent::HealLog {
            healer: info.healer,
            target,
            spell: info.spell,
            amount: info.original(),
            gain,
            overheal: info.overheal(),
            absorbed: info.absorbed(),
            critical: info.critical,
        });

        if let Some(healer) = healer {
            self.add_heal_threat(healer, target, gain);
        }
        gain
    }
}

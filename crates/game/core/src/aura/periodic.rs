//! Aura timers: durations, periodic ticks and the expiry sweep.
//!
//! Every periodic effect runs on its own amplitude timer. A tick applies to
//! each target the effect is currently applied to; ticks never run past the
//! remaining duration of the aura.

use tracing::{debug, error, trace};

use super::AuraType;
use crate::combat::DamageEffectType;
use crate::engine::CombatEngine;
use crate::event::CombatEvent;
use crate::proc::{ProcFlags, ProcHitMask, ProcSpellPhase, ProcSpellType, ProcTrigger};
use crate::spell::{SpellInfo, SpellTargets, TriggerSource};
use crate::state::{AuraId, UnitId, WeaponAttackType};

impl CombatEngine<'_> {
    /// Advances every aura owned by `unit` by `diff_ms`.
    pub(crate) fn update_owned_auras(&mut self, unit: UnitId, diff_ms: u64) {
        let owned: Vec<AuraId> = match self.unit(unit) {
            Some(u) => u.owned_aura_ids().collect(),
            None => return,
        };
        let diff = diff_ms.min(i64::MAX as u64) as i64;
        for aura in owned {
            self.update_aura(aura, diff);
        }
    }

    fn update_aura(&mut self, aura_id: AuraId, diff: i64) {
        let interval = i64::from(self.config().area_aura_update_interval_ms);
        let Some(aura) = self.aura_mut(aura_id) else {
            return;
        };
        if aura.is_removed() {
            return;
        }
        // Time that counts for periodic effects.
        let elapsed = if aura.duration_ms >= 0 && !aura.is_permanent() {
            let elapsed = diff.min(aura.duration_ms);
            aura.duration_ms -= elapsed;
            elapsed
        } else {
            diff
        };

        let mut refresh_area = false;
        if let Some(area) = aura.area.as_mut() {
            area.update_timer_ms -= diff;
            if area.update_timer_ms <= 0 {
                area.update_timer_ms = interval;
                refresh_area = true;
            }
        }

        let mut ticks: Vec<(usize, u32)> = Vec::new();
        for index in aura.effect_mask().indices() {
            let Some(effect) = aura.effect_mut(index) else {
                continue;
            };
            if !effect.is_periodic() {
                continue;
            }
            effect.periodic_timer_ms -= elapsed;
            let mut count = 0;
            while effect.periodic_timer_ms <= 0 {
                effect.periodic_timer_ms += i64::from(effect.amplitude_ms);
                effect.tick_number += 1;
                count += 1;
            }
            if count > 0 {
                ticks.push((index, count));
            }
        }

        if refresh_area {
            self.update_area_targets(aura_id);
        }
        for (index, count) in ticks {
            for _ in 0..count {
                if self.aura(aura_id).is_none_or(|a| a.is_removed()) {
                    return;
                }
                self.periodic_tick(aura_id, index);
            }
        }
    }

    /// One tick of effect `index` on every target that has it applied.
    fn periodic_tick(&mut self, aura_id: AuraId, index: usize) {
        let Some(aura) = self.aura(aura_id) else {
            return;
        };
        let Some(effect) = aura.effect(index) else {
            return;
        };
        let Some(info) = self.spell_info(aura.spell) else {
            return;
        };
        let (aura_type, amount, misc_value, caster) =
            (effect.aura_type, effect.amount, effect.misc_value, aura.caster);
        let targets: Vec<UnitId> = aura.targets().collect();
        trace!(aura = %aura_id, index, ?aura_type, "periodic tick");

        for target in targets {
            let applied = self
                .unit(target)
                .and_then(|u| u.application(aura_id))
                .is_some_and(|app| app.has_effect(index));
            if !applied || !self.is_alive(target) {
                continue;
            }
            let caster = caster.filter(|c| self.state().contains(*c));
            match aura_type {
                AuraType::PeriodicDamage => {
                    self.periodic_damage(caster, target, info, index, amount)
                }
                AuraType::PeriodicHeal => self.periodic_heal(caster, target, info, index, amount),
                AuraType::PeriodicEnergize => {
                    self.energize(caster, target, info.id, misc_value, amount)
                }
                AuraType::PeriodicTriggerSpell => {
                    self.periodic_trigger(aura_id, caster, target, info, index)
                }
                _ => {}
            }
        }
    }

    fn periodic_damage(
        &mut self,
        caster: Option<UnitId>,
        target: UnitId,
        info: &SpellInfo,
        index: usize,
        amount: i32,
    ) {
        let Some(caster) = caster else {
            return;
        };
        if self.is_immune_to_school(target, info) || self.is_immune_to_damage(target, info) {
            return;
        }
        let done = self.spell_damage_bonus_done(caster, info, index, amount.max(0) as u32);
        let mut damage = self.calculate_spell_damage(
            Some(caster),
            target,
            info,
            done,
            false,
            DamageEffectType::Dot,
        );
        self.apply_resist(&mut damage, Some(info));
        self.apply_absorb(&mut damage);
        let dealt = self.deal_damage(&damage, Some(info), true);
        self.emit(CombatEvent::PeriodicAuraLog {
            target,
            caster: Some(caster),
            spell: info.id,
            aura_type: AuraType::PeriodicDamage,
            amount: dealt,
            absorbed: damage.absorbed(),
            resisted: damage.resisted(),
        });

        let hit = if damage.damage() == 0 && damage.absorbed() > 0 {
            ProcHitMask::ABSORB
        } else {
            ProcHitMask::NORMAL
        };
        let trigger = ProcTrigger::new(caster, Some(target))
            .with_flags(
                ProcFlags::DONE_PERIODIC,
                ProcFlags::TAKEN_PERIODIC | ProcFlags::TAKEN_DAMAGE,
            )
            .with_spell(info.id, ProcSpellType::DAMAGE, ProcSpellPhase::HIT, false)
            .with_hit(hit)
            .with_school(info.school)
            .with_attack_type(WeaponAttackType::Base)
            .with_damage(damage);
        self.proc_skills_and_auras(&trigger);
    }

    fn periodic_heal(
        &mut self,
        caster: Option<UnitId>,
        target: UnitId,
        info: &SpellInfo,
        index: usize,
        amount: i32,
    ) {
        let Some(caster) = caster else {
            return;
        };
        let done = self.spell_healing_bonus_done(caster, info, index, amount.max(0) as u32);
        let mut heal = self.calculate_heal(Some(caster), target, info, done, false);
        let gain = self.heal_unit(&mut heal);
        self.emit(CombatEvent::PeriodicAuraLog {
            target,
            caster: Some(caster),
            spell: info.id,
            aura_type: AuraType::PeriodicHeal,
            amount: gain,
            absorbed: heal.absorbed(),
            resisted: 0,
        });

        let trigger = ProcTrigger::new(caster, Some(target))
            .with_flags(ProcFlags::DONE_PERIODIC, ProcFlags::TAKEN_PERIODIC)
            .with_spell(info.id, ProcSpellType::HEAL, ProcSpellPhase::HIT, false)
            .with_hit(ProcHitMask::NORMAL)
            .with_school(info.school)
            .with_heal(heal);
        self.proc_skills_and_auras(&trigger);
    }

    fn periodic_trigger(
        &mut self,
        aura: AuraId,
        caster: Option<UnitId>,
        target: UnitId,
        info: &SpellInfo,
        index: usize,
    ) {
        let Some(trigger) = info.effect(index).and_then(|e| e.trigger_spell) else {
            error!(spell = %info.id, index, "periodic trigger without a spell");
            return;
        };
        let Some(trigger_info) = self.spell_info(trigger) else {
            error!(spell = %info.id, %trigger, "periodic trigger spell missing");
            return;
        };
        let trigger_caster = if trigger_info.positive { target } else { caster.unwrap_or(target) };
        if let Err(err) = self.cast_spell(
            trigger_caster,
            trigger,
            SpellTargets::unit(target),
            Some(TriggerSource::Aura(aura)),
        ) {
            debug!(%aura, %trigger, error = %err, "periodic trigger failed");
        }
    }

    /// Removes owned auras whose duration ran out.
    pub(crate) fn remove_expired_auras(&mut self, unit: UnitId) {
        let expired: Vec<AuraId> = match self.unit(unit) {
            Some(u) => u
                .owned_aura_ids()
                .filter(|id| self.aura(*id).is_some_and(|a| !a.is_removed() && a.is_expired()))
                .collect(),
            None => return,
        };
        for id in expired {
            if self.aura(id).is_some_and(|a| !a.is_removed() && a.is_expired()) {
                self.remove_owned_aura(id, super::AuraRemoveMode::Expire);
            }
        }
    }
}

//! Proc dispatch.
//!
//! # Phases
//!
//! ```text
//! collect   every applied aura of the unit whose proc entry matches the
//!           event, not on cooldown, script check passes, chance rolled
//! fire      for each candidate still applied: cooldown, charge/stack use,
//!           script hook, default effect handlers, last-charge removal
//! ```
//!
//! Firing may remove or restack any aura, including the candidate itself
//! and later candidates; each candidate is re-checked right before it fires.
//! While a unit fires its procs its `proc_depth` is raised, so procs of the
//! same unit do not chain off each other.

use tracing::{debug, error, trace};

use super::{
    ProcAttributes, ProcEntry, ProcEventInfo, ProcFlags, ProcHitMask, ProcSpellPhase,
    ProcSpellType, ProcTrigger,
};
use crate::aura::{AuraRemoveMode, AuraType, EffectMask};
use crate::combat::DamageEffectType;
use crate::engine::CombatEngine;
use crate::env::{ProcHookResult, RollContext};
use crate::spell::{SpellAttributes, SpellEffectKind, SpellInfo, SpellTargets, TriggerSource};
use crate::state::{AuraId, UnitId};

/// An aura application selected to proc, with the effects that react.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcCandidate {
    pub aura: AuraId,
    pub effect_mask: EffectMask,
}

/// Hit results that satisfy an entry without an explicit hit mask.
fn default_hit_mask(actor_side: bool) -> ProcHitMask {
    if actor_side {
        ProcHitMask::NORMAL | ProcHitMask::CRITICAL
    } else {
        ProcHitMask::NORMAL | ProcHitMask::CRITICAL | ProcHitMask::ABSORB
    }
}

/// Static part of the match: flags, school, spell type and phase, hit
/// result.
pub fn entry_matches_event(entry: &ProcEntry, event: &ProcEventInfo, actor_side: bool) -> bool {
    if !entry.flags.intersects(event.type_mask) {
        return false;
    }
    if !entry.school_mask.is_empty() && !entry.school_mask.intersects(event.school) {
        return false;
    }
    if event.type_mask.intersects(ProcFlags::REQ_SPELL_PHASE) {
        let types = if entry.spell_type_mask.is_empty() {
            ProcSpellType::MASK_ALL
        } else {
            entry.spell_type_mask
        };
        if !types.intersects(event.spell_type) {
            return false;
        }
        let phases = if entry.spell_phase_mask.is_empty() {
            ProcSpellPhase::HIT
        } else {
            entry.spell_phase_mask
        };
        if !phases.intersects(event.spell_phase) {
            return false;
        }
    }
    if !event.hit_mask.is_empty() {
        let hits = if entry.hit_mask.is_empty() {
            default_hit_mask(actor_side)
        } else {
            entry.hit_mask
        };
        if !hits.intersects(event.hit_mask) {
            return false;
        }
    }
    true
}

impl CombatEngine<'_> {
    /// Dispatches one combat event to the auras of both sides.
    pub fn proc_skills_and_auras(&mut self, trigger: &ProcTrigger) {
        let mut trigger = trigger.clone();
        if trigger.damage.is_some_and(|d| d.damage() > 0)
            && trigger.type_mask_target.intersects(ProcFlags::TAKEN_HIT)
        {
            trigger.type_mask_target |= ProcFlags::TAKEN_DAMAGE;
        }
        if !trigger.type_mask_actor.is_empty() {
            self.proc_for_unit(trigger.actor, &trigger.event_for(true), true);
        }
        if let Some(target) = trigger.target
            && target != trigger.actor
            && !trigger.type_mask_target.is_empty()
        {
            self.proc_for_unit(target, &trigger.event_for(false), false);
        }
    }

    fn proc_for_unit(&mut self, unit: UnitId, event: &ProcEventInfo, actor_side: bool) {
        if !self.unit(unit).is_some_and(|u| u.can_proc()) {
            return;
        }
        let candidates = self.collect_proc_candidates(unit, event, actor_side);
        if candidates.is_empty() {
            return;
        }
        trace!(%unit, count = candidates.len(), "proc candidates");

        if let Some(u) = self.unit_mut(unit) {
            u.proc_depth += 1;
        }
        for candidate in candidates {
            self.fire_proc(unit, candidate, event);
        }
        if let Some(u) = self.unit_mut(unit) {
            u.proc_depth -= 1;
        }
    }

    /// Phase one: read-only selection plus the chance rolls.
    pub(crate) fn collect_proc_candidates(
        &mut self,
        unit: UnitId,
        event: &ProcEventInfo,
        actor_side: bool,
    ) -> Vec<ProcCandidate> {
        let Some(u) = self.unit(unit) else {
            return Vec::new();
        };
        let now = self.now();
        let executing_extra = u.executing_extra_attacks;

        let mut matched: Vec<(ProcCandidate, f32)> = Vec::new();
        for app in u.applied_auras.values() {
            if app.is_being_removed() {
                continue;
            }
            let Some(aura) = self.aura(app.aura) else {
                continue;
            };
            if aura.is_removed() || event.spell == Some(aura.spell) {
                continue;
            }
            let Some(info) = self.spell_info(aura.spell) else {
                continue;
            };
            let Some(entry) = info.proc.as_ref() else {
                continue;
            };
            if !entry_matches_event(entry, event, actor_side) {
                continue;
            }
            if event.triggered
                && !entry.attributes.contains(ProcAttributes::TRIGGERED_CAN_PROC)
                && !info.has_attribute(SpellAttributes::TRIGGERED_CAN_PROC)
            {
                continue;
            }
            if entry.attributes.contains(ProcAttributes::REQ_MANA_COST)
                && !event
                    .spell
                    .and_then(|s| self.spell_info(s))
                    .is_some_and(|s| s.power_cost > 0)
            {
                continue;
            }
            if aura.proc_cooldown_until > now {
                continue;
            }
            if executing_extra && self.grants_extra_attacks(info) {
                continue;
            }
            let effect_mask = app.applied_effects();
            if effect_mask.is_empty() {
                continue;
            }
            if let Some(check) = self.env().scripts().check_proc(aura.spell)
                && !check(self, app.aura, event)
            {
                continue;
            }
            let chance = self.proc_chance(entry, event, u.level);
            matched.push((
                ProcCandidate {
                    aura: app.aura,
                    effect_mask,
                },
                chance,
            ));
        }

        matched
            .into_iter()
            .filter(|(_, chance)| {
                self.roll_chance(unit, RollContext::Proc, (chance * 100.0).round() as i32)
            })
            .map(|(candidate, _)| candidate)
            .collect()
    }

    /// Percent chance of an entry for this event.
    fn proc_chance(&self, entry: &ProcEntry, event: &ProcEventInfo, level: u8) -> f32 {
        let mut chance = if entry.procs_per_minute > 0.0 {
            let speed_ms = self
                .unit(event.actor)
                .map_or(0, |u| u.weapons[event.attack_type.index()].attack_time_ms);
            speed_ms as f32 * entry.procs_per_minute / 600.0
        } else {
            entry.chance
        };
        if entry.attributes.contains(ProcAttributes::REDUCE_PROC_60) && level > 60 {
            chance *= (1.0 - f32::from(level - 60) / 30.0).max(0.0);
        }
        chance
    }

    fn grants_extra_attacks(&self, info: &SpellInfo) -> bool {
        info.has_effect(SpellEffectKind::AddExtraAttacks)
            || info.effects.iter().any(|e| {
                e.aura == Some(AuraType::ProcTriggerSpell)
                    && e.trigger_spell
                        .and_then(|t| self.spell_info(t))
                        .is_some_and(|t| t.has_effect(SpellEffectKind::AddExtraAttacks))
            })
    }

    /// Phase two for one candidate.
    fn fire_proc(&mut self, unit: UnitId, candidate: ProcCandidate, event: &ProcEventInfo) {
        let still_applied = self
            .unit(unit)
            .and_then(|u| u.application(candidate.aura))
            .is_some_and(|app| !app.is_being_removed());
        let Some(aura) = self.aura(candidate.aura) else {
            return;
        };
        if !still_applied || aura.is_removed() {
            return;
        }
        let Some(info) = self.spell_info(aura.spell) else {
            return;
        };
        let Some(entry) = info.proc.as_ref() else {
            return;
        };
        let use_stacks = entry.attributes.contains(ProcAttributes::USE_STACKS_FOR_CHARGES);
        let cooldown_ms = u64::from(entry.cooldown_ms);
        let now = self.now();
        debug!(%unit, aura = %candidate.aura, spell = %info.id, "proc");

        let mut spent = false;
        if let Some(aura) = self.aura_mut(candidate.aura) {
            if cooldown_ms > 0 {
                aura.proc_cooldown_until = now + cooldown_ms;
            }
            if use_stacks {
                spent = aura.stack <= 1;
            } else if aura.is_using_charges() {
                aura.charges -= 1;
                spent = aura.charges == 0;
            }
        }
        if use_stacks && !spent {
            self.mod_stack_amount(candidate.aura, -1, AuraRemoveMode::Expire);
        }

        let prevent = self
            .env()
            .scripts()
            .on_proc(info.id)
            .is_some_and(|hook| {
                hook(self, candidate.aura, event) == ProcHookResult::PreventDefault
            });
        if !prevent {
            for index in candidate.effect_mask.indices() {
                self.proc_effect(unit, candidate.aura, info, index, event);
            }
        }

        if spent {
            self.remove_owned_aura(candidate.aura, AuraRemoveMode::Expire);
        }
    }

    /// Default handler of one effect of a procced aura.
    fn proc_effect(
        &mut self,
        unit: UnitId,
        aura: AuraId,
        info: &SpellInfo,
        index: usize,
        event: &ProcEventInfo,
    ) {
        let Some(effect) = self.aura(aura).and_then(|a| a.effect(index)) else {
            return;
        };
        let (aura_type, amount) = (effect.aura_type, effect.amount);
        match aura_type {
            AuraType::ProcTriggerSpell => {
                let Some(trigger) = info.effect(index).and_then(|e| e.trigger_spell) else {
                    error!(spell = %info.id, index, "proc trigger effect without a spell");
                    return;
                };
                let Some(trigger_info) = self.spell_info(trigger) else {
                    error!(spell = %info.id, %trigger, "proc trigger spell missing");
                    return;
                };
                let target = if trigger_info.positive {
                    Some(unit)
                } else {
                    event.proc_target
                };
                let Some(target) = target.filter(|t| self.state().contains(*t)) else {
                    return;
                };
                if let Err(err) = self.cast_spell(
                    unit,
                    trigger,
                    SpellTargets::unit(target),
                    Some(TriggerSource::Aura(aura)),
                ) {
                    debug!(%aura, %trigger, error = %err, "proc trigger failed");
                }
            }
            AuraType::ProcTriggerDamage => {
                let Some(target) = event.proc_target.filter(|t| self.is_alive(*t)) else {
                    return;
                };
                let mut damage = self.calculate_spell_damage(
                    Some(unit),
                    target,
                    info,
                    amount.max(0) as u32,
                    false,
                    DamageEffectType::SpellDirect,
                );
                self.deal_spell_damage(&mut damage, info, false);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spell::SchoolMask;

    fn melee_hit(hit: ProcHitMask) -> ProcEventInfo {
        let mut event =
            ProcEventInfo::new(UnitId(1), Some(UnitId(2)), ProcFlags::DONE_MELEE_AUTO_ATTACK);
        event.hit_mask = hit;
        event
    }

    #[test]
    fn default_hit_mask_excludes_avoided_swings() {
        let entry = ProcEntry::new(ProcFlags::DONE_MELEE_AUTO_ATTACK);
        assert!(entry_matches_event(&entry, &melee_hit(ProcHitMask::NORMAL), true));
        assert!(entry_matches_event(&entry, &melee_hit(ProcHitMask::CRITICAL), true));
        assert!(!entry_matches_event(&entry, &melee_hit(ProcHitMask::DODGE), true));
    }

    #[test]
    fn explicit_hit_mask_overrides_default() {
        let entry =
            ProcEntry::new(ProcFlags::DONE_MELEE_AUTO_ATTACK).with_hit_mask(ProcHitMask::DODGE);
        assert!(entry_matches_event(&entry, &melee_hit(ProcHitMask::DODGE), true));
        assert!(!entry_matches_event(&entry, &melee_hit(ProcHitMask::NORMAL), true));
    }

    #[test]
    fn spell_events_check_phase_and_school() {
        let flags = ProcFlags::DONE_SPELL_MAGIC_DMG_CLASS_NEG;
        let entry = ProcEntry::new(flags).with_school(SchoolMask::FIRE);
        let mut event = ProcEventInfo::new(UnitId(1), Some(UnitId(2)), flags);
        event.spell_type = ProcSpellType::DAMAGE;
        event.spell_phase = ProcSpellPhase::HIT;
        event.hit_mask = ProcHitMask::NORMAL;
        event.school = SchoolMask::FIRE;
        assert!(entry_matches_event(&entry, &event, true));

        event.spell_phase = ProcSpellPhase::CAST;
        assert!(!entry_matches_event(&entry, &event, true));

        event.spell_phase = ProcSpellPhase::HIT;
        event.school = SchoolMask::FROST;
        assert!(!entry_matches_event(&entry, &event, true));
    }
}

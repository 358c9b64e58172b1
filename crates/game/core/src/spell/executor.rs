//! Spell execution: cast checks, preparation, launch and hit resolution.
//!
//! # Flow
//!
//! ```text
//! cast_spell
//!   check_cast --fail--> SpellFailure event + Err
//!   triggered? ----------------------------> execute_cast (no slot)
//!   set_current_cast (slot matrix) -> SpellStart
//!   cast time elapsed (update_casts) / next swing / ranged timer
//!     -> execute_cast: power, cooldown, SpellGo, cast-phase procs
//!          projectile? -> DeferredEvent::SpellHit -> process_spell_hit
//!          otherwise   -> process_spell_hit
//!          channel?    -> Casting until the channel timer runs out
//! ```
//!
//! Triggered casts (procs, trigger-spell effects, periodic triggers,
//! autorepeat shots) skip the slot manager, the cast time and the cost.

use tracing::{debug, error, warn};

use super::{
    AuraInterruptFlags, CastState, CurrentSpellType, DamageClass, DispelType, EffectTarget,
    SchoolMask, SpellAttributes, SpellCast, SpellEffectInfo, SpellEffectKind, SpellInfo,
    SpellInterruptFlags, SpellTargets, TriggerSource,
};
use crate::aura::{AuraState, EffectMask};
use crate::combat::{DamageEffectType, DamageInfo, HealInfo, SpellMissInfo};
use crate::config::CombatConfig;
use crate::engine::CombatEngine;
use crate::env::{DummyContext, RollContext};
use crate::error::{CastError, EngineError, ErrorContext};
use crate::event::CombatEvent;
use crate::proc::{
    ProcFlags, ProcHitMask, ProcSpellPhase, ProcSpellType, ProcTrigger, spell_proc_flags,
};
use crate::state::{CastId, DeferredEvent, PowerType, SpellId, UnitId, UnitState, WeaponAttackType};

/// What the effects of one spell did to its main target.
#[derive(Clone, Copy, Debug)]
struct EffectOutcome {
    damage: Option<DamageInfo>,
    heal: Option<HealInfo>,
    hit_mask: ProcHitMask,
}

impl EffectOutcome {
    fn spell_type(&self) -> ProcSpellType {
        let mut mask = ProcSpellType::empty();
        if self.damage.is_some() {
            mask |= ProcSpellType::DAMAGE;
        }
        if self.heal.is_some() {
            mask |= ProcSpellType::HEAL;
        }
        if mask.is_empty() {
            mask = ProcSpellType::NO_DMG_HEAL;
        }
        mask
    }
}

fn miss_hit_mask(miss: SpellMissInfo) -> ProcHitMask {
    match miss {
        SpellMissInfo::None => ProcHitMask::NORMAL,
        SpellMissInfo::Block => ProcHitMask::BLOCK,
        SpellMissInfo::Miss => ProcHitMask::MISS,
        SpellMissInfo::Resist => ProcHitMask::FULL_RESIST,
        SpellMissInfo::Dodge => ProcHitMask::DODGE,
        SpellMissInfo::Parry => ProcHitMask::PARRY,
        SpellMissInfo::Evade => ProcHitMask::EVADE,
        SpellMissInfo::Immune => ProcHitMask::IMMUNE,
        SpellMissInfo::Deflect => ProcHitMask::DEFLECT,
        SpellMissInfo::Absorb => ProcHitMask::ABSORB,
        SpellMissInfo::Reflect => ProcHitMask::REFLECT,
    }
}

fn attack_type_of(info: &SpellInfo) -> WeaponAttackType {
    if info.dmg_class == DamageClass::Ranged {
        WeaponAttackType::Ranged
    } else {
        WeaponAttackType::Base
    }
}

impl CombatEngine<'_> {
    // ========================================================================
    // Entry point
    // ========================================================================

    /// Starts a cast.
    ///
    /// A rejected cast emits [`CombatEvent::SpellFailure`] and returns
    /// [`EngineError::Cast`]. Triggered casts resolve immediately.
    pub fn cast_spell(
        &mut self,
        caster: UnitId,
        spell: SpellId,
        targets: SpellTargets,
        triggered_by: Option<TriggerSource>,
    ) -> Result<CastId, EngineError> {
        let info = self.spell_info(spell).ok_or(EngineError::UnknownSpell(spell))?;
        if !self.state().contains(caster) {
            return Err(EngineError::UnknownUnit(caster));
        }
        let targets = self.resolve_targets(caster, info, targets);
        let triggered = triggered_by.is_some();

        if let Err(reason) = self.check_cast(caster, info, targets, triggered) {
            debug!(%caster, %spell, %reason, "cast rejected");
            self.emit(CombatEvent::SpellFailure { caster, spell, reason });
            let context = ErrorContext::new(self.now()).with_unit(caster).with_spell(spell);
            return Err(EngineError::cast(reason, context));
        }

        let now = self.now();
        let from_extra_attack = self.unit(caster).is_some_and(|u| u.executing_extra_attacks);
        let id = self.state_mut().casts.next_id();
        let mut cast = SpellCast::new(id, spell, caster, targets);
        cast.triggered_by = triggered_by;
        cast.cast_time_ms = if triggered { 0 } else { info.cast_time_ms };
        cast.timer_ms = i64::from(cast.cast_time_ms);
        cast.started_at = now;
        cast.from_extra_attack = from_extra_attack;
        let cast_time_ms = cast.cast_time_ms;
        self.state_mut().casts.insert(cast);

        if triggered {
            self.execute_cast(id);
            return Ok(id);
        }

        let slot = self.set_current_cast(caster, id);
        self.emit(CombatEvent::SpellStart {
            caster,
            spell,
            cast: id,
            cast_time_ms,
        });
        let waits = matches!(slot, Some(CurrentSpellType::Melee | CurrentSpellType::Autorepeat));
        if !waits && cast_time_ms == 0 {
            self.execute_cast(id);
        }
        Ok(id)
    }

    /// Spells without an explicit target land on the caster, unless they
    /// have target effects: hostile ones then go to the current victim.
    fn resolve_targets(
        &self,
        caster: UnitId,
        info: &SpellInfo,
        targets: SpellTargets,
    ) -> SpellTargets {
        if targets.unit.is_some() {
            return targets;
        }
        let needs_target = info.effects.iter().any(|e| e.target == EffectTarget::Target);
        if needs_target && !info.positive {
            return SpellTargets {
                unit: self.unit(caster).and_then(|u| u.victim),
            };
        }
        SpellTargets::unit(caster)
    }

    /// Rejection reasons, checked in a fixed order.
    fn check_cast(
        &self,
        caster: UnitId,
        info: &SpellInfo,
        targets: SpellTargets,
        triggered: bool,
    ) -> Result<(), CastError> {
        let unit = self.unit(caster).ok_or(CastError::CasterDead)?;
        let now = self.now();

        if !unit.is_alive() && !info.has_attribute(SpellAttributes::CASTABLE_WHILE_DEAD) {
            return Err(CastError::CasterDead);
        }
        if !triggered {
            if unit.has_state(UnitState::STUNNED)
                && !info.has_attribute(SpellAttributes::CASTABLE_WHILE_STUNNED)
            {
                return Err(CastError::Stunned);
            }
            if unit.has_state(UnitState::FLEEING) {
                return Err(CastError::Fleeing);
            }
            if unit.has_state(UnitState::SILENCED) && info.dmg_class == DamageClass::Magic {
                return Err(CastError::Silenced);
            }
            if !unit.cooldowns.is_ready(info, now) {
                return Err(CastError::NotReady);
            }
            if !info.school.is_physical() && unit.cooldowns.is_school_locked(info.school, now) {
                return Err(CastError::SchoolLockedOut);
            }
            if info.power_cost > 0 && unit.power(info.power_type) < info.power_cost as i32 {
                return Err(CastError::NoPower);
            }
        }
        if let Some(state) = info.caster_aura_state
            && !unit.has_aura_state(state)
        {
            return Err(CastError::CasterAuraState);
        }

        let needs_target = info.effects.iter().any(|e| e.target == EffectTarget::Target);
        if !needs_target {
            return Ok(());
        }
        let target_id = targets.unit.ok_or(CastError::BadTargets)?;
        let target = self.unit(target_id).ok_or(CastError::BadTargets)?;
        if !target.is_alive() && !info.has_attribute(SpellAttributes::ALLOW_DEAD_TARGET) {
            return Err(CastError::TargetsDead);
        }
        if target_id != caster
            && info.range_max > 0.0
            && unit.distance_to(target) > info.range_max
        {
            return Err(CastError::OutOfRange);
        }
        if let Some(state) = info.target_aura_state
            && !target.has_aura_state(state)
        {
            return Err(CastError::TargetAuraState);
        }
        Ok(())
    }

    fn is_generic_cast_in_progress(&self, caster: UnitId) -> bool {
        self.unit(caster)
            .and_then(|u| u.current_cast(CurrentSpellType::Generic))
            .and_then(|id| self.cast(id))
            .is_some_and(|c| c.state == CastState::Preparing && !c.is_instant())
    }

    /// Conditions that can change between start and launch.
    fn check_launch(
        &self,
        caster: UnitId,
        info: &SpellInfo,
        targets: SpellTargets,
        triggered: bool,
    ) -> Result<(), CastError> {
        let unit = self.unit(caster).ok_or(CastError::CasterDead)?;
        if !unit.is_alive() && !info.has_attribute(SpellAttributes::CASTABLE_WHILE_DEAD) {
            return Err(CastError::CasterDead);
        }
        if !triggered
            && info.power_cost > 0
            && unit.power(info.power_type) < info.power_cost as i32
        {
            return Err(CastError::NoPower);
        }
        if let Some(target) = targets.unit
            && target != caster
            && !self.is_alive(target)
            && !info.has_attribute(SpellAttributes::ALLOW_DEAD_TARGET)
        {
            return Err(CastError::TargetsDead);
        }
        Ok(())
    }

    // ========================================================================
    // Launch
    // ========================================================================

    /// Launches a prepared cast.
    pub(crate) fn execute_cast(&mut self, id: CastId) {
        let Some(cast) = self.cast(id) else {
            return;
        };
        if cast.state != CastState::Preparing {
            return;
        }
        let (caster, spell, targets, triggered, slot) =
            (cast.caster, cast.spell, cast.targets, cast.is_triggered(), cast.slot);
        let Some(info) = self.spell_info(spell) else {
            warn!(%spell, "launch of a spell without definition");
            self.cancel_cast(id);
            return;
        };

        if let Err(reason) = self.check_launch(caster, info, targets, triggered) {
            debug!(%caster, %spell, %reason, "launch failed");
            self.emit(CombatEvent::SpellFailure { caster, spell, reason });
            if let Some(slot) = slot {
                self.release_slot(caster, slot);
            }
            self.cancel_cast(id);
            return;
        }

        let now = self.now();
        if !triggered {
            if let Some(unit) = self.unit_mut(caster) {
                if info.power_cost > 0 {
                    unit.modify_power(info.power_type, -(info.power_cost as i32));
                }
                unit.cooldowns.start_cooldown(info, now);
            }
            self.remove_auras_with_interrupt_flags(caster, AuraInterruptFlags::CAST, Some(spell));
        }

        self.emit(CombatEvent::SpellGo {
            caster,
            spell,
            cast: id,
            target: targets.unit,
        });

        if !info.has_attribute(SpellAttributes::DISABLE_PROC) {
            let (done, _) = spell_proc_flags(info.dmg_class, info.positive);
            let trigger = ProcTrigger::new(caster, targets.unit)
                .with_flags(done, ProcFlags::empty())
                .with_spell(spell, ProcSpellType::MASK_ALL, ProcSpellPhase::CAST, triggered)
                .with_school(info.school)
                .with_attack_type(attack_type_of(info));
            self.proc_skills_and_auras(&trigger);
        }

        if self.cast(id).is_none_or(|c| c.state != CastState::Preparing) {
            return;
        }

        let delay_ms = self.projectile_delay_ms(caster, info, targets);
        if delay_ms > 0 {
            if let Some(c) = self.cast_mut(id) {
                c.state = CastState::Delayed;
            }
            if let Some(unit) = self.unit_mut(caster) {
                if unit.current_cast(CurrentSpellType::Channeled).is_none() {
                    unit.state.remove(UnitState::CASTING);
                }
                unit.deferred.schedule(now + delay_ms, DeferredEvent::SpellHit { cast: id });
            }
            debug!(%caster, %spell, delay_ms, "projectile launched");
            return;
        }

        self.process_spell_hit(id);

        let channel_ms = info.duration_ms.map_or(0, i64::from);
        if slot == Some(CurrentSpellType::Channeled) && channel_ms > 0 {
            if let Some(c) = self.cast_mut(id)
                && c.state == CastState::Preparing
            {
                c.state = CastState::Casting;
                c.timer_ms = channel_ms;
            }
            return;
        }
        self.finish_cast(id);
    }

    fn projectile_delay_ms(&self, caster: UnitId, info: &SpellInfo, targets: SpellTargets) -> u64 {
        if info.speed <= 0.0 {
            return 0;
        }
        let Some(target) = targets.unit.filter(|t| *t != caster) else {
            return 0;
        };
        match (self.unit(caster), self.unit(target)) {
            (Some(c), Some(t)) => (c.distance_to(t) / info.speed * 1000.0).max(0.0) as u64,
            _ => 0,
        }
    }

    /// Deferred projectile landing. A cancelled cast hits nothing.
    pub(crate) fn land_projectile(&mut self, id: CastId) {
        if self.cast(id).is_none_or(|c| c.state != CastState::Delayed) {
            return;
        }
        self.process_spell_hit(id);
        self.finish_cast(id);
    }

    // ========================================================================
    // Hit
    // ========================================================================

    /// Resolves the hit of a launched cast on its target.
    pub(crate) fn process_spell_hit(&mut self, id: CastId) {
        let Some(cast) = self.cast(id) else {
            return;
        };
        if cast.state == CastState::Cancelled {
            return;
        }
        let (caster, spell, targets, triggered) =
            (cast.caster, cast.spell, cast.targets, cast.is_triggered());
        let Some(info) = self.spell_info(spell) else {
            return;
        };
        if !self.state().contains(caster) {
            return;
        }

        let explicit = targets.unit.unwrap_or(caster);
        let mut target = explicit;
        let mut miss = SpellMissInfo::None;
        let hostile = match (self.unit(caster), self.unit(explicit)) {
            (Some(c), Some(t)) => c.is_hostile_to(t),
            _ => false,
        };

        if explicit != caster && self.state().contains(explicit) {
            if !info.positive && hostile {
                self.combat_start(caster, explicit);
            }
            miss = self.spell_hit_result(caster, explicit, info, true);
            if miss == SpellMissInfo::Reflect {
                self.emit(CombatEvent::SpellMiss {
                    caster,
                    target: explicit,
                    spell,
                    miss,
                });
                target = caster;
                miss = SpellMissInfo::None;
            }
        }

        let procs_enabled = !info.has_attribute(SpellAttributes::DISABLE_PROC);
        let (done, taken) = spell_proc_flags(info.dmg_class, info.positive);

        if miss.is_miss() {
            debug!(%caster, target = %explicit, %spell, %miss, "spell missed");
            self.emit(CombatEvent::SpellMiss {
                caster,
                target: explicit,
                spell,
                miss,
            });
            if procs_enabled {
                let trigger = ProcTrigger::new(caster, Some(explicit))
                    .with_flags(done, taken)
                    .with_spell(spell, ProcSpellType::MASK_ALL, ProcSpellPhase::HIT, triggered)
                    .with_hit(miss_hit_mask(miss))
                    .with_school(info.school)
                    .with_attack_type(attack_type_of(info));
                self.proc_skills_and_auras(&trigger);
            }
        }

        if !procs_enabled && let Some(unit) = self.unit_mut(caster) {
            unit.proc_depth += 1;
        }
        let outcome = self.apply_spell_effects(
            caster,
            info,
            target,
            !miss.is_miss(),
            miss == SpellMissInfo::Block,
        );
        if !procs_enabled && let Some(unit) = self.unit_mut(caster) {
            unit.proc_depth -= 1;
        }

        if miss.is_miss() {
            return;
        }
        if procs_enabled {
            let mut trigger = ProcTrigger::new(caster, Some(target))
                .with_flags(done, taken)
                .with_spell(spell, outcome.spell_type(), ProcSpellPhase::HIT, triggered)
                .with_hit(outcome.hit_mask)
                .with_school(info.school)
                .with_attack_type(attack_type_of(info));
            if let Some(damage) = outcome.damage {
                trigger = trigger.with_damage(damage);
            }
            if let Some(heal) = outcome.heal {
                trigger = trigger.with_heal(heal);
            }
            self.proc_skills_and_auras(&trigger);
        }
        if !info.positive && target != caster {
            self.remove_auras_with_interrupt_flags(
                target,
                AuraInterruptFlags::HIT_BY_SPELL,
                Some(spell),
            );
        }
    }

    fn roll_effect_amount(&mut self, caster: UnitId, effect: &SpellEffectInfo) -> i32 {
        if effect.die_sides == 0 {
            return effect.base_points;
        }
        let roll = self.roll_range(caster, RollContext::DamageVariance, 1, effect.die_sides);
        effect.base_points.saturating_add(roll as i32)
    }

    /// Runs every effect of a spell that landed (or only the caster-side
    /// effects of one that missed).
    fn apply_spell_effects(
        &mut self,
        caster: UnitId,
        info: &SpellInfo,
        target: UnitId,
        landed: bool,
        blocked: bool,
    ) -> EffectOutcome {
        let mut outcome = EffectOutcome {
            damage: None,
            heal: None,
            hit_mask: ProcHitMask::NORMAL,
        };
        let rolls_crit = landed
            && !info.has_attribute(SpellAttributes::CANT_CRIT)
            && info
                .effects
                .iter()
                .any(|e| e.kind.is_damage() || e.kind == SpellEffectKind::Heal);
        let critical = rolls_crit && self.roll_spell_crit(caster, target, info);
        if critical {
            outcome.hit_mask = ProcHitMask::CRITICAL;
        }

        let mut damage_total: Option<u32> = None;
        let mut heal_total: Option<(UnitId, u32)> = None;
        let mut aura_target_mask = EffectMask::empty();
        let mut aura_caster_mask = EffectMask::empty();
        let mut amounts: [Option<i32>; CombatConfig::MAX_SPELL_EFFECTS] =
            [None; CombatConfig::MAX_SPELL_EFFECTS];
        let mut triggers: Vec<(SpellId, UnitId)> = Vec::new();

        for (index, effect) in info.effects.iter().enumerate() {
            let effect_target = match effect.target {
                EffectTarget::Caster => caster,
                EffectTarget::Target => target,
            };
            if effect.target == EffectTarget::Target && !landed {
                continue;
            }
            if effect_target != caster
                && self.is_immune_to_mechanic(effect_target, info.effect_mechanic(index))
            {
                continue;
            }
            let amount = self.roll_effect_amount(caster, effect);

            match effect.kind {
                SpellEffectKind::None => {}
                SpellEffectKind::SchoolDamage => {
                    let done =
                        self.spell_damage_bonus_done(caster, info, index, amount.max(0) as u32);
                    damage_total = Some(damage_total.unwrap_or(0).saturating_add(done));
                }
                SpellEffectKind::WeaponDamage | SpellEffectKind::WeaponPercentDamage => {
                    let weapon = self.roll_weapon_damage(caster, attack_type_of(info));
                    let raw = if effect.kind == SpellEffectKind::WeaponDamage {
                        weapon.saturating_add(amount.max(0) as u32)
                    } else {
                        (u64::from(weapon) * amount.max(0) as u64 / 100) as u32
                    };
                    let school = self.unit(caster).map_or(SchoolMask::NORMAL, |u| {
                        u.weapons[attack_type_of(info).index()].school
                    });
                    let done = self.melee_damage_bonus_done(caster, raw, school);
                    damage_total = Some(damage_total.unwrap_or(0).saturating_add(done));
                }
                SpellEffectKind::Heal => {
                    let done =
                        self.spell_healing_bonus_done(caster, info, index, amount.max(0) as u32);
                    let total = heal_total.map_or(0, |(_, h)| h).saturating_add(done);
                    heal_total = Some((effect_target, total));
                }
                SpellEffectKind::ApplyAura => {
                    amounts[index] = Some(amount);
                    if effect_target == caster {
                        aura_caster_mask |= EffectMask::from_index(index);
                    } else {
                        aura_target_mask |= EffectMask::from_index(index);
                    }
                }
                SpellEffectKind::ApplyAreaAuraFriend | SpellEffectKind::ApplyAreaAuraEnemy => {
                    amounts[index] = Some(amount);
                    aura_caster_mask |= EffectMask::from_index(index);
                }
                SpellEffectKind::TriggerSpell => match effect.trigger_spell {
                    Some(trigger) => triggers.push((trigger, effect_target)),
                    None => warn!(spell = %info.id, index, "trigger effect without a spell"),
                },
                SpellEffectKind::Energize => {
                    self.energize(Some(caster), effect_target, info.id, effect.misc_value, amount);
                }
                SpellEffectKind::AddExtraAttacks => {
                    if let Some(unit) = self.unit_mut(effect_target)
                        && unit.extra_attacks == 0
                    {
                        unit.extra_attacks = amount.max(0) as u32;
                    }
                }
                SpellEffectKind::Dispel => {
                    let dispel = DispelType::from_misc(effect.misc_value);
                    let count = amount.max(1) as u32;
                    self.remove_auras_by_dispel(effect_target, dispel, count, caster);
                }
                SpellEffectKind::InterruptCast => {
                    self.interrupt_target_casts(caster, effect_target, info);
                }
                SpellEffectKind::Dummy => {
                    if let Some(hook) = self.env().scripts().on_dummy(info.id) {
                        hook(
                            self,
                            &DummyContext {
                                caster,
                                target: Some(effect_target),
                                spell: info.id,
                                effect_index: index as u8,
                                amount,
                            },
                        );
                    }
                }
            }
        }

        if landed && !aura_target_mask.is_empty() {
            self.add_aura_from_spell(Some(caster), target, info, aura_target_mask, amounts);
        }
        if !aura_caster_mask.is_empty() {
            self.add_aura_from_spell(Some(caster), caster, info, aura_caster_mask, amounts);
        }

        if let Some(total) = damage_total
            && self.is_alive(target)
        {
            let mut damage = self.calculate_spell_damage(
                Some(caster),
                target,
                info,
                total,
                critical,
                DamageEffectType::SpellDirect,
            );
            self.deal_spell_damage(&mut damage, info, blocked);
            outcome.hit_mask |= damage.hit_mask;
            outcome.damage = Some(damage);
        }

        if let Some((heal_target, total)) = heal_total {
            let mut heal = self.calculate_heal(Some(caster), heal_target, info, total, critical);
            self.heal_unit(&mut heal);
            outcome.heal = Some(heal);
        }

        for (trigger, trigger_target) in triggers {
            if let Err(err) = self.cast_spell(
                caster,
                trigger,
                SpellTargets::unit(trigger_target),
                Some(TriggerSource::Spell(info.id)),
            ) {
                match err {
                    EngineError::UnknownSpell(_) => {
                        error!(spell = %info.id, %trigger, "trigger spell missing")
                    }
                    other => {
                        debug!(spell = %info.id, %trigger, error = %other, "trigger cast failed")
                    }
                }
            }
        }
        outcome
    }

    /// Restores power of the type selected by `misc_value`.
    pub fn energize(
        &mut self,
        caster: Option<UnitId>,
        target: UnitId,
        spell: SpellId,
        misc_value: i32,
        amount: i32,
    ) {
        let Some(power_type) = PowerType::from_misc(misc_value) else {
            warn!(%spell, misc_value, "energize with unknown power type");
            return;
        };
        let Some(unit) = self.unit_mut(target) else {
            return;
        };
        if !unit.is_alive() {
            return;
        }
        let applied = unit.modify_power(power_type, amount);
        self.emit(CombatEvent::Energize {
            caster,
            target,
            spell,
            power_type,
            amount: applied,
        });
    }

    /// Interrupt effect: stops an interruptible cast of the target and locks
    /// the school it was cast from.
    fn interrupt_target_casts(&mut self, caster: UnitId, target: UnitId, info: &SpellInfo) {
        let lockout = info.duration_ms.unwrap_or(0);
        for slot in [CurrentSpellType::Generic, CurrentSpellType::Channeled] {
            let Some(cast_id) = self.unit(target).and_then(|u| u.current_cast(slot)) else {
                continue;
            };
            let Some(cast) = self.cast(cast_id) else {
                continue;
            };
            if !matches!(cast.state, CastState::Preparing | CastState::Casting) {
                continue;
            }
            let Some(interrupted) = self.spell_info(cast.spell) else {
                continue;
            };
            if !interrupted.interrupt_flags.contains(SpellInterruptFlags::INTERRUPT) {
                continue;
            }
            if self.interrupt_spell(target, slot, false, true, Some(caster)) && lockout > 0 {
                let now = self.now();
                if let Some(unit) = self.unit_mut(target) {
                    unit.cooldowns.lock_school(interrupted.school, lockout, now);
                }
            }
        }
    }

    // ========================================================================
    // Slot driven casts
    // ========================================================================

    /// Fires the spell waiting for the next main-hand swing instead of the
    /// swing. Returns false if there is none or it cannot be paid.
    pub(crate) fn fire_next_swing(&mut self, attacker: UnitId, victim: UnitId) -> bool {
        let Some(cast_id) = self
            .unit(attacker)
            .and_then(|u| u.current_cast(CurrentSpellType::Melee))
        else {
            return false;
        };
        let Some(cast) = self.cast(cast_id) else {
            return false;
        };
        if cast.state != CastState::Preparing {
            return false;
        }
        let spell = cast.spell;
        let affordable = self.spell_info(spell).is_some_and(|info| {
            info.power_cost == 0
                || self
                    .unit(attacker)
                    .is_some_and(|u| u.power(info.power_type) >= info.power_cost as i32)
        });
        if !affordable {
            self.emit(CombatEvent::SpellFailure {
                caster: attacker,
                spell,
                reason: CastError::NoPower,
            });
            self.release_slot(attacker, CurrentSpellType::Melee);
            self.cancel_cast(cast_id);
            return false;
        }
        if let Some(c) = self.cast_mut(cast_id) {
            c.targets = SpellTargets::unit(victim);
        }
        self.execute_cast(cast_id);
        true
    }

    /// Shoots the autorepeat spell when the ranged timer is ready.
    fn update_autorepeat(&mut self, unit: UnitId) {
        let Some(cast_id) = self
            .unit(unit)
            .and_then(|u| u.current_cast(CurrentSpellType::Autorepeat))
        else {
            return;
        };
        let Some(cast) = self.cast(cast_id) else {
            return;
        };
        let (spell, target) = (cast.spell, cast.targets.unit);
        let Some(target) = target.filter(|t| self.is_alive(*t)) else {
            self.interrupt_spell(unit, CurrentSpellType::Autorepeat, true, true, None);
            return;
        };
        let Some(u) = self.unit(unit) else {
            return;
        };
        if u.attack_timers[WeaponAttackType::Ranged.index()] > 0
            || u.is_controlled()
            || self.is_generic_cast_in_progress(unit)
        {
            return;
        }
        let interval = match u.weapons[WeaponAttackType::Ranged.index()].attack_time_ms {
            0 => 2_000,
            ms => i64::from(ms),
        };
        let source = Some(TriggerSource::Spell(spell));
        if let Err(err) = self.cast_spell(unit, spell, SpellTargets::unit(target), source) {
            debug!(%unit, %spell, error = %err, "autorepeat shot failed");
        }
        if let Some(u) = self.unit_mut(unit) {
            u.attack_timers[WeaponAttackType::Ranged.index()] = interval;
        }
    }

    /// Advances the slots of one unit, then lets go of finished casts.
    pub(crate) fn update_casts(&mut self, unit: UnitId, diff_ms: u64) {
        let diff = diff_ms.min(i64::MAX as u64) as i64;
        for slot in [CurrentSpellType::Generic, CurrentSpellType::Channeled] {
            let Some(cast_id) = self.unit(unit).and_then(|u| u.current_cast(slot)) else {
                continue;
            };
            let Some(cast) = self.cast_mut(cast_id) else {
                self.release_slot(unit, slot);
                continue;
            };
            match cast.state {
                CastState::Preparing => {
                    cast.timer_ms -= diff;
                    if cast.timer_ms <= 0 {
                        self.execute_cast(cast_id);
                    }
                }
                CastState::Casting => {
                    cast.timer_ms -= diff;
                    if cast.timer_ms <= 0 {
                        debug!(%unit, cast = %cast_id, "channel finished");
                        self.finish_cast(cast_id);
                    }
                }
                _ => {}
            }
        }

        self.update_autorepeat(unit);

        for slot in [
            CurrentSpellType::Generic,
            CurrentSpellType::Channeled,
            CurrentSpellType::Melee,
            CurrentSpellType::Autorepeat,
        ] {
            let Some(cast_id) = self.unit(unit).and_then(|u| u.current_cast(slot)) else {
                continue;
            };
            if self.cast(cast_id).is_none_or(|c| c.state.is_done()) {
                self.release_slot(unit, slot);
            }
        }

        let finished: Vec<CastId> = self
            .state()
            .casts
            .by_caster(unit)
            .filter(|c| c.state.is_done() && !c.referenced_from_current)
            .map(|c| c.id)
            .collect();
        for id in finished {
            self.state_mut().casts.remove(id);
        }
    }

    /// Health-derived aura states of one unit.
    pub(crate) fn update_health_aura_states(&mut self, unit: UnitId) {
        let Some(u) = self.unit_mut(unit) else {
            return;
        };
        let pct = u.health_pct();
        let alive = u.is_alive();
        let mut mask = u.aura_state_mask;
        for (state, on) in [
            (AuraState::Healthless20Percent, alive && pct < 20.0),
            (AuraState::Healthless35Percent, alive && pct < 35.0),
            (AuraState::HealthAbove75Percent, alive && pct > 75.0),
        ] {
            if on {
                mask |= state.bit();
            } else {
                mask &= !state.bit();
            }
        }
        u.aura_state_mask = mask;
    }
}

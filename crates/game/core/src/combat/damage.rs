//! Damage calculation and commit.
//!
//! # Stages
//!
//! ```text
//! weapon roll / effect amount
//!   -> done bonus (flat, percent, spell power coefficient, level penalty)
//!   -> armor (physical only)
//!   -> taken bonus
//!   -> outcome multiplier (crit, glancing, crushing)
//!   == ledger starts (DamageInfo::original)
//!   -> resist -> absorb -> block
//!   -> deal_damage
//! ```
//!
//! `deal_damage` is the single commit point: every health loss, whatever its
//! source, passes through it exactly once, and so do its side effects (rage,
//! threat, interrupts, pushback, fear break, damage-taken scripts).

use tracing::{debug, warn};

use super::{CalcDamageInfo, DamageEffectType, DamageInfo, MeleeHitOutcome};
use crate::aura::{AuraRemoveMode, AuraType};
use crate::config::CombatConfig;
use crate::engine::CombatEngine;
use crate::env::{DamageTakenContext, RollContext};
use crate::event::CombatEvent;
use crate::proc::{ProcFlags, ProcHitMask, ProcTrigger};
use crate::spell::{
    AuraInterruptFlags, CastState, CurrentSpellType, DamageClass, SchoolMask, SpellAttributes,
    SpellInfo, SpellInterruptFlags,
};
use crate::state::{AuraId, SpellId, UnitId, UnitState, WeaponAttackType};

fn school_bits(school: SchoolMask) -> i32 {
    i32::from(school.bits())
}

fn scale(amount: u32, multiplier: f32) -> u32 {
    (amount as f32 * multiplier).max(0.0).min(u32::MAX as f32) as u32
}

fn add_signed(amount: u32, delta: i32) -> u32 {
    (i64::from(amount) + i64::from(delta)).clamp(0, i64::from(u32::MAX)) as u32
}

impl CombatEngine<'_> {
    // ========================================================================
    // Bonuses
    // ========================================================================

    /// Weapon roll with attack power, before any bonus.
    pub fn roll_weapon_damage(&mut self, attacker: UnitId, attack_type: WeaponAttackType) -> u32 {
        let Some(unit) = self.unit(attacker) else {
            return 0;
        };
        let weapon = unit.weapons[attack_type.index()];
        let speed = weapon.attack_time_ms as f32 / 1000.0;
        let ap_bonus = unit.stats.attack_power.max(0) as f32 / 14.0 * speed;
        let mut min = weapon.min_damage + ap_bonus;
        let mut max = weapon.max_damage + ap_bonus;
        if attack_type == WeaponAttackType::Off {
            min *= 0.5;
            max *= 0.5;
        }
        let (min, max) = (min.max(0.0) as u32, max.max(0.0).ceil() as u32);
        self.roll_range(attacker, RollContext::DamageVariance, min, max.max(min))
    }

    /// Attacker-side melee modifiers.
    pub fn melee_damage_bonus_done(
        &self,
        attacker: UnitId,
        damage: u32,
        school: SchoolMask,
    ) -> u32 {
        let query = self.effects_of(attacker);
        let school = school_bits(school);
        let flat = query.total_modifier_by_misc_mask(AuraType::ModDamageDone, school);
        let pct = query.total_multiplier_by_misc_mask(AuraType::ModDamagePercentDone, school);
        scale(add_signed(damage, flat), pct)
    }

    /// Victim-side modifiers, shared by melee and spells.
    pub fn damage_bonus_taken(&self, victim: UnitId, damage: u32, school: SchoolMask) -> u32 {
        let query = self.effects_of(victim);
        let school = school_bits(school);
        let flat = query.total_modifier_by_misc_mask(AuraType::ModDamageTaken, school);
        let pct = query.total_multiplier_by_misc_mask(AuraType::ModDamagePercentTaken, school);
        scale(add_signed(damage, flat), pct)
    }

    /// Caster-side spell modifiers: spell power share, flat and percent
    /// auras, level penalty. Spells flagged `NO_DONE_BONUS` are untouched.
    pub fn spell_damage_bonus_done(
        &self,
        caster: UnitId,
        spell: &SpellInfo,
        effect_index: usize,
        damage: u32,
    ) -> u32 {
        if spell.has_attribute(SpellAttributes::NO_DONE_BONUS) {
            return damage;
        }
        let Some(unit) = self.unit(caster) else {
            return damage;
        };
        let coefficient = spell.effect(effect_index).map_or(0.0, |e| e.bonus_coefficient);
        let query = self.effects_of(caster);
        let flat = query.total_modifier_by_affected_spell(AuraType::ModDamageDone, spell);
        let power = (unit.stats.spell_power + flat).max(0) as f32;
        let bonus = power * coefficient * spell.level_penalty(unit.level);
        let pct = query.total_multiplier_by_affected_spell(AuraType::ModDamagePercentDone, spell);
        scale((damage as f32 + bonus).max(0.0) as u32, pct)
    }

    /// Damage after a critical strike, including crit damage bonus auras.
    pub fn critical_damage(
        &self,
        attacker: UnitId,
        damage: u32,
        school: SchoolMask,
        dmg_class: DamageClass,
    ) -> u32 {
        let config = self.config();
        let base_pct = match dmg_class {
            DamageClass::Melee | DamageClass::Ranged => config.melee_crit_multiplier_pct,
            DamageClass::Magic | DamageClass::None => config.spell_crit_multiplier_pct,
        };
        let mut crit = i64::from(damage) * i64::from(base_pct) / 100;
        let bonus = self
            .effects_of(attacker)
            .total_modifier_by_misc_mask(AuraType::ModCritDamageBonus, school_bits(school));
        if bonus != 0 {
            let extra = (crit - i64::from(damage)) * i64::from(bonus) / 100;
            crit = (crit + extra).max(0);
        }
        crit.min(i64::from(u32::MAX)) as u32
    }

    // ========================================================================
    // White swings
    // ========================================================================

    /// Computes one swing up to the start of the ledger.
    pub fn calculate_melee_damage(
        &mut self,
        attacker: UnitId,
        victim: UnitId,
        attack_type: WeaponAttackType,
    ) -> CalcDamageInfo {
        let mut calc = CalcDamageInfo::new(attacker, victim, attack_type);
        let Some(unit) = self.unit(attacker) else {
            calc.outcome = MeleeHitOutcome::Evade;
            calc.hit_mask = ProcHitMask::EVADE;
            return calc;
        };
        calc.school = unit.weapons[attack_type.index()].school;
        let attacker_level = unit.level;

        let raw = self.roll_weapon_damage(attacker, attack_type);
        let done = self.melee_damage_bonus_done(attacker, raw, calc.school);
        let mitigated = if calc.school.is_physical() {
            self.armor_reduced_damage(Some(attacker), victim, done)
        } else {
            done
        };
        calc.clean_damage = done - mitigated.min(done);
        let mut damage = self.damage_bonus_taken(victim, mitigated, calc.school);

        calc.outcome = self.roll_melee(attacker, victim, attack_type);
        match calc.outcome {
            MeleeHitOutcome::Evade => {
                calc.hit_mask = ProcHitMask::EVADE;
                calc.proc_attacker = ProcFlags::empty();
                calc.proc_victim = ProcFlags::empty();
                damage = 0;
            }
            MeleeHitOutcome::Miss => {
                calc.hit_mask = ProcHitMask::MISS;
                damage = 0;
            }
            MeleeHitOutcome::Dodge => {
                calc.hit_mask = ProcHitMask::DODGE;
                damage = 0;
            }
            MeleeHitOutcome::Parry => {
                calc.hit_mask = ProcHitMask::PARRY;
                damage = 0;
            }
            MeleeHitOutcome::Block => {
                calc.hit_mask = ProcHitMask::NORMAL;
            }
            MeleeHitOutcome::Crit => {
                calc.hit_mask = ProcHitMask::CRITICAL;
                damage = self.critical_damage(attacker, damage, calc.school, DamageClass::Melee);
            }
            MeleeHitOutcome::Glancing => {
                calc.hit_mask = ProcHitMask::NORMAL;
                let level_diff = self
                    .unit(victim)
                    .map_or(0, |v| i32::from(v.level) - i32::from(attacker_level))
                    .clamp(0, 3);
                let reduced = scale(damage, 1.0 - level_diff as f32 * 0.1);
                calc.clean_damage += damage - reduced;
                damage = reduced;
            }
            MeleeHitOutcome::Crushing => {
                calc.hit_mask = ProcHitMask::NORMAL;
                damage = damage.saturating_add(damage / 2);
            }
            MeleeHitOutcome::Normal => {
                calc.hit_mask = ProcHitMask::NORMAL;
            }
        }
        calc.damage = damage;
        calc
    }

    /// Mitigates and commits a swing, then fires procs.
    pub fn deal_melee_damage(&mut self, calc: &CalcDamageInfo) -> DamageInfo {
        let mut info = DamageInfo::new(
            Some(calc.attacker),
            calc.target,
            calc.damage,
            None,
            calc.school,
            DamageEffectType::Direct,
            calc.attack_type,
        );
        info.hit_mask = calc.hit_mask;

        if !calc.outcome.is_avoided() {
            self.apply_resist(&mut info, None);
            self.apply_absorb(&mut info);
            if calc.outcome == MeleeHitOutcome::Block {
                self.apply_block(&mut info);
            }
            self.deal_damage(&info, None, true);
        }

        self.emit(CombatEvent::AttackStateUpdate {
            attacker: calc.attacker,
            victim: calc.target,
            attack_type: calc.attack_type,
            outcome: calc.outcome,
            damage: info.damage(),
            school: calc.school,
            absorbed: info.absorbed(),
            resisted: info.resisted(),
            blocked: info.blocked(),
        });

        let trigger = ProcTrigger::new(calc.attacker, Some(calc.target))
            .with_flags(calc.proc_attacker, calc.proc_victim)
            .with_hit(info.hit_mask)
            .with_school(calc.school)
            .with_attack_type(calc.attack_type)
            .with_damage(info);
        self.proc_skills_and_auras(&trigger);
        info
    }

    /// One auto-attack. A spell queued for the next swing replaces a
    /// main-hand swing. Granted extra attacks run right after the swing
    /// that is not itself one.
    pub fn attacker_state_update(
        &mut self,
        attacker: UnitId,
        victim: UnitId,
        attack_type: WeaponAttackType,
        extra: bool,
    ) {
        let Some(unit) = self.unit(attacker) else {
            return;
        };
        if !unit.is_alive() || unit.is_controlled() || !self.is_alive(victim) {
            return;
        }
        if attack_type != WeaponAttackType::Ranged {
            self.remove_auras_with_interrupt_flags(
                attacker,
                AuraInterruptFlags::MELEE_ATTACK,
                None,
            );
        }
        self.combat_start(attacker, victim);

        if attack_type == WeaponAttackType::Base
            && !extra
            && self.fire_next_swing(attacker, victim)
        {
            return;
        }

        let calc = self.calculate_melee_damage(attacker, victim, attack_type);
        debug!(%attacker, %victim, outcome = %calc.outcome, damage = calc.damage, "swing");
        self.deal_melee_damage(&calc);

        if !extra {
            self.handle_extra_attacks(attacker, victim);
        }
    }

    fn handle_extra_attacks(&mut self, attacker: UnitId, victim: UnitId) {
        let pending = self.unit(attacker).map_or(0, |u| u.extra_attacks);
        if pending == 0 {
            return;
        }
        if let Some(unit) = self.unit_mut(attacker) {
            unit.executing_extra_attacks = true;
        }
        loop {
            let Some(unit) = self.unit_mut(attacker) else {
                return;
            };
            if unit.extra_attacks == 0 {
                break;
            }
            unit.extra_attacks -= 1;
            if !self.is_alive(attacker) || !self.is_alive(victim) {
                break;
            }
            self.attacker_state_update(attacker, victim, WeaponAttackType::Base, true);
        }
        if let Some(unit) = self.unit_mut(attacker) {
            unit.executing_extra_attacks = false;
            unit.extra_attacks = 0;
        }
    }

    // ========================================================================
    // Spell damage
    // ========================================================================

    /// Turns an amount that already carries the caster's done bonus into a
    /// ledger: armor for physical spells, taken bonus, crit.
    pub fn calculate_spell_damage(
        &self,
        caster: Option<UnitId>,
        victim: UnitId,
        spell: &SpellInfo,
        amount: u32,
        critical: bool,
        damage_type: DamageEffectType,
    ) -> DamageInfo {
        let mut damage = amount;
        if spell.school.is_physical() {
            damage = self.armor_reduced_damage(caster, victim, damage);
        }
        damage = self.damage_bonus_taken(victim, damage, spell.school);
        if critical && let Some(caster) = caster {
            damage = self.critical_damage(caster, damage, spell.school, spell.dmg_class);
        }
        let attack_type = if spell.dmg_class == DamageClass::Ranged {
            WeaponAttackType::Ranged
        } else {
            WeaponAttackType::Base
        };
        let mut info = DamageInfo::new(
            caster,
            victim,
            damage,
            Some(spell.id),
            spell.school,
            damage_type,
            attack_type,
        );
        info.hit_mask = if critical {
            ProcHitMask::CRITICAL
        } else {
            ProcHitMask::NORMAL
        };
        info
    }

    /// Mitigates and commits a direct spell hit and logs it.
    pub fn deal_spell_damage(
        &mut self,
        info: &mut DamageInfo,
        spell: &SpellInfo,
        blocked: bool,
    ) -> u32 {
        self.apply_resist(info, Some(spell));
        self.apply_absorb(info);
        if blocked {
            self.apply_block(info);
        }
        let dealt = self.deal_damage(info, Some(spell), true);
        self.emit(CombatEvent::SpellDamageLog {
            caster: info.attacker,
            target: info.victim,
            spell: spell.id,
            damage: dealt,
            school: info.school,
            absorbed: info.absorbed(),
            resisted: info.resisted(),
            blocked: info.blocked(),
            critical: info.hit_mask.contains(ProcHitMask::CRITICAL),
        });
        dealt
    }

    // ========================================================================
    // Commit
    // ========================================================================

    /// Applies `info.damage()` to the victim with every side effect. Returns
    /// the damage dealt.
    pub fn deal_damage(
        &mut self,
        info: &DamageInfo,
        spell: Option<&SpellInfo>,
        durability_loss: bool,
    ) -> u32 {
        let victim = info.victim;
        let attacker = info.attacker.filter(|a| self.state().contains(*a));
        let damage = info.damage();
        let Some(target) = self.unit(victim) else {
            return 0;
        };
        if !target.is_alive() {
            return 0;
        }
        let health_before = target.health();
        let spell_id = spell.map(|s| s.id);

        if info.damage_type != DamageEffectType::NoDamage
            && !spell.is_some_and(|s| s.has_attribute(SpellAttributes::DAMAGE_DOESNT_BREAK_AURAS))
        {
            self.remove_auras_with_interrupt_flags(
                victim,
                AuraInterruptFlags::TAKE_DAMAGE,
                spell_id,
            );
        }

        if let Some(attacker) = attacker
            && attacker != victim
            && info.damage_type == DamageEffectType::Direct
        {
            let critical = info.hit_mask.contains(ProcHitMask::CRITICAL);
            self.reward_rage_dealt(attacker, damage + info.absorbed(), info.attack_type, critical);
        }

        if damage == 0 {
            if attacker != Some(victim) {
                self.reward_rage_taken(victim, info.absorbed(), info.damage_type);
            }
            return 0;
        }

        self.record_damage_statistics(attacker, victim, damage);

        if health_before <= damage {
            debug!(%victim, damage, "lethal damage");
            self.kill(attacker, victim, durability_loss);
            return damage;
        }

        if let Some(unit) = self.unit_mut(victim) {
            unit.modify_health(-i64::from(damage));
        }

        if matches!(info.damage_type, DamageEffectType::Direct | DamageEffectType::SpellDirect) {
            self.remove_auras_with_interrupt_flags(
                victim,
                AuraInterruptFlags::DIRECT_DAMAGE,
                spell_id,
            );
        }

        if let Some(attacker) = attacker {
            self.add_threat(victim, attacker, damage as f32);
        }

        if self.unit(victim).is_some_and(|u| u.is_player()) {
            self.roll_durability_loss(victim);
        }

        if attacker != Some(victim) {
            self.reward_rage_taken(victim, damage + info.absorbed(), info.damage_type);
        }

        if attacker != Some(victim)
            && !matches!(info.damage_type, DamageEffectType::Dot | DamageEffectType::NoDamage)
            && !spell.is_some_and(|s| s.has_attribute(SpellAttributes::NO_PUSHBACK))
        {
            self.pushback_on_damage(victim);
        }

        self.break_fear_on_damage(victim, damage, health_before);
        self.run_damage_taken_hooks(attacker, victim, damage);
        damage
    }

    fn record_damage_statistics(&mut self, attacker: Option<UnitId>, victim: UnitId, damage: u32) {
        if let Some(attacker) = attacker
            && let Some(unit) = self.unit_mut(attacker)
        {
            unit.statistics.damage_done += u64::from(damage);
            unit.statistics.highest_hit_dealt = unit.statistics.highest_hit_dealt.max(damage);
        }
        if let Some(unit) = self.unit_mut(victim) {
            unit.statistics.damage_taken += u64::from(damage);
            unit.statistics.highest_hit_received = unit.statistics.highest_hit_received.max(damage);
        }
    }

    fn roll_durability_loss(&mut self, victim: UnitId) {
        let chance = (self.config().durability_loss_on_damage.clamp(0.0, 1.0) * 10_000.0) as i32;
        if !self.roll_chance(victim, RollContext::Durability, chance) {
            return;
        }
        let slot = self.roll_range(
            victim,
            RollContext::Durability,
            0,
            u32::from(CombatConfig::EQUIPMENT_SLOTS - 1),
        ) as u8;
        self.emit(CombatEvent::DurabilityLoss {
            unit: victim,
            slot: Some(slot),
        });
    }

    /// Casting players lose time on damage: generic casts are pushed back or
    /// aborted, channels are shortened.
    fn pushback_on_damage(&mut self, victim: UnitId) {
        let Some(unit) = self.unit(victim) else {
            return;
        };
        if !unit.is_player() {
            return;
        }
        let generic = unit.current_cast(CurrentSpellType::Generic);
        let channel = unit.current_cast(CurrentSpellType::Channeled);

        if let Some(cast_id) = generic
            && let Some(cast) = self.cast(cast_id)
            && cast.state == CastState::Preparing
            && let Some(info) = self.spell_info(cast.spell)
        {
            if info.interrupt_flags.contains(SpellInterruptFlags::ABORT_ON_DMG) {
                self.interrupt_non_melee_spells(victim, false, None);
            } else if info.interrupt_flags.contains(SpellInterruptFlags::PUSHBACK) {
                self.delay_generic_cast(cast_id);
            }
        }

        if let Some(cast_id) = channel
            && let Some(cast) = self.cast(cast_id)
            && cast.state == CastState::Casting
            && self
                .spell_info(cast.spell)
                .is_some_and(|info| info.interrupt_flags.contains(SpellInterruptFlags::PUSHBACK))
        {
            self.delay_channel(cast_id);
        }
    }

    /// Heavy hits break fear unless the fear spell is exempt.
    fn break_fear_on_damage(&mut self, victim: UnitId, damage: u32, health_before: u32) {
        let pct = u64::from(self.config().fear_break_health_pct);
        if u64::from(damage) * 100 < pct * u64::from(health_before) {
            return;
        }
        let Some(unit) = self.unit(victim) else {
            return;
        };
        let fears: Vec<AuraId> = unit
            .effects
            .effects_by_type(AuraType::ModFear)
            .iter()
            .map(|handle| handle.aura)
            .filter(|aura| {
                self.aura(*aura)
                    .and_then(|a| self.spell_info(a.spell))
                    .is_some_and(|info| !info.has_attribute(SpellAttributes::NO_DAMAGE_FEAR_BREAK))
            })
            .collect();
        for aura in fears {
            self.remove_aura_application(victim, aura, AuraRemoveMode::Interrupt);
        }
    }

    /// Runs every damage-taken script registered by an aura on the victim,
    /// once per aura.
    fn run_damage_taken_hooks(&mut self, attacker: Option<UnitId>, victim: UnitId, damage: u32) {
        let scripts = self.env().scripts();
        if !scripts.has_damage_taken_hooks() {
            return;
        }
        let Some(unit) = self.unit(victim) else {
            return;
        };
        let candidates: Vec<(AuraId, SpellId)> = unit
            .applied_auras
            .values()
            .map(|app| (app.aura, app.spell))
            .collect();
        for (aura, spell) in candidates {
            let Some(hook) = scripts.on_damage_taken(spell) else {
                continue;
            };
            let still_applied = self
                .unit(victim)
                .and_then(|u| u.application(aura))
                .is_some_and(|app| !app.is_being_removed());
            if !still_applied {
                continue;
            }
            hook(
                self,
                &DamageTakenContext {
                    aura,
                    victim,
                    attacker,
                    damage,
                },
            );
        }
    }

    // ========================================================================
    // Death
    // ========================================================================

    /// Kills `victim`. Death procs run while the victim still has its auras;
    /// everything else is torn down afterwards.
    pub fn kill(&mut self, killer: Option<UnitId>, victim: UnitId, durability_loss: bool) {
        let Some(unit) = self.unit_mut(victim) else {
            return;
        };
        if !unit.is_alive() {
            warn!(%victim, "kill on a dead unit");
            return;
        }
        unit.set_health(0);
        unit.statistics.deaths += 1;
        let is_player = unit.is_player();
        if let Some(killer) = killer
            && let Some(k) = self.unit_mut(killer)
        {
            k.statistics.kills += 1;
        }

        if let Some(killer) = killer {
            let trigger = ProcTrigger::new(killer, Some(victim))
                .with_flags(ProcFlags::KILL, ProcFlags::KILLED);
            self.proc_skills_and_auras(&trigger);
        }
        let trigger =
            ProcTrigger::new(victim, None).with_flags(ProcFlags::DEATH, ProcFlags::empty());
        self.proc_skills_and_auras(&trigger);

        if let Some(unit) = self.unit_mut(victim) {
            unit.state.insert(UnitState::DIED);
        }
        self.interrupt_non_melee_spells(victim, true, None);
        self.interrupt_spell(victim, CurrentSpellType::Melee, true, true, None);
        self.attack_stop(victim);
        let attackers: Vec<UnitId> = self
            .unit(victim)
            .map(|u| u.attackers.iter().copied().collect())
            .unwrap_or_default();
        for attacker in attackers {
            self.attack_stop(attacker);
        }
        self.remove_all_auras_on_death(victim);
        self.clear_threat(victim);
        self.clear_in_combat(victim);
        if let Some(unit) = self.unit_mut(victim) {
            unit.extra_attacks = 0;
        }

        self.emit(CombatEvent::UnitDied { unit: victim, killer });
        if is_player && durability_loss {
            self.emit(CombatEvent::DurabilityLoss {
                unit: victim,
                slot: None,
            });
        }
    }
}

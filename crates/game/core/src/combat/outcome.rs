//! Hit tables.
//!
//! Every chance is an integer per 10000. A white swing takes a single roll
//! walked up a cumulative ladder; a spell takes one roll against its
//! class-specific table. Entries that do not apply (attacked from behind,
//! victim stunned, ranged attack) contribute zero instead of being skipped so
//! the ladder order stays fixed.

use tracing::trace;

use super::{MeleeHitOutcome, SpellMissInfo};
use crate::aura::AuraType;
use crate::config::CombatConfig;
use crate::engine::CombatEngine;
use crate::env::RollContext;
use crate::spell::{DamageClass, Mechanic, SpellAttributes, SpellInfo};
use crate::state::{Unit, UnitId, UnitState, WeaponAttackType};

/// Per-10000 chances of one swing, in ladder order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeleeChances {
    pub miss: i32,
    pub dodge: i32,
    pub parry: i32,
    pub block: i32,
    pub crit: i32,
    pub glancing: i32,
    pub crushing: i32,
    /// Victim is sitting: any hit that is not a miss crits.
    pub sitting_crit: bool,
}

/// Walks the ladder with a roll in `0..10000`.
///
/// Order: miss, sitting-target crit, dodge, parry, block, crit, glancing,
/// crushing, normal.
pub fn roll_melee_outcome(chances: &MeleeChances, roll: i32) -> MeleeHitOutcome {
    let mut sum = chances.miss.max(0);
    if roll < sum {
        return MeleeHitOutcome::Miss;
    }
    if chances.sitting_crit && chances.crit > 0 {
        return MeleeHitOutcome::Crit;
    }
    for (chance, outcome) in [
        (chances.dodge, MeleeHitOutcome::Dodge),
        (chances.parry, MeleeHitOutcome::Parry),
        (chances.block, MeleeHitOutcome::Block),
        (chances.crit, MeleeHitOutcome::Crit),
        (chances.glancing, MeleeHitOutcome::Glancing),
        (chances.crushing, MeleeHitOutcome::Crushing),
    ] {
        if chance <= 0 {
            continue;
        }
        sum += chance;
        if roll < sum {
            return outcome;
        }
    }
    MeleeHitOutcome::Normal
}

/// Which avoidance entries a victim can use against one attacker.
struct Avoidance {
    dodge: bool,
    parry: bool,
    block: bool,
}

impl CombatEngine<'_> {
    // ===== melee =====

    /// Rolls a white swing. Missing units evade.
    pub fn roll_melee(
        &mut self,
        attacker: UnitId,
        victim: UnitId,
        attack_type: WeaponAttackType,
    ) -> MeleeHitOutcome {
        let Some(chances) = self.melee_chances(attacker, victim, attack_type) else {
            return MeleeHitOutcome::Evade;
        };
        if self.unit(victim).is_some_and(Unit::is_evading) {
            return MeleeHitOutcome::Evade;
        }
        let roll = self.roll_per_10000(attacker, RollContext::MeleeOutcome) as i32;
        let outcome = roll_melee_outcome(&chances, roll);
        trace!(%attacker, %victim, ?chances, roll, %outcome, "melee outcome");
        outcome
    }

    /// Full ladder for a white swing, `None` if either unit is gone.
    pub fn melee_chances(
        &self,
        attacker: UnitId,
        victim: UnitId,
        attack_type: WeaponAttackType,
    ) -> Option<MeleeChances> {
        let a = self.unit(attacker)?;
        let v = self.unit(victim)?;
        let avoid = self.avoidance(a, v);
        let ranged = attack_type == WeaponAttackType::Ranged;

        let crit = self.melee_crit_chance(attacker, victim);
        let mut chances = MeleeChances {
            miss: self.melee_miss_chance(a, v, attack_type, true),
            crit,
            sitting_crit: v.is_player() && v.has_state(UnitState::SITTING),
            ..MeleeChances::default()
        };
        if !ranged && avoid.dodge {
            chances.dodge = self.dodge_chance(a, v);
        }
        if !ranged && avoid.parry {
            chances.parry = self.parry_chance(a, v);
        }
        if avoid.block {
            chances.block = self.block_chance(a, v);
        }

        // glancing: player side hitting a higher level creature
        if !ranged && a.is_pet_or_player() && !v.is_pet_or_player() && a.level < v.level {
            let skill = a.weapon_skill().min(a.max_skill());
            let glancing = (10 + v.defense_skill() - skill) * 100;
            chances.glancing = glancing.clamp(0, CombatConfig::MAX_GLANCING_CHANCE);
        }

        // crushing: creatures four or more levels above the victim
        if !a.is_player_controlled() && i32::from(a.level) >= i32::from(v.level) + 4 {
            let gap = a.max_skill() - v.defense_skill().min(v.max_skill());
            if gap >= 15 {
                chances.crushing = gap * 200 - 1500;
            }
        }
        Some(chances)
    }

    fn avoidance(&self, attacker: &Unit, victim: &Unit) -> Avoidance {
        if victim.is_controlled() {
            return Avoidance {
                dodge: false,
                parry: false,
                block: false,
            };
        }
        let ignores_direction = self
            .effects_of(victim.id)
            .has_aura_type(AuraType::IgnoreHitDirection);
        let in_front = victim.is_in_front(attacker) || ignores_direction;
        let casting = victim.has_state(UnitState::CASTING);
        Avoidance {
            dodge: victim.avoidance.can_dodge && (in_front || !victim.is_player()),
            parry: victim.avoidance.can_parry && in_front && !casting,
            block: victim.avoidance.can_block && in_front && !casting,
        }
    }

    /// Miss chance of a melee or ranged attack. `white` adds the dual-wield
    /// penalty when the attacker carries an off-hand weapon.
    fn melee_miss_chance(
        &self,
        attacker: &Unit,
        victim: &Unit,
        attack_type: WeaponAttackType,
        white: bool,
    ) -> i32 {
        let config = self.config();
        let mut miss = config.base_miss_chance as i32;
        let dual_wield = attacker.weapons[WeaponAttackType::Off.index()].is_present();
        if white && attack_type != WeaponAttackType::Ranged && dual_wield {
            miss += config.dual_wield_miss_penalty as i32;
        }

        let diff = victim.max_skill() - attacker.weapon_skill();
        miss += if victim.is_player() {
            if diff > 0 { diff * 4 } else { diff * 2 }
        } else if diff > 10 {
            100 + (diff - 10) * 40
        } else {
            diff * 10
        };

        miss -= self.effects_of(attacker.id).total_modifier(AuraType::ModHitChance) * 100;
        miss -= self
            .effects_of(victim.id)
            .total_modifier(AuraType::ModAttackerMeleeHitChance)
            * 100;
        miss.clamp(0, CombatConfig::MAX_MISS_CHANCE)
    }

    fn base_avoidance(&self, victim: &Unit, profile_value: i32) -> i32 {
        if victim.is_player() {
            profile_value
        } else {
            profile_value + self.config().base_avoidance_chance as i32
        }
    }

    fn expertise(&self, attacker: &Unit) -> i32 {
        attacker.stats.expertise
            + self
                .effects_of(attacker.id)
                .total_modifier(AuraType::ModExpertise)
    }

    fn dodge_chance(&self, attacker: &Unit, victim: &Unit) -> i32 {
        let mut chance = self.base_avoidance(victim, victim.avoidance.dodge);
        chance += self.effects_of(victim.id).total_modifier(AuraType::ModDodgePercent) * 100;
        chance -= self.expertise(attacker) * 25;
        chance += (victim.defense_skill() - attacker.weapon_skill()) * 4;
        chance.max(0)
    }

    fn parry_chance(&self, attacker: &Unit, victim: &Unit) -> i32 {
        let mut chance = self.base_avoidance(victim, victim.avoidance.parry);
        chance += self.effects_of(victim.id).total_modifier(AuraType::ModParryPercent) * 100;
        chance -= self.expertise(attacker) * 25;
        chance += (victim.defense_skill() - attacker.weapon_skill()) * 4;
        chance.max(0)
    }

    fn block_chance(&self, attacker: &Unit, victim: &Unit) -> i32 {
        let mut chance = self.base_avoidance(victim, victim.avoidance.block);
        chance += self.effects_of(victim.id).total_modifier(AuraType::ModBlockPercent) * 100;
        chance += (victim.defense_skill() - attacker.weapon_skill()) * 4;
        chance.max(0)
    }

    /// Melee and ranged crit chance against `victim`.
    pub fn melee_crit_chance(&self, attacker: UnitId, victim: UnitId) -> i32 {
        let (Some(a), Some(v)) = (self.unit(attacker), self.unit(victim)) else {
            return 0;
        };
        let mut chance = a.avoidance.crit;
        chance += self.effects_of(attacker).total_modifier(AuraType::ModCritPercent) * 100;
        chance += (a.weapon_skill() - v.defense_skill()) * 4;
        chance -= v.avoidance.crit_resilience;
        chance.clamp(0, 10_000)
    }

    /// Crit chance of a direct spell effect. Spells without a damage class
    /// never crit.
    pub fn spell_crit_chance(&self, caster: UnitId, victim: UnitId, spell: &SpellInfo) -> i32 {
        if spell.has_attribute(SpellAttributes::CANT_CRIT) {
            return 0;
        }
        match spell.dmg_class {
            DamageClass::None => 0,
            DamageClass::Melee | DamageClass::Ranged => self.melee_crit_chance(caster, victim),
            DamageClass::Magic => {
                let (Some(c), Some(v)) = (self.unit(caster), self.unit(victim)) else {
                    return 0;
                };
                let mut chance = c.avoidance.spell_crit;
                let school = i32::from(spell.school.bits());
                chance += self
                    .effects_of(caster)
                    .total_modifier_by_misc_mask(AuraType::ModSpellCritChance, school)
                    * 100;
                if c.is_hostile_to(v) {
                    chance -= v.avoidance.crit_resilience;
                }
                chance.clamp(0, 10_000)
            }
        }
    }

    pub(crate) fn roll_spell_crit(
        &mut self,
        caster: UnitId,
        victim: UnitId,
        spell: &SpellInfo,
    ) -> bool {
        let chance = self.spell_crit_chance(caster, victim, spell);
        self.roll_chance(caster, RollContext::Crit, chance)
    }

    // ===== immunities =====

    pub fn is_immune_to_school(&self, victim: UnitId, spell: &SpellInfo) -> bool {
        let school = i32::from(spell.school.bits());
        self.effects_of(victim)
            .effects(AuraType::SchoolImmunity)
            .any(|(aura, effect)| {
                effect.misc_value & school != 0 && !(aura.positive && spell.positive)
            })
    }

    pub fn is_immune_to_mechanic(&self, victim: UnitId, mechanic: Mechanic) -> bool {
        mechanic != Mechanic::None
            && self
                .effects_of(victim)
                .effects(AuraType::MechanicImmunity)
                .any(|(_, effect)| effect.misc_value == i32::from(mechanic as u8))
    }

    pub fn is_immune_to_damage(&self, victim: UnitId, spell: &SpellInfo) -> bool {
        spell.has_damage_effect()
            && self
                .effects_of(victim)
                .has_misc_mask(AuraType::DamageImmunity, i32::from(spell.school.bits()))
    }

    // ===== spells =====

    /// Per-target hit check of a spell.
    pub fn spell_hit_result(
        &mut self,
        caster: UnitId,
        victim: UnitId,
        spell: &SpellInfo,
        can_reflect: bool,
    ) -> SpellMissInfo {
        let (Some(c), Some(v)) = (self.unit(caster), self.unit(victim)) else {
            return SpellMissInfo::Evade;
        };
        let hostile = c.is_hostile_to(v);
        let evading = v.is_evading();

        if self.is_immune_to_school(victim, spell)
            || self.is_immune_to_mechanic(victim, spell.mechanic)
        {
            return SpellMissInfo::Immune;
        }
        if spell.positive && !hostile {
            return SpellMissInfo::None;
        }
        if self.is_immune_to_damage(victim, spell) {
            return SpellMissInfo::Immune;
        }
        if caster == victim {
            return SpellMissInfo::None;
        }
        if evading {
            return SpellMissInfo::Evade;
        }
        if can_reflect && spell.is_reflectable() {
            let school = i32::from(spell.school.bits());
            let chance = self
                .effects_of(victim)
                .total_modifier_where(AuraType::ReflectSpells, |_, e| {
                    e.misc_value == 0 || e.misc_value & school != 0
                });
            if chance > 0 && self.roll_chance(victim, RollContext::Reflect, chance * 100) {
                return SpellMissInfo::Reflect;
            }
        }
        if spell.has_attribute(SpellAttributes::IGNORE_HIT_RESULT) {
            return SpellMissInfo::None;
        }

        match spell.dmg_class {
            DamageClass::Melee => {
                self.melee_spell_hit_result(caster, victim, spell, WeaponAttackType::Base)
            }
            DamageClass::Ranged => {
                self.melee_spell_hit_result(caster, victim, spell, WeaponAttackType::Ranged)
            }
            DamageClass::Magic => self.magic_spell_hit_result(caster, victim, spell),
            DamageClass::None => SpellMissInfo::None,
        }
    }

    fn mechanic_resist_chance(&self, victim: UnitId, spell: &SpellInfo) -> i32 {
        let query = self.effects_of(victim);
        let mut mechanics = vec![spell.mechanic];
        mechanics.extend(spell.effects.iter().map(|e| e.mechanic));
        mechanics
            .into_iter()
            .filter(|m| *m != Mechanic::None)
            .map(|m| {
                let misc = i32::from(m as u8);
                query.total_modifier_by_misc_value(AuraType::ModMechanicResistance, misc) * 100
            })
            .max()
            .unwrap_or(0)
            .max(0)
    }

    fn deflect_chance(&self, attacker: &Unit, victim: &Unit) -> i32 {
        let query = self.effects_of(victim.id);
        if victim.is_in_front(attacker) || query.has_aura_type(AuraType::IgnoreHitDirection) {
            query.total_modifier(AuraType::DeflectSpells) * 100
        } else {
            0
        }
    }

    fn melee_spell_hit_result(
        &mut self,
        caster: UnitId,
        victim: UnitId,
        spell: &SpellInfo,
        attack_type: WeaponAttackType,
    ) -> SpellMissInfo {
        let (Some(a), Some(v)) = (self.unit(caster), self.unit(victim)) else {
            return SpellMissInfo::Evade;
        };
        let miss = self.melee_miss_chance(a, v, attack_type, false);
        let resist = self.mechanic_resist_chance(victim, spell);
        let ranged = attack_type == WeaponAttackType::Ranged;
        let deflect = if ranged { self.deflect_chance(a, v) } else { 0 };
        let avoid = self.avoidance(a, v);
        let no_avoidance = spell.has_attribute(SpellAttributes::IMPOSSIBLE_DODGE_PARRY_BLOCK);
        let avoidable = !ranged && !no_avoidance;
        let dodge = if avoidable && avoid.dodge {
            self.dodge_chance(a, v)
        } else {
            0
        };
        let parry = if avoidable && avoid.parry {
            self.parry_chance(a, v)
        } else {
            0
        };
        let block = if avoidable && avoid.block && spell.has_attribute(SpellAttributes::BLOCKABLE) {
            self.block_chance(a, v)
        } else {
            0
        };

        let roll = self.roll_per_10000(caster, RollContext::SpellHit) as i32;
        let mut sum = 0;
        for (chance, result) in [
            (miss, SpellMissInfo::Miss),
            (resist, SpellMissInfo::Resist),
            (deflect, SpellMissInfo::Deflect),
            (dodge, SpellMissInfo::Dodge),
            (parry, SpellMissInfo::Parry),
            (block, SpellMissInfo::Block),
        ] {
            sum += chance.max(0);
            if roll < sum {
                return result;
            }
        }
        SpellMissInfo::None
    }

    fn magic_spell_hit_result(
        &mut self,
        caster: UnitId,
        victim: UnitId,
        spell: &SpellInfo,
    ) -> SpellMissInfo {
        let (Some(c), Some(v)) = (self.unit(caster), self.unit(victim)) else {
            return SpellMissInfo::Evade;
        };
        let school = i32::from(spell.school.bits());
        let level_chance = if v.is_player() { 7 } else { 11 };
        let level_diff = i32::from(v.level) - i32::from(c.level);
        let mut hit = if level_diff < 3 {
            96 - level_diff
        } else {
            94 - (level_diff - 2) * level_chance
        };
        hit += self
            .effects_of(victim)
            .total_modifier_by_misc_mask(AuraType::ModAttackerSpellHitChance, school);
        let mut hit = hit * 100;
        hit += self
            .effects_of(caster)
            .total_modifier_by_misc_mask(AuraType::ModSpellHitChance, school)
            * 100;
        let hit = hit.clamp(100, 10_000);

        let mut resist = self.mechanic_resist_chance(victim, spell);
        if !spell.positive && !spell.has_attribute(SpellAttributes::IGNORE_RESISTANCES) {
            resist += self
                .effects_of(victim)
                .total_modifier_by_misc_value(AuraType::ModDebuffResistance, spell.dispel.as_misc())
                * 100;
        }
        let deflect = if v.is_controlled() { 0 } else { self.deflect_chance(c, v) };

        let roll = self.roll_per_10000(caster, RollContext::SpellHit) as i32;
        let mut sum = 10_000 - hit;
        if roll < sum {
            return SpellMissInfo::Miss;
        }
        sum += resist.max(0);
        if roll < sum {
            return SpellMissInfo::Resist;
        }
        sum += deflect.max(0);
        if roll < sum {
            return SpellMissInfo::Deflect;
        }
        SpellMissInfo::None
    }
}

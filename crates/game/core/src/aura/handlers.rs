//! Apply/remove handlers of aura effects.
//!
//! Most effect types are passive: they sit in the effect store and are read
//! by aggregate queries. The handlers here cover the types whose apply or
//! removal changes unit state directly.

use tracing::debug;

use super::{AuraRemoveMode, AuraType};
use crate::engine::CombatEngine;
use crate::spell::{CurrentSpellType, DamageClass, SchoolMask};
use crate::state::{AuraId, UnitId, UnitState};

fn control_flag(aura_type: AuraType) -> Option<UnitState> {
    match aura_type {
        AuraType::ModStun => Some(UnitState::STUNNED),
        AuraType::ModFear => Some(UnitState::FLEEING),
        AuraType::ModRoot => Some(UnitState::ROOT),
        AuraType::ModSilence => Some(UnitState::SILENCED),
        _ => None,
    }
}

impl CombatEngine<'_> {
    /// Runs the handler for one effect of `aura` on `target`.
    ///
    /// On removal the effect is already out of the target's effect store, so
    /// "is another effect of this type left" is a plain store lookup.
    pub(crate) fn handle_aura_effect(
        &mut self,
        target: UnitId,
        aura: AuraId,
        aura_type: AuraType,
        apply: bool,
        mode: Option<AuraRemoveMode>,
    ) {
        if let Some(flag) = control_flag(aura_type) {
            self.handle_control_state(target, aura_type, flag, apply);
            return;
        }
        match aura_type {
            AuraType::SchoolImmunity if apply => self.apply_school_immunity(target, aura),
            AuraType::MechanicImmunity if apply => self.apply_mechanic_immunity(target, aura),
            t if t.affects_stats() => self.recompute_stats(target),
            _ => {}
        }
        if !apply {
            debug!(%target, %aura, ?aura_type, ?mode, "effect removed");
        }
    }

    fn handle_control_state(
        &mut self,
        target: UnitId,
        aura_type: AuraType,
        flag: UnitState,
        apply: bool,
    ) {
        let Some(unit) = self.unit_mut(target) else {
            return;
        };
        if !apply {
            if !unit.effects.has_type(aura_type) {
                unit.state.remove(flag);
            }
            return;
        }
        unit.state.insert(flag);
        match aura_type {
            AuraType::ModStun | AuraType::ModFear => {
                self.interrupt_non_melee_spells(target, false, None);
            }
            AuraType::ModSilence => {
                for slot in [CurrentSpellType::Generic, CurrentSpellType::Channeled] {
                    let magic = self
                        .unit(target)
                        .and_then(|u| u.current_cast(slot))
                        .and_then(|id| self.cast(id))
                        .and_then(|c| self.spell_info(c.spell))
                        .is_some_and(|info| info.dmg_class == DamageClass::Magic);
                    if magic {
                        self.interrupt_spell(target, slot, false, true, None);
                    }
                }
            }
            _ => {}
        }
    }

    /// Harmful auras of the newly immune schools fall off.
    fn apply_school_immunity(&mut self, target: UnitId, aura: AuraId) {
        let Some(mask) = self.immunity_misc(aura, AuraType::SchoolImmunity) else {
            return;
        };
        let schools = SchoolMask::from_bits_truncate(mask as u8);
        let candidates: Vec<AuraId> = match self.unit(target) {
            Some(unit) => unit
                .applied_auras
                .values()
                .filter(|app| app.aura != aura && !app.positive)
                .filter(|app| {
                    self.spell_info(app.spell)
                        .is_some_and(|info| !info.is_passive() && info.school.intersects(schools))
                })
                .map(|app| app.aura)
                .collect(),
            None => return,
        };
        for id in candidates {
            self.remove_aura_application(target, id, AuraRemoveMode::Default);
        }
    }

    fn apply_mechanic_immunity(&mut self, target: UnitId, aura: AuraId) {
        let Some(mechanic) = self.immunity_misc(aura, AuraType::MechanicImmunity) else {
            return;
        };
        if !(1..32).contains(&mechanic) {
            return;
        }
        self.remove_auras_with_mechanic(target, 1 << mechanic, Some(aura), AuraRemoveMode::Default);
    }

    fn immunity_misc(&self, aura: AuraId, aura_type: AuraType) -> Option<i32> {
        self.aura(aura)?
            .effects()
            .find(|e| e.aura_type == aura_type)
            .map(|e| e.misc_value)
    }

    /// Rebuilds the aura-derived stats of a unit from its base values.
    pub(crate) fn recompute_stats(&mut self, unit: UnitId) {
        let query = self.effects_of(unit);
        let flat_health = query.total_modifier(AuraType::ModIncreaseHealth);
        let health_pct = query.total_multiplier(AuraType::ModIncreaseHealthPercent);
        let attack_power = query.total_modifier(AuraType::ModAttackPower);
        let haste = query.total_modifier(AuraType::ModMeleeHaste);
        let mut resist = [0i32; SchoolMask::COUNT];
        for (index, value) in resist.iter_mut().enumerate() {
            *value = query.total_modifier_by_misc_mask(AuraType::ModResistance, 1 << index);
        }

        let Some(u) = self.unit_mut(unit) else {
            return;
        };
        u.stats.armor = u.stats.base_armor.saturating_add(resist[0]);
        for (index, value) in resist.iter().enumerate().skip(1) {
            u.stats.resistances[index] = u.stats.base_resistances[index].saturating_add(*value);
        }
        u.stats.attack_power = u.stats.base_attack_power.saturating_add(attack_power);
        u.stats.melee_haste_pct = haste;

        let base_health = i64::from(u.stats.base_max_health) + i64::from(flat_health);
        let max_health = (base_health as f32 * health_pct).clamp(1.0, u32::MAX as f32) as u32;
        let previous = u.max_health();
        if max_health != previous {
            u.set_max_health(max_health);
            if max_health > previous && u.is_alive() {
                u.modify_health(i64::from(max_health - previous));
            }
        }
    }

    /// Amounts of an aura changed (restack, refresh): stat effects are
    /// recomputed on every target.
    pub(crate) fn on_aura_amounts_changed(&mut self, aura: AuraId) {
        let Some(a) = self.aura(aura) else {
            return;
        };
        if !a.effects().any(|e| e.aura_type.affects_stats()) {
            return;
        }
        let targets: Vec<UnitId> = a.targets().collect();
        for target in targets {
            self.recompute_stats(target);
        }
    }
}

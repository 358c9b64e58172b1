//! Per-tick driver.
//!
//! One world tick advances the clock once, then updates every unit in id
//! order. The per-unit order is fixed:
//!
//! ```text
//! deferred events -> cast slots -> auras (durations, ticks, area targets)
//!   -> expired sweep -> release removed auras -> combat timer
//!   -> attack timers -> melee swing -> health aura states
//! ```

use tracing::trace;

use super::CombatEngine;
use crate::spell::CurrentSpellType;
use crate::state::{DeferredEvent, UnitId, UnitState, WeaponAttackType};

impl CombatEngine<'_> {
    /// Advances the world by `diff_ms`.
    pub fn update_world(&mut self, diff_ms: u64) {
        self.state.clock = self.state.clock + diff_ms;
        trace!(clock = %self.state.clock, diff_ms, "world tick");
        for unit in self.state.unit_ids() {
            self.update_unit(unit, diff_ms);
        }
    }

    /// Runs one update of `unit` at the current clock.
    ///
    /// # Panics
    ///
    /// If the unit's proc depth is not zero: some proc dispatch leaked its
    /// counter.
    pub fn update_unit(&mut self, unit: UnitId, diff_ms: u64) {
        let now = self.now();
        let due = match self.unit_mut(unit) {
            Some(u) => {
                u.last_update = now;
                u.cooldowns.prune(now);
                u.deferred.pop_due(now)
            }
            None => return,
        };
        for event in due {
            match event {
                DeferredEvent::SpellHit { cast } => self.land_projectile(cast),
            }
        }

        self.update_casts(unit, diff_ms);

        let depth = self.unit(unit).map_or(0, |u| u.proc_depth);
        assert_eq!(depth, 0, "unit {unit} entered update with proc depth {depth}");

        self.update_owned_auras(unit, diff_ms);
        self.remove_expired_auras(unit);
        self.release_removed_auras(unit);
        self.update_combat_state(unit, diff_ms);
        self.update_attack_timers(unit, diff_ms);
        self.update_melee_swing(unit);
        self.update_health_aura_states(unit);
    }

    fn update_attack_timers(&mut self, unit: UnitId, diff_ms: u64) {
        let Some(u) = self.unit_mut(unit) else {
            return;
        };
        let diff = diff_ms.min(i64::MAX as u64) as i64;
        for timer in &mut u.attack_timers {
            if *timer > 0 {
                *timer = (*timer - diff).max(0);
            }
        }
    }

    /// Swing time of `attack_type` after melee haste.
    fn swing_time_ms(&self, unit: UnitId, attack_type: WeaponAttackType) -> i64 {
        let Some(u) = self.unit(unit) else {
            return 0;
        };
        let base = i64::from(u.weapons[attack_type.index()].attack_time_ms);
        let haste = 100 + i64::from(u.stats.melee_haste_pct);
        if haste <= 0 { base } else { base * 100 / haste }
    }

    /// Swings main and off hand when their timers are ready and the victim
    /// is in reach.
    fn update_melee_swing(&mut self, unit: UnitId) {
        let Some(u) = self.unit(unit) else {
            return;
        };
        let Some(victim) = u.victim else {
            return;
        };
        if !u.has_state(UnitState::MELEE_ATTACKING) || !u.is_alive() || u.is_controlled() {
            return;
        }
        if !self.is_alive(victim) {
            self.attack_stop(unit);
            return;
        }
        // Hard casts hold the swing timers.
        if u.has_state(UnitState::CASTING)
            && u.current_cast(CurrentSpellType::Generic)
                .or_else(|| u.current_cast(CurrentSpellType::Channeled))
                .is_some()
        {
            return;
        }
        let Some(target) = self.unit(victim) else {
            return;
        };
        if u.distance_to(target) > self.config().melee_range || !u.is_in_front(target) {
            return;
        }
        let has_off_hand = u.weapons[WeaponAttackType::Off.index()].is_present();

        for attack_type in [WeaponAttackType::Base, WeaponAttackType::Off] {
            if attack_type == WeaponAttackType::Off && !has_off_hand {
                continue;
            }
            let ready = self
                .unit(unit)
                .is_some_and(|u| u.attack_timers[attack_type.index()] <= 0);
            if !ready || !self.is_alive(unit) || !self.is_alive(victim) {
                continue;
            }
            self.attacker_state_update(unit, victim, attack_type, false);
            let next = self.swing_time_ms(unit, attack_type);
            if let Some(u) = self.unit_mut(unit) {
                u.attack_timers[attack_type.index()] = next;
            }
        }
    }
}

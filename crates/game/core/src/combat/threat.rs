//! Threat lists and combat state.
//!
//! A creature keeps a [`ThreatList`] of everyone that attacked it or helped
//! its attackers. The reverse edge lives on the attacker as
//! `Unit::hostile_refs`; both sides are updated together so they never
//! disagree.

use std::collections::BTreeMap;

use tracing::debug;

use crate::engine::CombatEngine;
use crate::event::CombatEvent;
use crate::spell::AuraInterruptFlags;
use crate::state::{UnitId, UnitState};

/// Threat per hostile unit.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ThreatList {
    entries: BTreeMap<UnitId, f32>,
}

impl ThreatList {
    /// Adds `amount` (may be negative), creating the entry if needed.
    /// Threat never drops below zero.
    pub fn add(&mut self, unit: UnitId, amount: f32) {
        let entry = self.entries.entry(unit).or_insert(0.0);
        *entry = (*entry + amount).max(0.0);
    }

    /// Scales an existing entry by `percent` (e.g. -50 halves it).
    pub fn modify_pct(&mut self, unit: UnitId, percent: i32) {
        if let Some(entry) = self.entries.get_mut(&unit) {
            *entry = (*entry * (100 + percent) as f32 / 100.0).max(0.0);
        }
    }

    pub fn remove(&mut self, unit: UnitId) -> Option<f32> {
        self.entries.remove(&unit)
    }

    pub fn get(&self, unit: UnitId) -> Option<f32> {
        self.entries.get(&unit).copied()
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.entries.contains_key(&unit)
    }

    /// Unit with the highest threat. Ties go to the lowest id.
    pub fn top(&self) -> Option<UnitId> {
        let mut best: Option<(UnitId, f32)> = None;
        for (unit, threat) in &self.entries {
            if best.is_none_or(|(_, top)| *threat > top) {
                best = Some((*unit, *threat));
            }
        }
        best.map(|(unit, _)| unit)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (UnitId, f32)> + '_ {
        self.entries.iter().map(|(unit, threat)| (*unit, *threat))
    }

    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.entries.keys().copied()
    }
}

impl CombatEngine<'_> {
    /// Puts both units in combat and links them on threat lists.
    pub fn combat_start(&mut self, attacker: UnitId, victim: UnitId) {
        if attacker == victim || !self.is_alive(attacker) || !self.is_alive(victim) {
            return;
        }
        for unit in [attacker, victim] {
            if let Some(u) = self.unit_mut(unit) {
                u.state.remove(UnitState::SITTING);
                if !u.in_combat {
                    debug!(%unit, "enter combat");
                }
                u.in_combat = true;
            }
        }
        self.set_combat_timer(attacker);
        self.set_combat_timer(victim);
        self.add_threat(victim, attacker, 0.0);
        self.add_threat(attacker, victim, 0.0);
    }

    fn set_combat_timer(&mut self, unit: UnitId) {
        let timeout = i64::from(self.config().combat_timeout_ms);
        if let Some(u) = self.unit_mut(unit)
            && u.is_player_controlled()
        {
            u.combat_timer_ms = timeout;
        }
    }

    /// Adds threat of `source` on `holder`'s list. No-op for units without a
    /// threat list.
    pub fn add_threat(&mut self, holder: UnitId, source: UnitId, amount: f32) {
        if holder == source || !self.is_alive(source) {
            return;
        }
        let Some(unit) = self.unit_mut(holder) else {
            return;
        };
        if !unit.can_have_threat_list() || !unit.is_alive() {
            return;
        }
        unit.threat.add(source, amount);
        unit.in_combat = true;
        if let Some(src) = self.unit_mut(source) {
            src.hostile_refs.insert(holder);
            src.in_combat = true;
        }
    }

    /// Removes `source` from `holder`'s threat list and the reverse edge.
    pub fn remove_threat(&mut self, holder: UnitId, source: UnitId) {
        if let Some(unit) = self.unit_mut(holder) {
            unit.threat.remove(source);
        }
        if let Some(src) = self.unit_mut(source) {
            src.hostile_refs.remove(&holder);
        }
    }

    /// Spreads healing threat over every creature fighting `target`.
    pub(crate) fn add_heal_threat(&mut self, healer: UnitId, target: UnitId, gain: u32) {
        if gain == 0 {
            return;
        }
        let holders: Vec<UnitId> = self
            .unit(target)
            .map(|u| u.hostile_refs.iter().copied().collect())
            .unwrap_or_default();
        if holders.is_empty() {
            return;
        }
        let share = gain as f32 * 0.5 / holders.len() as f32;
        for holder in holders {
            self.add_threat(holder, healer, share);
        }
    }

    /// Drops every threat edge of `unit` in both directions.
    pub fn clear_threat(&mut self, unit: UnitId) {
        let (holders, sources): (Vec<UnitId>, Vec<UnitId>) = match self.unit_mut(unit) {
            Some(u) => {
                let holders = core::mem::take(&mut u.hostile_refs).into_iter().collect();
                let sources = u.threat.units().collect();
                u.threat.clear();
                (holders, sources)
            }
            None => return,
        };
        for holder in holders {
            if let Some(h) = self.unit_mut(holder) {
                h.threat.remove(unit);
            }
        }
        for source in sources {
            if let Some(s) = self.unit_mut(source) {
                s.hostile_refs.remove(&unit);
            }
        }
    }

    /// Leaves combat. Auras that end when combat ends are removed.
    pub fn clear_in_combat(&mut self, unit: UnitId) {
        let Some(u) = self.unit_mut(unit) else {
            return;
        };
        if !u.in_combat {
            return;
        }
        u.in_combat = false;
        u.combat_timer_ms = 0;
        debug!(%unit, "leave combat");
        self.remove_auras_with_interrupt_flags(unit, AuraInterruptFlags::LEAVE_COMBAT, None);
    }

    /// Starts auto-attacking `victim`.
    pub fn attack_start(&mut self, attacker: UnitId, victim: UnitId) -> bool {
        if attacker == victim || !self.is_alive(attacker) || !self.is_alive(victim) {
            return false;
        }
        let previous = self.unit(attacker).and_then(|u| u.victim);
        if previous == Some(victim) {
            if let Some(a) = self.unit_mut(attacker) {
                a.state.insert(UnitState::MELEE_ATTACKING);
            }
            return false;
        }
        if let Some(old) = previous
            && let Some(o) = self.unit_mut(old)
        {
            o.attackers.remove(&attacker);
        }
        if let Some(a) = self.unit_mut(attacker) {
            a.victim = Some(victim);
            a.state.insert(UnitState::MELEE_ATTACKING);
        }
        if let Some(v) = self.unit_mut(victim) {
            v.attackers.insert(attacker);
        }
        self.combat_start(attacker, victim);
        self.emit(CombatEvent::AttackStart { attacker, victim });
        true
    }

    /// Stops auto-attacking. Returns false if there was no victim.
    pub fn attack_stop(&mut self, attacker: UnitId) -> bool {
        let Some(a) = self.unit_mut(attacker) else {
            return false;
        };
        a.state.remove(UnitState::MELEE_ATTACKING);
        let Some(victim) = a.victim.take() else {
            return false;
        };
        if let Some(v) = self.unit_mut(victim) {
            v.attackers.remove(&attacker);
        }
        self.emit(CombatEvent::AttackStop {
            attacker,
            victim: Some(victim),
        });
        true
    }

    /// Ticks the combat state of one unit.
    ///
    /// Player-controlled units leave combat when nobody holds them on a threat
    /// list, they are not swinging, and the timer ran out. Creatures leave
    /// combat as soon as their threat list is empty.
    pub(crate) fn update_combat_state(&mut self, unit: UnitId, diff_ms: u64) {
        let Some(u) = self.unit_mut(unit) else {
            return;
        };
        if !u.in_combat {
            return;
        }
        if u.is_player_controlled() {
            if !u.hostile_refs.is_empty() || u.has_state(UnitState::MELEE_ATTACKING) {
                return;
            }
            u.combat_timer_ms -= diff_ms.min(i64::MAX as u64) as i64;
            if u.combat_timer_ms > 0 {
                return;
            }
        } else if u.can_have_threat_list() && !u.threat.is_empty() {
            return;
        }
        self.clear_in_combat(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_prefers_highest_then_lowest_id() {
        let mut list = ThreatList::default();
        list.add(UnitId(5), 100.0);
        list.add(UnitId(2), 100.0);
        list.add(UnitId(9), 50.0);
        assert_eq!(list.top(), Some(UnitId(2)));
        list.add(UnitId(9), 60.0);
        assert_eq!(list.top(), Some(UnitId(9)));
    }

    #[test]
    fn threat_never_goes_negative() {
        let mut list = ThreatList::default();
        list.add(UnitId(1), 30.0);
        list.add(UnitId(1), -100.0);
        assert_eq!(list.get(UnitId(1)), Some(0.0));
        list.modify_pct(UnitId(1), -50);
        assert_eq!(list.get(UnitId(1)), Some(0.0));
    }
}

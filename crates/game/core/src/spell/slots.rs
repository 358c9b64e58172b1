//! The four current-cast slots of a unit and their interruption matrix.
//!
//! | new cast   | interrupts                                                     |
//! |------------|----------------------------------------------------------------|
//! | generic    | generic, non-delayed channel, autorepeat except auto-shot      |
//! | channeled  | non-delayed generic, channel, autorepeat except auto-shot      |
//! | autorepeat | autorepeat; non-delayed generic and channel unless auto-shot   |
//! | melee      | melee                                                          |
//!
//! A slot always points at a cast in the world's arena. Letting go of a cast
//! clears `referenced_from_current`, which turns queued work for a cancelled
//! cast into a no-op.

use tracing::debug;

use super::{CastState, CurrentSpellType, SpellInfo};
use crate::aura::AuraRemoveMode;
use crate::engine::CombatEngine;
use crate::event::CombatEvent;
use crate::state::{AuraId, CastId, SpellId, UnitId, UnitState};

/// Slot a spell occupies while it is being cast.
pub fn slot_for(info: &SpellInfo) -> CurrentSpellType {
    if info.is_next_melee_swing() {
        CurrentSpellType::Melee
    } else if info.is_autorepeat() {
        CurrentSpellType::Autorepeat
    } else if info.is_channeled() {
        CurrentSpellType::Channeled
    } else {
        CurrentSpellType::Generic
    }
}

impl CombatEngine<'_> {
    /// Puts `cast` into its slot, interrupting whatever the matrix says it
    /// displaces. Returns the slot.
    pub(crate) fn set_current_cast(
        &mut self,
        unit: UnitId,
        cast: CastId,
    ) -> Option<CurrentSpellType> {
        let (spell, instant) = {
            let c = self.cast(cast)?;
            (c.spell, c.is_instant())
        };
        let info = self.spell_info(spell)?;
        let slot = slot_for(info);

        if self.unit(unit)?.current_cast(slot) == Some(cast) {
            return Some(slot);
        }

        let ranged = self.config().default_ranged_spell;
        let autorepeat_breakable = self.autorepeat_spell(unit).is_some_and(|s| s != ranged);

        match slot {
            CurrentSpellType::Generic => {
                self.interrupt_spell(unit, CurrentSpellType::Generic, false, true, None);
                self.interrupt_spell(unit, CurrentSpellType::Channeled, false, true, None);
                if autorepeat_breakable {
                    self.interrupt_spell(unit, CurrentSpellType::Autorepeat, true, true, None);
                }
            }
            CurrentSpellType::Channeled => {
                self.interrupt_spell(unit, CurrentSpellType::Generic, false, true, None);
                self.interrupt_spell(unit, CurrentSpellType::Channeled, true, true, None);
                if autorepeat_breakable {
                    self.interrupt_spell(unit, CurrentSpellType::Autorepeat, true, true, None);
                }
            }
            CurrentSpellType::Autorepeat => {
                self.interrupt_spell(unit, CurrentSpellType::Autorepeat, true, true, None);
                if spell != ranged {
                    self.interrupt_spell(unit, CurrentSpellType::Generic, false, true, None);
                    self.interrupt_spell(unit, CurrentSpellType::Channeled, false, true, None);
                }
            }
            CurrentSpellType::Melee => {
                self.interrupt_spell(unit, CurrentSpellType::Melee, true, true, None);
            }
        }

        let u = self.unit_mut(unit)?;
        let displaced = u.current_casts[slot.index()].replace(cast);
        if let Some(previous) = displaced.filter(|p| *p != cast)
            && let Some(c) = self.cast_mut(previous)
        {
            c.referenced_from_current = false;
        }
        let Some(u) = self.unit_mut(unit) else {
            return Some(slot);
        };
        let raises_casting = match slot {
            CurrentSpellType::Generic => !instant,
            CurrentSpellType::Channeled => true,
            _ => false,
        };
        if raises_casting {
            u.state.insert(UnitState::CASTING);
        }
        if let Some(c) = self.cast_mut(cast) {
            c.slot = Some(slot);
            c.referenced_from_current = true;
        }
        Some(slot)
    }

    fn autorepeat_spell(&self, unit: UnitId) -> Option<SpellId> {
        let cast = self.unit(unit)?.current_cast(CurrentSpellType::Autorepeat)?;
        self.cast(cast).map(|c| c.spell)
    }

    /// Cancels the occupant of `slot`.
    ///
    /// No-op for an empty slot, a delayed occupant unless `with_delayed`, an
    /// instant occupant unless `with_instant`, and a spell that ignores
    /// interrupts from others when `interrupter` is another unit. Returns
    /// true if a cast was cancelled.
    pub fn interrupt_spell(
        &mut self,
        unit: UnitId,
        slot: CurrentSpellType,
        with_delayed: bool,
        with_instant: bool,
        interrupter: Option<UnitId>,
    ) -> bool {
        let Some(cast_id) = self.unit(unit).and_then(|u| u.current_cast(slot)) else {
            return false;
        };
        let Some(cast) = self.cast(cast_id) else {
            self.release_slot(unit, slot);
            return false;
        };
        if cast.state == CastState::Delayed && !with_delayed {
            return false;
        }
        if cast.is_instant() && !with_instant {
            return false;
        }
        if interrupter.is_some_and(|other| other != unit)
            && self.config().is_uninterruptible_by_others(cast.spell)
        {
            debug!(%unit, spell = %cast.spell, "interrupt ignored");
            return false;
        }
        let spell = cast.spell;
        let was_active = cast.is_active();

        self.release_slot(unit, slot);
        if was_active {
            self.cancel_cast(cast_id);
            self.emit(CombatEvent::SpellInterrupted {
                caster: unit,
                spell,
                cast: cast_id,
            });
        }
        true
    }

    /// Interrupts generic, autorepeat (except the default ranged attack) and
    /// channeled casts.
    pub fn interrupt_non_melee_spells(
        &mut self,
        unit: UnitId,
        with_delayed: bool,
        interrupter: Option<UnitId>,
    ) {
        self.interrupt_spell(unit, CurrentSpellType::Generic, with_delayed, true, interrupter);
        if self
            .autorepeat_spell(unit)
            .is_some_and(|s| s != self.config().default_ranged_spell)
        {
            self.interrupt_spell(unit, CurrentSpellType::Autorepeat, true, true, interrupter);
        }
        self.interrupt_spell(unit, CurrentSpellType::Channeled, true, true, interrupter);
    }

    /// Marks a cast cancelled. A channel takes its auras with it.
    pub(crate) fn cancel_cast(&mut self, cast_id: CastId) {
        let Some(cast) = self.cast_mut(cast_id) else {
            return;
        };
        if cast.state.is_done() {
            return;
        }
        let was_channeling = cast.state == CastState::Casting;
        cast.state = CastState::Cancelled;
        let (caster, spell, target) = (cast.caster, cast.spell, cast.targets.unit);
        if was_channeling {
            self.remove_channel_auras(caster, spell, target);
        }
    }

    fn channel_auras(
        &self,
        caster: UnitId,
        spell: SpellId,
        target: Option<UnitId>,
    ) -> Vec<(UnitId, AuraId)> {
        let mut found = Vec::new();
        for unit in [Some(caster), target].into_iter().flatten() {
            let Some(u) = self.unit(unit) else {
                continue;
            };
            for app in u.applications_of(spell) {
                if self.aura(app.aura).is_some_and(|a| a.caster == Some(caster)) {
                    found.push((unit, app.aura));
                }
            }
        }
        found.sort();
        found.dedup();
        found
    }

    fn remove_channel_auras(&mut self, caster: UnitId, spell: SpellId, target: Option<UnitId>) {
        for (unit, aura) in self.channel_auras(caster, spell, target) {
            self.remove_aura_application(unit, aura, AuraRemoveMode::Cancel);
        }
    }

    /// Empties a slot without touching the cast's state.
    pub(crate) fn release_slot(&mut self, unit: UnitId, slot: CurrentSpellType) {
        let Some(u) = self.unit_mut(unit) else {
            return;
        };
        let Some(cast_id) = u.current_casts[slot.index()].take() else {
            return;
        };
        if u.current_cast(CurrentSpellType::Generic).is_none()
            && u.current_cast(CurrentSpellType::Channeled).is_none()
        {
            u.state.remove(UnitState::CASTING);
        }
        if let Some(cast) = self.cast_mut(cast_id) {
            cast.referenced_from_current = false;
        }
    }

    /// Casting player hit during a cast bar: the bar is pushed back, never
    /// past the full cast time, at most `max_pushbacks` times.
    pub(crate) fn delay_generic_cast(&mut self, cast_id: CastId) {
        let pushback = i64::from(self.config().pushback_ms);
        let max_pushbacks = self.config().max_pushbacks;
        let Some(cast) = self.cast_mut(cast_id) else {
            return;
        };
        if cast.pushback_count >= max_pushbacks {
            return;
        }
        let delay = pushback.min(i64::from(cast.cast_time_ms) - cast.timer_ms).max(0);
        cast.timer_ms += delay;
        cast.pushback_count += 1;
        debug!(cast = %cast_id, delay, "cast pushed back");
    }

    /// Channeling player hit: the channel loses a quarter of its duration,
    /// and so do the auras it maintains.
    pub(crate) fn delay_channel(&mut self, cast_id: CastId) {
        let max_pushbacks = self.config().max_pushbacks;
        let Some(cast) = self.cast(cast_id) else {
            return;
        };
        if cast.pushback_count >= max_pushbacks {
            return;
        }
        let (caster, spell, target) = (cast.caster, cast.spell, cast.targets.unit);
        let duration = self
            .spell_info(spell)
            .and_then(|info| info.duration_ms)
            .map_or(0, i64::from);
        let delay = (duration / 4).min(cast.timer_ms).max(0);

        if let Some(cast) = self.cast_mut(cast_id) {
            cast.timer_ms -= delay;
            cast.pushback_count += 1;
        }
        for (_, aura) in self.channel_auras(caster, spell, target) {
            if let Some(a) = self.aura_mut(aura)
                && a.duration_ms > 0
            {
                a.duration_ms = (a.duration_ms - delay).max(0);
            }
        }
        debug!(cast = %cast_id, delay, "channel shortened");
    }

    /// Ends a cast normally and lets go of its slot.
    pub(crate) fn finish_cast(&mut self, cast_id: CastId) {
        let Some(cast) = self.cast_mut(cast_id) else {
            return;
        };
        if cast.state.is_done() {
            return;
        }
        cast.state = CastState::Finished;
        let (caster, slot) = (cast.caster, cast.slot);
        if let Some(slot) = slot
            && self.unit(caster).and_then(|u| u.current_cast(slot)) == Some(cast_id)
        {
            self.release_slot(caster, slot);
        }
    }

    /// True if no two slots of `unit` point at the same cast and every
    /// occupant is a live cast of that unit.
    pub fn slots_consistent(&self, unit: UnitId) -> bool {
        let Some(u) = self.unit(unit) else {
            return true;
        };
        let occupants: Vec<CastId> = u.current_casts.iter().flatten().copied().collect();
        let mut unique = occupants.clone();
        unique.sort();
        unique.dedup();
        unique.len() == occupants.len()
            && occupants
                .iter()
                .all(|id| {
                    self.cast(*id)
                        .is_some_and(|c| c.caster == unit && c.referenced_from_current)
                })
    }
}

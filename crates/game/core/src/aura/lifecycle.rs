//! Aura creation, stacking, application and removal.
//!
//! # Removal protocol
//!
//! Removal handlers may remove, add or restack auras on any unit. Every
//! bulk removal therefore runs in two phases:
//!
//! 1. collect the ids of the applications that match, without mutating;
//! 2. for each id, re-check that the application still exists, is not
//!    already being removed and still matches, then remove it.
//!
//! Nothing holds an iterator into a unit's collections while a handler runs.
//! An application is taken out of every index before its effect handlers
//! run, so a nested removal of the same application finds nothing to do.

use tracing::{debug, trace};

use super::{
    Aura, AuraApplication, AuraRemoveMode, AuraType, EffectHandle, EffectMask, LoadedAuraState,
};
use crate::config::CombatConfig;
use crate::engine::CombatEngine;
use crate::event::CombatEvent;
use crate::spell::{AuraInterruptFlags, DispelType, SpellAttributes, SpellInfo, StackRule};
use crate::state::{AuraId, SpellId, UnitId};

/// Per-effect amounts overriding the spell's base points.
pub type BaseAmounts = [Option<i32>; CombatConfig::MAX_SPELL_EFFECTS];

/// Largest absolute amount among the effects of an aura.
fn strength(aura: &Aura) -> i64 {
    aura.effects().map(|e| i64::from(e.amount).abs()).max().unwrap_or(0)
}

/// Whether two auras may coexist on one unit.
///
/// `existing` is already present; `incoming` is being added.
pub fn can_stack_with(
    existing: &Aura,
    existing_info: &SpellInfo,
    incoming: &Aura,
    incoming_info: &SpellInfo,
) -> bool {
    if existing.id == incoming.id {
        return true;
    }
    if existing.spell == incoming.spell {
        if existing.caster != incoming.caster {
            return incoming_info.has_attribute(SpellAttributes::STACK_FOR_DIFF_CASTERS);
        }
        // same spell and caster, but a different effect set
        return incoming_info.is_passive();
    }
    match existing_info.shares_group_with(incoming_info) {
        None | Some(StackRule::Default) | Some(StackRule::ExclusiveSameEffect) => true,
        Some(StackRule::Exclusive) | Some(StackRule::ExclusiveHighest) => false,
        Some(StackRule::ExclusiveFromSameCaster) => existing.caster != incoming.caster,
    }
}

impl CombatEngine<'_> {
    // ========================================================================
    // Creation
    // ========================================================================

    /// Creates (or refreshes) the aura part of a spell on `owner`.
    ///
    /// Returns the aura that now carries the effects, or `None` if nothing
    /// was applied (dead owner, no aura effects, or the new aura lost an
    /// exclusive-highest comparison).
    pub fn add_aura_from_spell(
        &mut self,
        caster: Option<UnitId>,
        owner: UnitId,
        info: &SpellInfo,
        effect_mask: EffectMask,
        base_amounts: BaseAmounts,
    ) -> Option<AuraId> {
        let owner_unit = self.unit(owner)?;
        if !owner_unit.is_alive() && !info.has_attribute(SpellAttributes::DEATH_PERSISTENT) {
            return None;
        }
        let mask = effect_mask & Self::aura_mask_of(info);
        if mask.is_empty() {
            return None;
        }

        if let Some(existing) = self.try_stack_or_refresh(info, mask, owner, caster, base_amounts) {
            return Some(existing);
        }

        let now = self.now();
        let id = self.state_mut().auras.next_id();
        let aura = Aura::new(id, info, caster, owner, mask, base_amounts, now);
        self.state_mut().auras.insert(aura);
        if self.add_aura(id) {
            Some(id)
        } else {
            None
        }
    }

    fn aura_mask_of(info: &SpellInfo) -> EffectMask {
        info.aura_effect_indices()
            .fold(EffectMask::empty(), |mask, index| mask | EffectMask::from_index(index))
    }

    /// Restacks or refreshes the existing instance of the same spell from
    /// the same caster on `owner`. Returns `None` if a new instance must be
    /// created.
    pub fn try_stack_or_refresh(
        &mut self,
        info: &SpellInfo,
        effect_mask: EffectMask,
        owner: UnitId,
        caster: Option<UnitId>,
        base_amounts: BaseAmounts,
    ) -> Option<AuraId> {
        let existing = self.unit(owner)?.owned_auras.get(&info.id)?.iter().copied().find(|id| {
            self.aura(*id)
                .is_some_and(|a| !a.is_removed() && (a.caster == caster || info.is_passive()))
        })?;
        let aura = self.aura(existing)?;
        if aura.effect_mask() != effect_mask {
            return None;
        }

        let max_stack = info.max_stack.max(1);
        let stacked = aura.stack < max_stack;
        let refresh = !info.has_attribute(SpellAttributes::NO_DURATION_REFRESH);
        let charges = info.initial_charges();
        let aura = self.aura_mut(existing)?;
        for index in effect_mask.indices() {
            let base = base_amounts[index].or_else(|| info.effect(index).map(|e| e.base_points));
            if let (Some(base), Some(effect)) = (base, aura.effect_mut(index)) {
                effect.base_amount = base;
            }
        }
        if stacked {
            aura.stack += 1;
        }
        aura.recalculate_amounts();
        if refresh {
            aura.refresh_duration();
        }
        if charges > 0 {
            aura.charges = charges;
        }
        let (stack, charges) = (aura.stack, aura.charges);
        trace!(aura = %existing, stack, "aura refreshed");

        self.on_aura_amounts_changed(existing);
        let targets: Vec<UnitId> = self
            .aura(existing)
            .map(|a| a.targets().collect())
            .unwrap_or_default();
        for target in targets {
            self.emit(CombatEvent::AuraStackChanged {
                target,
                aura: existing,
                spell: info.id,
                stack,
                charges,
            });
        }
        Some(existing)
    }

    /// Registers a freshly created aura with its owner.
    ///
    /// Removes whatever the aura cannot stack with, enforces single-target
    /// uniqueness per caster, then applies it. Returns false if the aura
    /// itself was dropped by the stacking rules.
    pub(crate) fn add_aura(&mut self, id: AuraId) -> bool {
        let Some(aura) = self.aura(id) else {
            return false;
        };
        let (owner, spell, caster) = (aura.owner, aura.spell, aura.caster);
        let Some(info) = self.spell_info(spell) else {
            return false;
        };
        if let Some(unit) = self.unit_mut(owner) {
            unit.insert_owned_aura(spell, id);
        }

        if !self.remove_no_stack_auras(owner, id) {
            self.remove_owned_aura(id, AuraRemoveMode::Stack);
            return false;
        }

        if info.is_single_target()
            && let Some(caster) = caster
        {
            self.enforce_single_target(caster, id, info);
        }

        let area = self.aura(id).and_then(|a| a.area);
        let mask = self.owner_application_mask(id);
        if !mask.is_empty() {
            self.create_aura_application(id, owner, mask);
        }
        if area.is_some() {
            self.update_area_targets(id);
        }
        self.aura(id).is_some_and(|a| !a.is_removed())
    }

    /// Removes the auras on `owner` that `incoming` cannot stack with.
    /// Returns false if `incoming` is the one that must go.
    fn remove_no_stack_auras(&mut self, owner: UnitId, incoming: AuraId) -> bool {
        let Some(new_aura) = self.aura(incoming) else {
            return false;
        };
        let Some(new_info) = self.spell_info(new_aura.spell) else {
            return false;
        };
        let Some(unit) = self.unit(owner) else {
            return false;
        };

        let mut conflicts: Vec<AuraId> = Vec::new();
        for app in unit.applied_auras.values() {
            let Some(existing) = self.aura(app.aura) else {
                continue;
            };
            let Some(existing_info) = self.spell_info(existing.spell) else {
                continue;
            };
            if can_stack_with(existing, existing_info, new_aura, new_info) {
                continue;
            }
            if existing_info.shares_group_with(new_info) == Some(StackRule::ExclusiveHighest)
                && strength(existing) > strength(new_aura)
            {
                debug!(
                    %owner,
                    kept = %existing.id,
                    dropped = %incoming,
                    "weaker exclusive aura rejected"
                );
                return false;
            }
            conflicts.push(app.aura);
        }

        for aura in conflicts {
            let pending = self
                .unit(owner)
                .and_then(|u| u.application(aura))
                .is_some_and(|a| !a.is_being_removed());
            if pending {
                debug!(%owner, %aura, replaced_by = %incoming, "aura removed by stacking rules");
                self.remove_aura_application(owner, aura, AuraRemoveMode::Stack);
            }
        }
        true
    }

    /// A caster keeps at most one aura of each single-target spell (or
    /// single-target stack group) alive.
    fn enforce_single_target(&mut self, caster: UnitId, id: AuraId, info: &SpellInfo) {
        let Some(unit) = self.unit(caster) else {
            return;
        };
        let previous: Vec<AuraId> = unit
            .single_cast_auras
            .iter()
            .copied()
            .filter(|other| *other != id)
            .filter(|other| {
                self.aura(*other)
                    .and_then(|a| self.spell_info(a.spell))
                    .is_some_and(|other_info| {
                        other_info.id == info.id || other_info.shares_group_with(info).is_some()
                    })
            })
            .collect();
        for aura in previous {
            self.remove_owned_aura(aura, AuraRemoveMode::Default);
        }
        if let Some(unit) = self.unit_mut(caster) {
            unit.single_cast_auras.retain(|other| *other != id);
            unit.single_cast_auras.push(id);
        }
    }

    /// Restores an aura from persisted state, bypassing stacking rules.
    pub fn load_aura(
        &mut self,
        owner: UnitId,
        caster: Option<UnitId>,
        spell: SpellId,
        effect_mask: EffectMask,
        state: &LoadedAuraState,
    ) -> Option<AuraId> {
        let info = self.spell_info(spell)?;
        self.unit(owner)?;
        let mask = effect_mask & Self::aura_mask_of(info);
        if mask.is_empty() {
            return None;
        }
        let now = self.now();
        let id = self.state_mut().auras.next_id();
        let no_overrides = [None; CombatConfig::MAX_SPELL_EFFECTS];
        let mut aura = Aura::new(id, info, caster, owner, mask, no_overrides, now);
        aura.set_loaded_state(state);
        self.state_mut().auras.insert(aura);
        if let Some(unit) = self.unit_mut(owner) {
            unit.insert_owned_aura(spell, id);
        }
        self.create_aura_application(id, owner, mask);
        debug!(%owner, %spell, aura = %id, "aura loaded");
        Some(id)
    }

    // ========================================================================
    // Application
    // ========================================================================

    /// Binds `aura` to `target` and applies the effects in `mask`.
    ///
    /// # Panics
    ///
    /// If the aura is already applied to the target.
    pub(crate) fn create_aura_application(
        &mut self,
        aura_id: AuraId,
        target: UnitId,
        mask: EffectMask,
    ) {
        let visible_limit = self.config().visible_aura_slots;
        let Some(aura) = self.aura(aura_id) else {
            return;
        };
        if aura.is_removed() {
            return;
        }
        let Some(info) = self.spell_info(aura.spell) else {
            return;
        };
        let Some(unit) = self.unit(target) else {
            return;
        };
        assert!(
            !unit.applied_auras.contains_key(&aura_id),
            "aura {aura_id} applied twice to unit {target}"
        );

        let mut application = AuraApplication::new(aura, target, mask);
        let (spell, caster, stack) = (aura.spell, aura.caster, aura.stack);
        if !info.is_passive() {
            application.slot = (0..visible_limit).find(|slot| !unit.visible_slots.contains(slot));
        }
        let slot = application.slot;

        let Some(unit) = self.unit_mut(target) else {
            return;
        };
        if let Some(slot) = slot {
            unit.visible_slots.insert(slot);
        }
        unit.applied_auras.insert(aura_id, application);
        if !info.aura_interrupt_flags.is_empty() {
            unit.interruptible_auras.push(aura_id);
        }
        if let Some(state) = info.aura_state {
            unit.aura_state_auras.entry(state).or_default().push(aura_id);
        }
        if let Some(aura) = self.aura_mut(aura_id) {
            aura.add_target(target);
        }

        self.emit(CombatEvent::AuraApplied {
            target,
            aura: aura_id,
            spell,
            caster,
            slot,
            stack,
        });
        self.apply_aura(target, aura_id, mask);
    }

    /// Runs the apply handler of every effect in `mask`, stopping as soon as
    /// a handler removed the application.
    pub(crate) fn apply_aura(&mut self, target: UnitId, aura_id: AuraId, mask: EffectMask) {
        for index in mask.indices() {
            let still_applied = self
                .unit(target)
                .and_then(|u| u.application(aura_id))
                .is_some_and(|app| !app.is_being_removed());
            if !still_applied {
                debug!(%target, aura = %aura_id, "application removed while applying");
                return;
            }
            let Some(aura_type) = self
                .aura(aura_id)
                .and_then(|a| a.effect(index))
                .map(|e| e.aura_type)
            else {
                continue;
            };
            let Some(unit) = self.unit_mut(target) else {
                return;
            };
            let Some(app) = unit.applied_auras.get_mut(&aura_id) else {
                return;
            };
            assert!(!app.has_effect(index), "effect {index} of aura {aura_id} applied twice");
            app.set_effect_applied(index, true);
            unit.effects.register(aura_type, EffectHandle::new(aura_id, index as u8), true);
            self.handle_aura_effect(target, aura_id, aura_type, true, None);
        }
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Takes the application out of every index of `target`, then runs the
    /// effect removal handlers in slot order.
    ///
    /// # Panics
    ///
    /// If the aura is not applied to the target.
    fn unapply_aura(&mut self, target: UnitId, aura_id: AuraId, mode: AuraRemoveMode) {
        let Some(unit) = self.unit_mut(target) else {
            return;
        };
        let mut application = unit
            .applied_auras
            .remove(&aura_id)
            .unwrap_or_else(|| panic!("aura {aura_id} is not applied to unit {target}"));
        assert!(!application.is_being_removed(), "aura {aura_id} removed twice from unit {target}");
        application.set_remove_mode(mode);

        unit.interruptible_auras.retain(|id| *id != aura_id);
        unit.aura_state_auras.retain(|_, list| {
            list.retain(|id| *id != aura_id);
            !list.is_empty()
        });
        if let Some(slot) = application.slot {
            unit.visible_slots.remove(&slot);
        }

        let applied: Vec<(usize, AuraType)> = application
            .applied_effects()
            .indices()
            .filter_map(|index| {
                self.state()
                    .auras
                    .get(aura_id)
                    .and_then(|a| a.effect(index))
                    .map(|e| (index, e.aura_type))
            })
            .collect();
        if let Some(unit) = self.unit_mut(target) {
            for (index, aura_type) in &applied {
                unit.effects.register(*aura_type, EffectHandle::new(aura_id, *index as u8), false);
            }
        }
        if let Some(aura) = self.aura_mut(aura_id) {
            aura.remove_target(target);
        }

        for (_, aura_type) in applied {
            self.handle_aura_effect(target, aura_id, aura_type, false, Some(mode));
        }

        self.emit(CombatEvent::AuraRemoved {
            target,
            aura: aura_id,
            spell: application.spell,
            mode,
        });
        if let Some(hook) = self.env().scripts().on_aura_remove(application.spell) {
            hook(self, aura_id, target, mode);
        }
    }

    /// Removes an owned aura from every target it is applied to. The aura
    /// stays in the arena, flagged removed, until the owner's update sweep.
    pub fn remove_owned_aura(&mut self, aura_id: AuraId, mode: AuraRemoveMode) {
        let Some(aura) = self.aura_mut(aura_id) else {
            return;
        };
        if aura.is_removed() {
            return;
        }
        aura.mark_removed();
        let (owner, spell, caster) = (aura.owner, aura.spell, aura.caster);
        let targets: Vec<UnitId> = aura.targets().collect();
        trace!(%owner, aura = %aura_id, %mode, "owned aura removed");

        if let Some(unit) = self.unit_mut(owner) {
            unit.take_owned_aura(spell, aura_id);
            unit.removed_auras.push(aura_id);
            unit.removed_auras_count += 1;
        }
        if let Some(caster) = caster
            && let Some(unit) = self.unit_mut(caster)
        {
            unit.single_cast_auras.retain(|id| *id != aura_id);
        }

        for target in targets {
            let applied = self
                .unit(target)
                .and_then(|u| u.application(aura_id))
                .is_some_and(|app| !app.is_being_removed());
            if applied {
                self.unapply_aura(target, aura_id, mode);
            }
        }
    }

    /// Removes one application. Removing the owner's own application removes
    /// the whole aura; other targets of an area aura only lose theirs.
    pub fn remove_aura_application(
        &mut self,
        target: UnitId,
        aura_id: AuraId,
        mode: AuraRemoveMode,
    ) {
        let applied = self
            .unit(target)
            .and_then(|u| u.application(aura_id))
            .is_some_and(|app| !app.is_being_removed());
        if !applied {
            return;
        }
        let owner = self.aura(aura_id).map(|a| a.owner);
        if owner == Some(target) {
            self.remove_owned_aura(aura_id, mode);
        } else {
            self.unapply_aura(target, aura_id, mode);
        }
    }

    /// Collect-then-revalidate removal of the applications on `target`
    /// matching `pred`. Returns the number removed.
    fn remove_applications_where<F>(
        &mut self,
        target: UnitId,
        mode: AuraRemoveMode,
        pred: F,
    ) -> usize
    where
        F: Fn(&Aura, &AuraApplication, &SpellInfo) -> bool,
    {
        let matches = |engine: &Self, id: AuraId| -> bool {
            let Some(app) = engine.unit(target).and_then(|u| u.application(id)) else {
                return false;
            };
            if app.is_being_removed() {
                return false;
            }
            let Some(aura) = engine.aura(id) else {
                return false;
            };
            engine.spell_info(aura.spell).is_some_and(|info| pred(aura, app, info))
        };

        let candidates: Vec<AuraId> = match self.unit(target) {
            Some(unit) => unit
                .applied_auras
                .keys()
                .copied()
                .filter(|id| matches(self, *id))
                .collect(),
            None => return 0,
        };
        let mut removed = 0;
        for id in candidates {
            if matches(self, id) {
                self.remove_aura_application(target, id, mode);
                removed += 1;
            }
        }
        removed
    }

    /// Removes the applications of `spell` on `target`, optionally only
    /// those cast by `caster`.
    pub fn remove_auras_by_spell(
        &mut self,
        target: UnitId,
        spell: SpellId,
        caster: Option<UnitId>,
        mode: AuraRemoveMode,
    ) -> usize {
        self.remove_applications_where(target, mode, |aura, _, _| {
            aura.spell == spell && caster.is_none_or(|c| aura.caster == Some(c))
        })
    }

    /// Removes every aura on `target` cast by `caster`.
    pub fn remove_auras_by_caster(
        &mut self,
        target: UnitId,
        caster: UnitId,
        mode: AuraRemoveMode,
    ) -> usize {
        self.remove_applications_where(target, mode, |aura, _, _| aura.caster == Some(caster))
    }

    /// Removes every aura on `target` with an applied effect of `aura_type`,
    /// except `except`.
    pub fn remove_auras_by_type(
        &mut self,
        target: UnitId,
        aura_type: AuraType,
        except: Option<AuraId>,
        mode: AuraRemoveMode,
    ) -> usize {
        let Some(unit) = self.unit(target) else {
            return 0;
        };
        let mut candidates: Vec<AuraId> = unit
            .effects
            .snapshot(aura_type)
            .into_iter()
            .map(|h| h.aura)
            .collect();
        candidates.dedup();
        let mut removed = 0;
        for id in candidates {
            if Some(id) == except {
                continue;
            }
            let still = self
                .unit(target)
                .is_some_and(|u| u.effects.effects_by_type(aura_type).iter().any(|h| h.aura == id));
            if still {
                self.remove_aura_application(target, id, mode);
                removed += 1;
            }
        }
        removed
    }

    /// Removes the auras of `unit` that break on `flags`, except those of
    /// `except_spell`.
    pub fn remove_auras_with_interrupt_flags(
        &mut self,
        unit: UnitId,
        flags: AuraInterruptFlags,
        except_spell: Option<SpellId>,
    ) -> usize {
        let Some(u) = self.unit(unit) else {
            return 0;
        };
        if u.interruptible_auras.is_empty() {
            return 0;
        }
        let candidates = u.interruptible_auras.clone();
        let qualifies = |engine: &Self, id: AuraId| -> bool {
            let Some(app) = engine.unit(unit).and_then(|u| u.application(id)) else {
                return false;
            };
            if app.is_being_removed() || Some(app.spell) == except_spell {
                return false;
            }
            engine
                .spell_info(app.spell)
                .is_some_and(|info| info.aura_interrupt_flags.intersects(flags))
        };
        let mut removed = 0;
        for id in candidates {
            if qualifies(self, id) {
                debug!(%unit, aura = %id, ?flags, "aura interrupted");
                self.remove_aura_application(unit, id, AuraRemoveMode::Interrupt);
                removed += 1;
            }
        }
        removed
    }

    /// Removes the auras on `target` carrying any mechanic in `mechanic_mask`.
    pub fn remove_auras_with_mechanic(
        &mut self,
        target: UnitId,
        mechanic_mask: i32,
        except: Option<AuraId>,
        mode: AuraRemoveMode,
    ) -> usize {
        self.remove_applications_where(target, mode, |aura, _, info| {
            Some(aura.id) != except && info.all_mechanics_mask() & mechanic_mask != 0
        })
    }

    /// Dispels up to `count` auras of `dispel` type from `target`, oldest
    /// first. A hostile dispeller takes beneficial auras, a friendly one
    /// harmful auras. Stacked auras lose one stack per dispel. Returns the
    /// number of dispels performed.
    pub fn remove_auras_by_dispel(
        &mut self,
        target: UnitId,
        dispel: DispelType,
        count: u32,
        dispeller: UnitId,
    ) -> u32 {
        if dispel == DispelType::None || count == 0 {
            return 0;
        }
        let hostile = match (self.unit(dispeller), self.unit(target)) {
            (Some(d), Some(t)) => d.is_hostile_to(t),
            _ => return 0,
        };
        let qualifies = |engine: &Self, id: AuraId| -> bool {
            let Some(app) = engine.unit(target).and_then(|u| u.application(id)) else {
                return false;
            };
            if app.is_being_removed() || app.positive != hostile {
                return false;
            }
            engine.spell_info(app.spell).is_some_and(|info| {
                !info.is_passive()
                    && info.dispel != DispelType::None
                    && (dispel == DispelType::All || info.dispel == dispel)
            })
        };
        let candidates: Vec<AuraId> = match self.unit(target) {
            Some(unit) => unit
                .applied_auras
                .keys()
                .copied()
                .filter(|id| qualifies(self, *id))
                .collect(),
            None => return 0,
        };

        let mut dispelled = 0;
        for id in candidates {
            if dispelled >= count {
                break;
            }
            if !qualifies(self, id) {
                continue;
            }
            let stacked = self.aura(id).is_some_and(|a| a.stack > 1 && a.owner == target);
            if stacked {
                self.mod_stack_amount(id, -1, AuraRemoveMode::EnemySpell);
            } else {
                self.remove_aura_application(target, id, AuraRemoveMode::EnemySpell);
            }
            dispelled += 1;
        }
        debug!(%target, %dispeller, ?dispel, dispelled, "dispel");
        dispelled
    }

    /// Death pass: everything except passive and death-persistent auras.
    pub fn remove_all_auras_on_death(&mut self, unit: UnitId) -> usize {
        self.remove_applications_where(unit, AuraRemoveMode::Death, |_, _, info| {
            !info.is_passive() && !info.is_death_persistent()
        })
    }

    /// Removes every aura the unit owns or has applied, until none are left.
    pub fn remove_all_auras(&mut self, unit: UnitId) {
        loop {
            let owned: Vec<AuraId> = self
                .unit(unit)
                .map(|u| u.owned_aura_ids().collect())
                .unwrap_or_default();
            let mut progress =
                self.remove_applications_where(unit, AuraRemoveMode::Default, |_, _, _| true);
            for aura in owned {
                if self.aura(aura).is_some_and(|a| !a.is_removed()) {
                    self.remove_owned_aura(aura, AuraRemoveMode::Default);
                    progress += 1;
                }
            }
            let Some(u) = self.unit(unit) else {
                return;
            };
            if u.applied_auras.is_empty() && u.owned_auras.is_empty() {
                return;
            }
            if progress == 0 {
                // ids whose aura is gone from the arena
                let stale: Vec<AuraId> = u.applied_auras.keys().copied().collect();
                for aura in stale {
                    self.unapply_aura(unit, aura, AuraRemoveMode::Default);
                }
                if let Some(u) = self.unit_mut(unit) {
                    u.owned_auras.clear();
                }
                return;
            }
        }
    }

    // ========================================================================
    // Stacks and charges
    // ========================================================================

    /// Changes the stack count by `delta`. Reaching zero removes the aura.
    /// Returns true if the aura was removed.
    pub fn mod_stack_amount(&mut self, aura_id: AuraId, delta: i32, mode: AuraRemoveMode) -> bool {
        let Some(aura) = self.aura(aura_id) else {
            return false;
        };
        if aura.is_removed() {
            return false;
        }
        let Some(info) = self.spell_info(aura.spell) else {
            return false;
        };
        let new_stack = i32::from(aura.stack) + delta;
        if new_stack <= 0 {
            self.remove_owned_aura(aura_id, mode);
            return true;
        }
        let max_stack = i32::from(info.max_stack.max(1));
        let refresh = delta > 0 && !info.has_attribute(SpellAttributes::NO_DURATION_REFRESH);
        let Some(aura) = self.aura_mut(aura_id) else {
            return false;
        };
        aura.stack = new_stack.min(max_stack) as u8;
        aura.recalculate_amounts();
        if refresh {
            aura.refresh_duration();
        }
        let (spell, stack, charges) = (aura.spell, aura.stack, aura.charges);
        let targets: Vec<UnitId> = aura.targets().collect();
        self.on_aura_amounts_changed(aura_id);
        for target in targets {
            self.emit(CombatEvent::AuraStackChanged {
                target,
                aura: aura_id,
                spell,
                stack,
                charges,
            });
        }
        false
    }

    /// Uses one charge. Running out removes the aura. Returns true if the
    /// aura was removed.
    pub fn drop_aura_charge(&mut self, aura_id: AuraId, mode: AuraRemoveMode) -> bool {
        let Some(aura) = self.aura_mut(aura_id) else {
            return false;
        };
        if aura.is_removed() || aura.charges == 0 {
            return false;
        }
        aura.charges -= 1;
        if aura.charges == 0 {
            self.remove_owned_aura(aura_id, mode);
            return true;
        }
        let (spell, stack, charges) = (aura.spell, aura.stack, aura.charges);
        let targets: Vec<UnitId> = aura.targets().collect();
        for target in targets {
            self.emit(CombatEvent::AuraStackChanged {
                target,
                aura: aura_id,
                spell,
                stack,
                charges,
            });
        }
        false
    }

    /// Drops the auras removed since the last sweep from the arena.
    pub(crate) fn release_removed_auras(&mut self, unit: UnitId) {
        let Some(u) = self.unit_mut(unit) else {
            return;
        };
        let removed = std::mem::take(&mut u.removed_auras);
        for id in removed {
            let dangling = self.aura(id).is_some_and(|a| a.targets().next().is_some());
            assert!(!dangling, "removed aura {id} still applied");
            self.state_mut().auras.release(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{CombatEnv, ScriptedRng, SpellCatalog, SpellScriptRegistry};
    use crate::spell::{SpellEffectInfo, SpellInfo};
    use crate::state::{GameTime, Unit, UnitRole, WorldState};

    const UNIT: UnitId = UnitId(1);

    fn aura(id: u64, spell: &SpellInfo, caster: u32) -> Aura {
        Aura::new(
            AuraId(id),
            spell,
            Some(UnitId(caster)),
            UnitId(9),
            EffectMask::EFFECT_0,
            [None; CombatConfig::MAX_SPELL_EFFECTS],
            GameTime::ZERO,
        )
    }

    fn buff(id: u32) -> SpellInfo {
        SpellInfo::new(SpellId(id), "buff")
            .with_effect(SpellEffectInfo::aura(AuraType::ModAttackPower, 10))
    }

    #[test]
    fn same_spell_from_other_caster_replaces_unless_flagged() {
        let info = buff(1);
        assert!(!can_stack_with(&aura(1, &info, 1), &info, &aura(2, &info, 2), &info));

        let flagged = buff(1).with_attributes(SpellAttributes::STACK_FOR_DIFF_CASTERS);
        assert!(can_stack_with(
            &aura(1, &flagged, 1),
            &flagged,
            &aura(2, &flagged, 2),
            &flagged
        ));
    }

    #[test]
    fn group_rules_decide_coexistence() {
        let a = buff(1).with_stack_group(7, StackRule::Exclusive);
        let b = buff(2).with_stack_group(7, StackRule::Exclusive);
        assert!(!can_stack_with(&aura(1, &a, 1), &a, &aura(2, &b, 1), &b));

        let a = buff(1).with_stack_group(8, StackRule::ExclusiveFromSameCaster);
        let b = buff(2).with_stack_group(8, StackRule::ExclusiveFromSameCaster);
        assert!(!can_stack_with(&aura(1, &a, 1), &a, &aura(2, &b, 1), &b));
        assert!(can_stack_with(&aura(1, &a, 1), &a, &aura(2, &b, 3), &b));

        let unrelated = buff(3);
        assert!(can_stack_with(&aura(1, &a, 1), &a, &aura(2, &unrelated, 1), &unrelated));
    }

    fn with_engine(catalog: SpellCatalog, body: impl FnOnce(&mut CombatEngine<'_>)) {
        let rng = ScriptedRng::constant(9999);
        let scripts = SpellScriptRegistry::new();
        let config = CombatConfig::default();
        let mut world = WorldState::new(1);
        let env = CombatEnv::new(&catalog, &rng, &scripts, &config);
        let mut engine = CombatEngine::new(&mut world, env);
        engine
            .spawn(Unit::new(UNIT, UnitRole::Player, 60))
            .expect("unit spawns");
        body(&mut engine);
    }

    #[test]
    #[should_panic(expected = "applied twice")]
    fn second_application_to_the_same_unit_panics() {
        with_engine(SpellCatalog::new().with(buff(1)), |engine| {
            let info = engine.spell_info(SpellId(1)).expect("spell");
            let no_overrides = [None; CombatConfig::MAX_SPELL_EFFECTS];
            let id = engine
                .add_aura_from_spell(Some(UNIT), UNIT, info, EffectMask::EFFECT_0, no_overrides)
                .expect("applied");
            engine.create_aura_application(id, UNIT, EffectMask::EFFECT_0);
        });
    }

    #[test]
    #[should_panic(expected = "is not applied")]
    fn unapplying_a_missing_application_panics() {
        with_engine(SpellCatalog::new(), |engine| {
            engine.unapply_aura(UNIT, AuraId(42), AuraRemoveMode::Default);
        });
    }
}

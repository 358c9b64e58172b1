//! Aura instances, their per-target applications and the effect store.
//!
//! # Ownership
//!
//! ```text
//! WorldState.auras (AuraArena)      storage for every Aura, keyed by AuraId
//! Unit.owned_auras                  auras this unit owns (it manifests them)
//! Unit.applied_auras                AuraApplication per aura affecting this unit
//! Unit.effects (EffectStore)        applied effects indexed by AuraType
//! ```
//!
//! An [`Aura`] is owned by its owner's collection and referenced by id from
//! every target it is applied to (area auras have several). A removed aura
//! stays in the arena, flagged removed, until the owner's update sweep
//! releases it, so ids held by in-flight callers stay resolvable.

mod area;
mod handlers;
mod lifecycle;
mod periodic;
mod store;
mod types;

pub use lifecycle::{BaseAmounts, can_stack_with};
pub use store::{EffectHandle, EffectQuery, EffectStore};
pub use types::{AuraRemoveMode, AuraState, AuraType, EffectMask};

use std::collections::{BTreeMap, BTreeSet};

use crate::config::CombatConfig;
use crate::spell::SpellInfo;
use crate::state::{AuraId, GameTime, SpellId, UnitId};

/// One modifier slot of an aura.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuraEffect {
    pub index: u8,
    pub aura_type: AuraType,
    /// Current amount (base scaled by stacks, reduced as shields absorb).
    pub amount: i32,
    /// Amount of a single stack.
    pub base_amount: i32,
    pub misc_value: i32,
    pub affected_spell: Option<SpellId>,
    pub amplitude_ms: u32,
    pub periodic_timer_ms: i64,
    pub tick_number: u32,
}

impl AuraEffect {
    pub fn is_periodic(&self) -> bool {
        self.aura_type.is_periodic() && self.amplitude_ms > 0
    }
}

/// Area aura bookkeeping on the owner's aura.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AreaAuraInfo {
    pub radius: f32,
    /// Friendly auras land on allies (including the owner); enemy auras on hostiles.
    pub friendly: bool,
    pub update_timer_ms: i64,
}

/// State restored by an external loader at login.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LoadedAuraState {
    pub duration_ms: i64,
    pub max_duration_ms: i64,
    pub charges: u8,
    pub stack: u8,
    /// Amount per effect slot; `None` keeps the freshly computed amount.
    pub amounts: [Option<i32>; CombatConfig::MAX_SPELL_EFFECTS],
}

/// One instance of a buff or debuff.
#[derive(Clone, Debug, PartialEq)]
pub struct Aura {
    pub id: AuraId,
    pub spell: SpellId,
    /// Weak: the caster may be gone. Resolve through the world.
    pub caster: Option<UnitId>,
    pub owner: UnitId,
    effect_mask: EffectMask,
    effects: [Option<AuraEffect>; CombatConfig::MAX_SPELL_EFFECTS],
    pub stack: u8,
    pub charges: u8,
    /// Remaining duration; negative means permanent.
    pub duration_ms: i64,
    pub max_duration_ms: i64,
    targets: BTreeSet<UnitId>,
    removed: bool,
    pub single_target: bool,
    pub positive: bool,
    pub proc_cooldown_until: GameTime,
    pub area: Option<AreaAuraInfo>,
    pub applied_at: GameTime,
}

impl Aura {
    /// Builds an aura from a spell definition.
    ///
    /// `base_amounts[i]` overrides the amount of effect `i`; effects not in
    /// `effect_mask` or not aura effects are left empty.
    pub fn new(
        id: AuraId,
        info: &SpellInfo,
        caster: Option<UnitId>,
        owner: UnitId,
        effect_mask: EffectMask,
        base_amounts: [Option<i32>; CombatConfig::MAX_SPELL_EFFECTS],
        now: GameTime,
    ) -> Self {
        let mut effects: [Option<AuraEffect>; CombatConfig::MAX_SPELL_EFFECTS] = Default::default();
        let mut mask = EffectMask::empty();
        let mut area = None;

        for (index, spell_effect) in info.effects.iter().enumerate() {
            if !effect_mask.has_index(index) || !spell_effect.kind.is_aura() {
                continue;
            }
            let Some(aura_type) = spell_effect.aura else {
                continue;
            };
            let amount = base_amounts[index].unwrap_or(spell_effect.base_points);
            effects[index] = Some(AuraEffect {
                index: index as u8,
                aura_type,
                amount,
                base_amount: amount,
                misc_value: spell_effect.misc_value,
                affected_spell: spell_effect.affected_spell,
                amplitude_ms: spell_effect.amplitude_ms,
                periodic_timer_ms: i64::from(spell_effect.amplitude_ms),
                tick_number: 0,
            });
            mask |= EffectMask::from_index(index);

            if spell_effect.kind.is_area_aura() && area.is_none() {
                area = Some(AreaAuraInfo {
                    radius: spell_effect.radius,
                    friendly: matches!(
                        spell_effect.kind,
                        crate::spell::SpellEffectKind::ApplyAreaAuraFriend
                    ),
                    update_timer_ms: 0,
                });
            }
        }

        let duration = info.duration_ms.map_or(-1, i64::from);
        Self {
            id,
            spell: info.id,
            caster,
            owner,
            effect_mask: mask,
            effects,
            stack: 1,
            charges: info.initial_charges(),
            duration_ms: duration,
            max_duration_ms: duration,
            targets: BTreeSet::new(),
            removed: false,
            single_target: info.is_single_target(),
            positive: info.positive,
            proc_cooldown_until: GameTime::ZERO,
            area,
            applied_at: now,
        }
    }

    pub fn effect_mask(&self) -> EffectMask {
        self.effect_mask
    }

    /// Drops effect slots from the aura. Bits are never re-set.
    pub fn clear_effects(&mut self, mask: EffectMask) {
        self.effect_mask.remove(mask);
        for index in mask.indices() {
            self.effects[index] = None;
        }
    }

    pub fn effect(&self, index: usize) -> Option<&AuraEffect> {
        self.effects.get(index).and_then(Option::as_ref)
    }

    pub fn effect_mut(&mut self, index: usize) -> Option<&mut AuraEffect> {
        self.effects.get_mut(index).and_then(Option::as_mut)
    }

    pub fn effects(&self) -> impl Iterator<Item = &AuraEffect> {
        self.effects.iter().flatten()
    }

    pub fn has_effect_type(&self, aura_type: AuraType) -> bool {
        self.effects().any(|e| e.aura_type == aura_type)
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub(crate) fn mark_removed(&mut self) {
        self.removed = true;
    }

    pub fn is_permanent(&self) -> bool {
        self.max_duration_ms < 0
    }

    pub fn is_expired(&self) -> bool {
        self.duration_ms == 0 && !self.is_permanent()
    }

    pub fn is_using_charges(&self) -> bool {
        self.charges > 0
    }

    pub fn targets(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.targets.iter().copied()
    }

    pub fn is_applied_to(&self, target: UnitId) -> bool {
        self.targets.contains(&target)
    }

    pub(crate) fn add_target(&mut self, target: UnitId) {
        self.targets.insert(target);
    }

    pub(crate) fn remove_target(&mut self, target: UnitId) {
        self.targets.remove(&target);
    }

    /// Resets the duration to its maximum.
    pub fn refresh_duration(&mut self) {
        self.duration_ms = self.max_duration_ms;
    }

    /// Recomputes every effect amount from its per-stack base.
    pub fn recalculate_amounts(&mut self) {
        let stack = i32::from(self.stack.max(1));
        for effect in self.effects.iter_mut().flatten() {
            effect.amount = effect.base_amount.saturating_mul(stack);
        }
    }

    /// Overwrites runtime counters with persisted values.
    pub fn set_loaded_state(&mut self, state: &LoadedAuraState) {
        self.max_duration_ms = state.max_duration_ms;
        self.duration_ms = state.duration_ms;
        self.charges = state.charges;
        self.stack = state.stack.max(1);
        for (index, amount) in state.amounts.iter().enumerate() {
            if let (Some(amount), Some(effect)) = (amount, self.effect_mut(index)) {
                effect.amount = *amount;
            }
        }
    }
}

/// Binding of one aura to one target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuraApplication {
    pub aura: AuraId,
    pub spell: SpellId,
    pub target: UnitId,
    effects_to_apply: EffectMask,
    applied: EffectMask,
    pub positive: bool,
    pub slot: Option<u8>,
    remove_mode: Option<AuraRemoveMode>,
}

impl AuraApplication {
    pub fn new(aura: &Aura, target: UnitId, effects_to_apply: EffectMask) -> Self {
        Self {
            aura: aura.id,
            spell: aura.spell,
            target,
            effects_to_apply,
            applied: EffectMask::empty(),
            positive: aura.positive,
            slot: None,
            remove_mode: None,
        }
    }

    pub fn effects_to_apply(&self) -> EffectMask {
        self.effects_to_apply
    }

    /// Effects whose apply handler has run on this target.
    pub fn applied_effects(&self) -> EffectMask {
        self.applied
    }

    pub fn has_effect(&self, index: usize) -> bool {
        self.applied.has_index(index)
    }

    pub(crate) fn set_effect_applied(&mut self, index: usize, applied: bool) {
        self.applied.set(EffectMask::from_index(index), applied);
    }

    pub fn remove_mode(&self) -> Option<AuraRemoveMode> {
        self.remove_mode
    }

    pub fn is_being_removed(&self) -> bool {
        self.remove_mode.is_some()
    }

    pub(crate) fn set_remove_mode(&mut self, mode: AuraRemoveMode) {
        self.remove_mode = Some(mode);
    }
}

/// Storage for every aura in the world.
#[derive(Clone, Debug, Default)]
pub struct AuraArena {
    auras: BTreeMap<AuraId, Aura>,
    next_id: u64,
}

impl AuraArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> AuraId {
        self.next_id += 1;
        AuraId(self.next_id)
    }

    pub fn insert(&mut self, aura: Aura) {
        self.auras.insert(aura.id, aura);
    }

    pub fn get(&self, id: AuraId) -> Option<&Aura> {
        self.auras.get(&id)
    }

    pub fn get_mut(&mut self, id: AuraId) -> Option<&mut Aura> {
        self.auras.get_mut(&id)
    }

    /// Drops a removed aura from storage.
    pub fn release(&mut self, id: AuraId) -> Option<Aura> {
        self.auras.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.auras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auras.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Aura> {
        self.auras.values()
    }

    /// Amount of an effect, if the aura and slot still exist.
    pub fn effect(&self, handle: EffectHandle) -> Option<&AuraEffect> {
        self.get(handle.aura)
            .and_then(|aura| aura.effect(handle.index as usize))
    }
}

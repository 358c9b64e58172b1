//! Per-unit index of applied aura effects.
//!
//! # Design
//!
//! The store holds handles only. Amounts live on the aura in the world's
//! [`AuraArena`], so a shield that absorbs damage is visible to every query
//! without re-registration. Aggregate queries go through [`EffectQuery`],
//! which pairs a store with the arena and the spell oracle.
//!
//! Lists keep registration order. Callers that may trigger effects while
//! walking a list take a [`EffectStore::snapshot`] first and revalidate each
//! handle against the arena before using it.

use std::collections::BTreeMap;

use super::{Aura, AuraArena, AuraEffect, AuraType};
use crate::env::SpellOracle;
use crate::spell::{SchoolMask, SpellInfo, StackRule};
use crate::state::AuraId;

/// Reference to one effect slot of one aura.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectHandle {
    pub aura: AuraId,
    pub index: u8,
}

impl EffectHandle {
    pub const fn new(aura: AuraId, index: u8) -> Self {
        Self { aura, index }
    }
}

/// Applied effects of one unit grouped by aura type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EffectStore {
    by_type: BTreeMap<AuraType, Vec<EffectHandle>>,
}

impl EffectStore {
    pub const fn new() -> Self {
        Self {
            by_type: BTreeMap::new(),
        }
    }

    /// Adds (`apply`) or removes the effect from its type list.
    pub fn register(&mut self, aura_type: AuraType, handle: EffectHandle, apply: bool) {
        if apply {
            let list = self.by_type.entry(aura_type).or_default();
            debug_assert!(!list.contains(&handle), "effect registered twice");
            list.push(handle);
        } else if let Some(list) = self.by_type.get_mut(&aura_type) {
            list.retain(|h| *h != handle);
            if list.is_empty() {
                self.by_type.remove(&aura_type);
            }
        }
    }

    /// Current list for a type. Do not trigger effects while holding it.
    pub fn effects_by_type(&self, aura_type: AuraType) -> &[EffectHandle] {
        self.by_type.get(&aura_type).map_or(&[], Vec::as_slice)
    }

    /// Copy of the list for iteration that may mutate the store.
    pub fn snapshot(&self, aura_type: AuraType) -> Vec<EffectHandle> {
        self.effects_by_type(aura_type).to_vec()
    }

    pub fn has_type(&self, aura_type: AuraType) -> bool {
        self.by_type.contains_key(&aura_type)
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }

    /// Number of registered effects across all types.
    pub fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum()
    }
}

/// Read-only aggregate queries over a unit's effects.
#[derive(Clone, Copy)]
pub struct EffectQuery<'a> {
    store: &'a EffectStore,
    arena: &'a AuraArena,
    spells: &'a dyn SpellOracle,
}

impl<'a> EffectQuery<'a> {
    pub fn new(store: &'a EffectStore, arena: &'a AuraArena, spells: &'a dyn SpellOracle) -> Self {
        Self {
            store,
            arena,
            spells,
        }
    }

    /// Resolved effects of a type, skipping handles whose aura is gone.
    pub fn effects(
        &self,
        aura_type: AuraType,
    ) -> impl Iterator<Item = (&'a Aura, &'a AuraEffect)> + '_ {
        let arena = self.arena;
        self.store
            .effects_by_type(aura_type)
            .iter()
            .filter_map(move |handle| {
                let aura = arena.get(handle.aura)?;
                let effect = aura.effect(handle.index as usize)?;
                Some((aura, effect))
            })
    }

    pub fn has_aura_type(&self, aura_type: AuraType) -> bool {
        self.effects(aura_type).next().is_some()
    }

    fn same_effect_group(&self, aura: &Aura) -> Option<u32> {
        self.spells
            .spell(aura.spell)
            .and_then(|info| info.stack_group)
            .filter(|group| group.rule == StackRule::ExclusiveSameEffect)
            .map(|group| group.id)
    }

    // ===== additive =====

    /// Sum of qualifying amounts. Members of a same-effect stack group
    /// contribute only their highest-magnitude amount.
    pub fn total_modifier_where(
        &self,
        aura_type: AuraType,
        predicate: impl Fn(&Aura, &AuraEffect) -> bool,
    ) -> i32 {
        let mut total: i64 = 0;
        let mut groups: BTreeMap<u32, i32> = BTreeMap::new();

        for (aura, effect) in self.effects(aura_type) {
            if !predicate(aura, effect) {
                continue;
            }
            match self.same_effect_group(aura) {
                Some(group) => {
                    let best = groups.entry(group).or_insert(0);
                    if effect.amount.unsigned_abs() > best.unsigned_abs() {
                        *best = effect.amount;
                    }
                }
                None => total += i64::from(effect.amount),
            }
        }

        total += groups.values().map(|v| i64::from(*v)).sum::<i64>();
        total.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }

    pub fn total_modifier(&self, aura_type: AuraType) -> i32 {
        self.total_modifier_where(aura_type, |_, _| true)
    }

    /// Sum over effects whose misc value (a bit mask) intersects `mask`.
    pub fn total_modifier_by_misc_mask(&self, aura_type: AuraType, mask: i32) -> i32 {
        self.total_modifier_where(aura_type, |_, e| e.misc_value & mask != 0)
    }

    pub fn total_modifier_by_misc_value(&self, aura_type: AuraType, value: i32) -> i32 {
        self.total_modifier_where(aura_type, |_, e| e.misc_value == value)
    }

    /// Sum over effects that modify `spell`: the school mask in the misc
    /// value must match (zero matches every school) and the effect must not
    /// be restricted to another spell.
    pub fn total_modifier_by_affected_spell(&self, aura_type: AuraType, spell: &SpellInfo) -> i32 {
        self.total_modifier_where(aura_type, |_, e| affects_spell(e, spell))
    }

    // ===== multiplicative =====

    /// Product of `(100 + amount) / 100` over qualifying effects, applied one
    /// effect at a time.
    pub fn total_multiplier_where(
        &self,
        aura_type: AuraType,
        predicate: impl Fn(&Aura, &AuraEffect) -> bool,
    ) -> f32 {
        let mut multiplier = 1.0_f32;
        let mut groups: BTreeMap<u32, i32> = BTreeMap::new();

        for (aura, effect) in self.effects(aura_type) {
            if !predicate(aura, effect) {
                continue;
            }
            match self.same_effect_group(aura) {
                Some(group) => {
                    let best = groups.entry(group).or_insert(0);
                    if effect.amount.unsigned_abs() > best.unsigned_abs() {
                        *best = effect.amount;
                    }
                }
                None => multiplier = apply_pct(multiplier, effect.amount),
            }
        }

        for amount in groups.values() {
            multiplier = apply_pct(multiplier, *amount);
        }
        multiplier.max(0.0)
    }

    pub fn total_multiplier(&self, aura_type: AuraType) -> f32 {
        self.total_multiplier_where(aura_type, |_, _| true)
    }

    pub fn total_multiplier_by_misc_mask(&self, aura_type: AuraType, mask: i32) -> f32 {
        self.total_multiplier_where(aura_type, |_, e| e.misc_value & mask != 0)
    }

    pub fn total_multiplier_by_affected_spell(
        &self,
        aura_type: AuraType,
        spell: &SpellInfo,
    ) -> f32 {
        self.total_multiplier_where(aura_type, |_, e| affects_spell(e, spell))
    }

    // ===== extremes =====

    /// Largest positive amount, zero if none.
    pub fn max_positive_where(
        &self,
        aura_type: AuraType,
        predicate: impl Fn(&Aura, &AuraEffect) -> bool,
    ) -> i32 {
        self.effects(aura_type)
            .filter(|(aura, effect)| predicate(aura, effect))
            .map(|(_, effect)| effect.amount)
            .filter(|amount| *amount > 0)
            .max()
            .unwrap_or(0)
    }

    /// Most negative amount, zero if none.
    pub fn max_negative_where(
        &self,
        aura_type: AuraType,
        predicate: impl Fn(&Aura, &AuraEffect) -> bool,
    ) -> i32 {
        self.effects(aura_type)
            .filter(|(aura, effect)| predicate(aura, effect))
            .map(|(_, effect)| effect.amount)
            .filter(|amount| *amount < 0)
            .min()
            .unwrap_or(0)
    }

    pub fn max_positive(&self, aura_type: AuraType) -> i32 {
        self.max_positive_where(aura_type, |_, _| true)
    }

    pub fn max_negative(&self, aura_type: AuraType) -> i32 {
        self.max_negative_where(aura_type, |_, _| true)
    }

    pub fn max_positive_by_misc_mask(&self, aura_type: AuraType, mask: i32) -> i32 {
        self.max_positive_where(aura_type, |_, e| e.misc_value & mask != 0)
    }

    pub fn max_negative_by_misc_mask(&self, aura_type: AuraType, mask: i32) -> i32 {
        self.max_negative_where(aura_type, |_, e| e.misc_value & mask != 0)
    }

    pub fn max_positive_by_misc_value(&self, aura_type: AuraType, value: i32) -> i32 {
        self.max_positive_where(aura_type, |_, e| e.misc_value == value)
    }

    /// True if any effect of the type has a misc mask intersecting `mask`.
    pub fn has_misc_mask(&self, aura_type: AuraType, mask: i32) -> bool {
        self.effects(aura_type).any(|(_, e)| e.misc_value & mask != 0)
    }
}

fn apply_pct(value: f32, pct: i32) -> f32 {
    value * (100.0 + pct as f32) / 100.0
}

fn affects_spell(effect: &AuraEffect, spell: &SpellInfo) -> bool {
    let schools = effect.misc_value;
    let school_ok =
        schools == 0 || SchoolMask::from_bits_truncate(schools as u8).intersects(spell.school);
    let spell_ok = effect.affected_spell.is_none_or(|id| id == spell.id);
    school_ok && spell_ok
}

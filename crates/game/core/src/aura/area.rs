//! Area auras: one owned aura, applied to every eligible unit in range.
//!
//! The owner refreshes the target set on a fixed interval. Friendly auras
//! land on the owner and units friendly to it; enemy auras on hostile units
//! only. Units that are immune, or that already carry an aura the area aura
//! cannot stack with, are skipped rather than stripped.

use tracing::trace;

use super::lifecycle::can_stack_with;
use super::{AuraRemoveMode, EffectMask};
use crate::engine::CombatEngine;
use crate::spell::SpellInfo;
use crate::state::{AuraId, UnitId};

/// Effect slots of a spell that spread to other units.
pub(crate) fn area_effect_mask(info: &SpellInfo) -> EffectMask {
    info.effects
        .iter()
        .enumerate()
        .filter(|(_, e)| e.kind.is_area_aura())
        .fold(EffectMask::empty(), |mask, (index, _)| mask | EffectMask::from_index(index))
}

impl CombatEngine<'_> {
    /// Effects the owner of an aura applies to itself.
    pub(crate) fn owner_application_mask(&self, aura: AuraId) -> EffectMask {
        let Some(a) = self.aura(aura) else {
            return EffectMask::empty();
        };
        let Some(info) = self.spell_info(a.spell) else {
            return EffectMask::empty();
        };
        match a.area {
            Some(area) if !area.friendly => a.effect_mask() - area_effect_mask(info),
            _ => a.effect_mask(),
        }
    }

    /// Recomputes the target set of an area aura and applies/removes the
    /// difference.
    pub(crate) fn update_area_targets(&mut self, aura_id: AuraId) {
        let Some(aura) = self.aura(aura_id) else {
            return;
        };
        let Some(area) = aura.area else {
            return;
        };
        if aura.is_removed() {
            return;
        }
        let owner_id = aura.owner;
        let Some(info) = self.spell_info(aura.spell) else {
            return;
        };
        let Some(owner) = self.unit(owner_id) else {
            return;
        };
        let mask = area_effect_mask(info) & aura.effect_mask();

        let mut wanted: Vec<UnitId> = Vec::new();
        if owner.is_alive() {
            for unit in self.state().units.values() {
                if unit.id == owner_id || !unit.is_alive() {
                    continue;
                }
                let eligible = if area.friendly {
                    owner.is_friendly_to(unit)
                } else {
                    owner.is_hostile_to(unit)
                };
                if !eligible || owner.distance_to(unit) > area.radius {
                    continue;
                }
                if !info.positive && self.is_immune_to_school(unit.id, info) {
                    continue;
                }
                wanted.push(unit.id);
            }
        }

        let current: Vec<UnitId> = aura.targets().filter(|t| *t != owner_id).collect();
        for target in current.iter().copied().filter(|t| !wanted.contains(t)) {
            trace!(aura = %aura_id, %target, "area aura left");
            self.remove_aura_application(target, aura_id, AuraRemoveMode::Default);
        }

        for target in wanted.into_iter().filter(|t| !current.contains(t)) {
            if self.blocks_area_aura(target, aura_id) {
                continue;
            }
            if self.aura(aura_id).is_none_or(|a| a.is_removed()) {
                return;
            }
            trace!(aura = %aura_id, %target, "area aura entered");
            self.create_aura_application(aura_id, target, mask);
        }
    }

    /// True if `target` carries an aura that `aura` may not stack with.
    fn blocks_area_aura(&self, target: UnitId, aura: AuraId) -> bool {
        let (Some(unit), Some(incoming)) = (self.unit(target), self.aura(aura)) else {
            return true;
        };
        let Some(incoming_info) = self.spell_info(incoming.spell) else {
            return true;
        };
        unit.applied_auras.values().any(|app| {
            let Some(existing) = self.aura(app.aura) else {
                return false;
            };
            if existing.spell == incoming.spell {
                return true;
            }
            self.spell_info(existing.spell).is_some_and(|existing_info| {
                !can_stack_with(existing, existing_info, incoming, incoming_info)
            })
        })
    }
}

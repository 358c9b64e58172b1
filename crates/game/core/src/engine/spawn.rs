//! Adding units to and removing them from the world.

use tracing::debug;

use super::CombatEngine;
use crate::error::EngineError;
use crate::spell::CurrentSpellType;
use crate::state::{CastId, Unit, UnitId};

impl CombatEngine<'_> {
    /// Adds a unit. Aura-derived stats start from the unit's base values.
    pub fn spawn(&mut self, mut unit: Unit) -> Result<UnitId, EngineError> {
        let id = unit.id;
        if self.state.contains(id) {
            return Err(EngineError::DuplicateUnit(id));
        }
        unit.last_update = self.now();
        self.state.units.insert(id, unit);
        self.recompute_stats(id);
        self.update_health_aura_states(id);
        debug!(unit = %id, "spawned");
        Ok(id)
    }

    /// Cleans a unit up and removes it from the world.
    ///
    /// Casts are interrupted, every owned and applied aura removed, combat
    /// and threat relations dropped. Auras this unit cast on others stay;
    /// their caster id simply stops resolving.
    ///
    /// # Panics
    ///
    /// If the unit is not quiescent after cleanup.
    pub fn despawn(&mut self, id: UnitId) -> Result<Unit, EngineError> {
        if !self.state.contains(id) {
            return Err(EngineError::UnknownUnit(id));
        }
        self.interrupt_non_melee_spells(id, true, None);
        self.interrupt_spell(id, CurrentSpellType::Melee, true, true, None);
        self.attack_stop(id);
        let attackers: Vec<UnitId> = self
            .unit(id)
            .map(|u| u.attackers.iter().copied().collect())
            .unwrap_or_default();
        for attacker in attackers {
            self.attack_stop(attacker);
        }
        self.remove_all_auras(id);
        self.release_removed_auras(id);
        self.clear_threat(id);
        self.clear_in_combat(id);

        let casts: Vec<CastId> = self.state.casts.by_caster(id).map(|c| c.id).collect();
        for cast in casts {
            self.state.casts.remove(cast);
        }

        let unit = self
            .state
            .units
            .remove(&id)
            .ok_or(EngineError::UnknownUnit(id))?;
        assert!(unit.is_quiescent(), "unit {id} despawned while still active");
        debug!(unit = %id, "despawned");
        Ok(unit)
    }
}

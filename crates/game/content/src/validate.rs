//! Consistency checks run on content before it reaches the engine.
//!
//! The engine trusts its environment: a missing trigger spell is logged and
//! skipped at runtime, a zero amplitude never ticks. These checks turn such
//! data mistakes into load-time errors instead.

use std::collections::BTreeSet;

use combat_core::{CombatConfig, SpellId, SpellInfo};

use crate::error::ConfigError;

/// Rejects configuration values the engine cannot work with.
pub fn validate_config(config: &CombatConfig) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&config.durability_loss_on_damage) {
        return Err(ConfigError::out_of_range(
            "durability_loss_on_damage",
            config.durability_loss_on_damage,
            0.0,
            1.0,
        ));
    }
    if config.rage_income_rate < 0.0 {
        return Err(ConfigError::out_of_range(
            "rage_income_rate",
            config.rage_income_rate,
            0.0,
            f32::MAX,
        ));
    }
    if config.melee_range <= 0.0 {
        return Err(ConfigError::out_of_range(
            "melee_range",
            config.melee_range,
            f32::EPSILON,
            f32::MAX,
        ));
    }
    if config.block_percent > 100 {
        return Err(ConfigError::out_of_range("block_percent", config.block_percent, 0, 100));
    }
    if config.fear_break_health_pct > 100 {
        return Err(ConfigError::out_of_range(
            "fear_break_health_pct",
            config.fear_break_health_pct,
            0,
            100,
        ));
    }
    for (field, chance) in [
        ("critical_block_chance", config.critical_block_chance),
        ("base_miss_chance", config.base_miss_chance),
        ("dual_wield_miss_penalty", config.dual_wield_miss_penalty),
        ("base_avoidance_chance", config.base_avoidance_chance),
    ] {
        if chance > 10_000 {
            return Err(ConfigError::out_of_range(field, chance, 0, 10_000));
        }
    }
    for (field, pct) in [
        ("melee_crit_multiplier_pct", config.melee_crit_multiplier_pct),
        ("spell_crit_multiplier_pct", config.spell_crit_multiplier_pct),
    ] {
        if pct < 100 {
            return Err(ConfigError::out_of_range(field, pct, 100, u32::MAX));
        }
    }
    if config.area_aura_update_interval_ms == 0 {
        return Err(ConfigError::out_of_range(
            "area_aura_update_interval_ms",
            0,
            1,
            u32::MAX,
        ));
    }
    Ok(())
}

/// Checks a full spell list: unique ids, resolvable trigger spells and
/// periodic effects that actually tick.
pub fn validate_spells(spells: &[SpellInfo]) -> Result<(), ConfigError> {
    let mut ids = BTreeSet::new();
    for info in spells {
        if !ids.insert(info.id) {
            return Err(ConfigError::DuplicateSpell(info.id));
        }
    }

    for info in spells {
        for effect in &info.effects {
            if let Some(trigger) = effect.trigger_spell
                && !ids.contains(&trigger)
            {
                return Err(ConfigError::UnknownTriggerSpell { spell: info.id, trigger });
            }
            if effect.aura.is_some_and(|aura| aura.is_periodic()) && effect.amplitude_ms == 0 {
                return Err(ConfigError::MissingAmplitude(info.id));
            }
        }
    }
    Ok(())
}

/// Spell ids referenced by effects but not present in `spells`.
///
/// Used by tooling that wants every problem at once rather than the first.
pub fn dangling_triggers(spells: &[SpellInfo]) -> Vec<(SpellId, SpellId)> {
    let ids: BTreeSet<SpellId> = spells.iter().map(|info| info.id).collect();
    spells
        .iter()
        .flat_map(|info| {
            info.effects
                .iter()
                .filter_map(|effect| effect.trigger_spell)
                .filter(|trigger| !ids.contains(trigger))
                .map(move |trigger| (info.id, trigger))
        })
        .collect()
}

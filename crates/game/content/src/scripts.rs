//! Registered per-spell special cases.
//!
//! The engine knows nothing about individual spells. Spells whose behavior
//! does not fit the generic effect model register hooks here, keyed by
//! spell id, and [`spell_scripts`] builds the table the runtime hands to
//! the engine.

use combat_core::combat::WeaponAttackType;
use combat_core::env::{DamageTakenContext, DummyContext};
use combat_core::spell::TriggerSource;
use combat_core::state::PowerType;
use combat_core::{
    AuraId, AuraRemoveMode, CombatEngine, DamageEffectType, DamageInfo, ProcEventInfo, SchoolMask,
    SpellId, SpellScriptRegistry, SpellTargets, UnitId,
};
use tracing::{debug, warn};

/// Absorbs at most three quarters of each magic hit.
pub const ANTI_MAGIC_SHELL: SpellId = SpellId(48707);
/// Explodes on its target when it runs out or is dispelled.
pub const LIVING_BOMB: SpellId = SpellId(44457);
pub const LIVING_BOMB_EXPLOSION: SpellId = SpellId(44461);
/// Converts the caster's health into mana.
pub const LIFE_TAP: SpellId = SpellId(1454);
/// Turns damage taken into rage.
pub const VENGEANCE: SpellId = SpellId(76691);
/// Proc aura that only fires against targets in execute range.
pub const SUDDEN_DEATH: SpellId = SpellId(29724);

/// Share of a magic hit Anti-Magic Shell may soak, in percent.
const ANTI_MAGIC_SHELL_PCT: u64 = 75;
/// Rage (in tenths) per point of damage taken, as a divisor.
const VENGEANCE_DAMAGE_PER_RAGE: u32 = 10;
/// Health percentage under which Sudden Death may proc.
const EXECUTE_RANGE_PCT: f32 = 20.0;

/// Builds the registry with every known special case.
pub fn spell_scripts() -> SpellScriptRegistry {
    let mut registry = SpellScriptRegistry::new();
    register_spell_scripts(&mut registry);
    registry
}

/// Adds every known special case to `registry`.
pub fn register_spell_scripts(registry: &mut SpellScriptRegistry) {
    registry
        .register_on_absorb(ANTI_MAGIC_SHELL, anti_magic_shell_absorb)
        .register_on_aura_remove(LIVING_BOMB, living_bomb_remove)
        .register_on_dummy(LIFE_TAP, life_tap_dummy)
        .register_on_damage_taken(VENGEANCE, vengeance_damage_taken)
        .register_check_proc(SUDDEN_DEATH, sudden_death_check);
    debug!(hooks = registry.len(), "spell scripts registered");
}

fn anti_magic_shell_absorb(
    _engine: &CombatEngine<'_>,
    _aura: AuraId,
    info: &DamageInfo,
    absorb: u32,
) -> u32 {
    let cap = u64::from(info.damage()) * ANTI_MAGIC_SHELL_PCT / 100;
    absorb.min(cap as u32)
}

fn living_bomb_remove(
    engine: &mut CombatEngine<'_>,
    aura: AuraId,
    target: UnitId,
    mode: AuraRemoveMode,
) {
    if !matches!(mode, AuraRemoveMode::Expire | AuraRemoveMode::EnemySpell) {
        return;
    }
    let Some(caster) = engine.aura(aura).and_then(|a| a.caster) else {
        return;
    };
    if !engine.is_alive(caster) {
        return;
    }
    if let Err(error) = engine.cast_spell(
        caster,
        LIVING_BOMB_EXPLOSION,
        SpellTargets::unit(target),
        Some(TriggerSource::Aura(aura)),
    ) {
        warn!(%caster, %target, %error, "living bomb explosion failed");
    }
}

fn life_tap_dummy(engine: &mut CombatEngine<'_>, ctx: &DummyContext) {
    let Ok(amount) = u32::try_from(ctx.amount) else {
        return;
    };
    if amount == 0 {
        return;
    }
    let info = DamageInfo::new(
        Some(ctx.caster),
        ctx.caster,
        amount,
        Some(ctx.spell),
        SchoolMask::SHADOW,
        DamageEffectType::SelfDamage,
        WeaponAttackType::Base,
    );
    let spell = engine.spell_info(ctx.spell);
    let dealt = engine.deal_damage(&info, spell, false);
    if dealt > 0 {
        engine.energize(
            Some(ctx.caster),
            ctx.caster,
            ctx.spell,
            PowerType::Mana as i32,
            dealt as i32,
        );
    }
}

fn vengeance_damage_taken(engine: &mut CombatEngine<'_>, ctx: &DamageTakenContext) {
    let rage = ctx.damage / VENGEANCE_DAMAGE_PER_RAGE;
    if rage == 0 {
        return;
    }
    let rage = i32::try_from(rage).unwrap_or(i32::MAX);
    engine.energize(Some(ctx.victim), ctx.victim, VENGEANCE, PowerType::Rage as i32, rage);
}

fn sudden_death_check(engine: &CombatEngine<'_>, _aura: AuraId, event: &ProcEventInfo) -> bool {
    event
        .proc_target
        .and_then(|target| engine.unit(target))
        .is_some_and(|target| target.health_pct() < EXECUTE_RANGE_PCT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_special_case() {
        let registry = spell_scripts();
        assert_eq!(registry.len(), 5);
        assert!(registry.on_absorb(ANTI_MAGIC_SHELL).is_some());
        assert!(registry.on_aura_remove(LIVING_BOMB).is_some());
        assert!(registry.on_dummy(LIFE_TAP).is_some());
        assert!(registry.on_damage_taken(VENGEANCE).is_some());
        assert!(registry.check_proc(SUDDEN_DEATH).is_some());
        assert!(registry.on_proc(SUDDEN_DEATH).is_none());
    }
}

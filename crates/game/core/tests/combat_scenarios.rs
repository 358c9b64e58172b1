//! End-to-end combat scenarios driven through the public engine API.
//!
//! Every scenario uses a scripted RNG that always rolls 9999, which puts
//! white swings and spell hits at the top of their tables: no misses, no
//! avoidance, no crits.

use std::f32::consts::PI;

use combat_core::aura::BaseAmounts;
use combat_core::proc::ProcFlags;
use combat_core::spell::{CastState, DamageClass, DispelType, SpellAttributes, StackRule};
use combat_core::state::{WeaponAttackType, WeaponProfile};
use combat_core::{
    AuraId, AuraRemoveMode, AuraType, CastId, CombatConfig, CombatEngine, CombatEnv, CombatEvent,
    CurrentSpellType, EffectMask, Position, ProcEntry, SchoolMask, ScriptedRng, SpellCatalog,
    SpellEffectInfo, SpellEffectKind, SpellId, SpellInfo, SpellScriptRegistry, SpellTargets, Unit,
    UnitId, UnitRole, UnitState, WorldState,
};

const HERO: UnitId = UnitId(1);
const DUMMY: UnitId = UnitId(2);
const BOSS: UnitId = UnitId(3);
const ALLY: UnitId = UnitId(4);

const SHIELD: SpellId = SpellId(17);
const FLASH_HEAL: SpellId = SpellId(2061);
const ARCANE_MISSILES: SpellId = SpellId(5143);
const FIREBALL: SpellId = SpellId(133);
const SCORCH: SpellId = SpellId(2948);
const SHADOW_WORD_PAIN: SpellId = SpellId(589);
const SUNDER: SpellId = SpellId(7386);
const BATTLE_SHOUT: SpellId = SpellId(6673);
const COMMANDING_SHOUT: SpellId = SpellId(469);
const BLESSING_OF_MIGHT: SpellId = SpellId(19740);
const GREATER_MIGHT: SpellId = SpellId(25782);
const THRASH: SpellId = SpellId(3391);
const DRAIN_LIFE: SpellId = SpellId(689);
const AUTO_SHOT: SpellId = SpellId(75);
const SHOOT: SpellId = SpellId(5019);
const FEAR: SpellId = SpellId(5782);
const HOWL_OF_TERROR: SpellId = SpellId(5484);
const CRITICAL_MASS: SpellId = SpellId(11115);
const ENTANGLING_ROOTS: SpellId = SpellId(339);
const DEVOTION_AURA: SpellId = SpellId(465);

const NO_OVERRIDES: BaseAmounts = [None; 3];

// ============================================================================
// Fixture
// ============================================================================

struct Fixture {
    catalog: SpellCatalog,
    rng: ScriptedRng,
    scripts: SpellScriptRegistry,
    config: CombatConfig,
}

impl Fixture {
    fn new(catalog: SpellCatalog) -> Self {
        Self::with_scripts(catalog, SpellScriptRegistry::new())
    }

    fn with_scripts(catalog: SpellCatalog, scripts: SpellScriptRegistry) -> Self {
        Self {
            catalog,
            rng: ScriptedRng::constant(9999),
            scripts,
            config: CombatConfig::default(),
        }
    }

    fn engine<'a>(&'a self, world: &'a mut WorldState) -> CombatEngine<'a> {
        let env = CombatEnv::new(&self.catalog, &self.rng, &self.scripts, &self.config);
        let mut engine = CombatEngine::new(world, env);
        engine.spawn(hero()).expect("hero spawns");
        engine.spawn(training_dummy()).expect("dummy spawns");
        engine
    }
}

/// Level 60 player at the origin, facing +x, hitting for exactly 1000.
fn hero() -> Unit {
    Unit::new(HERO, UnitRole::Player, 60)
        .with_faction(1)
        .with_health(5_000, 5_000)
        .with_position(Position::new(0.0, 0.0, 0.0, 0.0))
        .with_weapon(WeaponAttackType::Base, WeaponProfile::new(1000.0, 1000.0, 2000))
}

/// Level 60 hostile creature two yards in front of the hero, facing it.
fn training_dummy() -> Unit {
    Unit::new(DUMMY, UnitRole::Creature, 60)
        .with_faction(2)
        .with_health(10_000, 10_000)
        .with_armor(0)
        .with_position(Position::new(2.0, 0.0, 0.0, PI))
}

fn health(engine: &CombatEngine<'_>, unit: UnitId) -> u32 {
    engine.unit(unit).map_or(0, Unit::health)
}

fn spell_damage_logs(engine: &CombatEngine<'_>, spell: SpellId) -> Vec<(u32, u32)> {
    engine
        .state()
        .events()
        .iter()
        .filter_map(|event| match event {
            CombatEvent::SpellDamageLog {
                spell: logged,
                damage,
                resisted,
                ..
            } if *logged == spell => Some((*damage, *resisted)),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Damage pipeline
// ============================================================================

#[test]
fn unmitigated_swing_deals_weapon_damage() {
    let fixture = Fixture::new(SpellCatalog::new());
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    engine.attacker_state_update(HERO, DUMMY, WeaponAttackType::Base, false);

    assert_eq!(health(&engine, DUMMY), 9_000);
    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.statistics.damage_done, 1_000);
    assert_eq!(hero.statistics.highest_hit_dealt, 1_000);
    assert!(hero.in_combat);
    let dummy = engine.unit(DUMMY).expect("dummy");
    assert_eq!(dummy.threat.get(HERO), Some(1_000.0));
}

#[test]
fn absorb_shield_soaks_then_breaks() {
    let shield = SpellInfo::new(SHIELD, "Power Word: Shield")
        .positive()
        .with_duration(30_000)
        .with_effect(
            SpellEffectInfo::aura(AuraType::SchoolAbsorb, 300)
                .with_misc(i32::from(SchoolMask::ALL.bits())),
        );
    let fixture = Fixture::new(SpellCatalog::new().with(shield));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    engine
        .cast_spell(DUMMY, SHIELD, SpellTargets::unit(DUMMY), None)
        .expect("shield cast");
    assert!(engine.unit(DUMMY).expect("dummy").has_aura(SHIELD));

    engine.attacker_state_update(HERO, DUMMY, WeaponAttackType::Base, false);

    assert_eq!(health(&engine, DUMMY), 9_300);
    let swing = engine
        .state()
        .events()
        .iter()
        .find_map(|event| match event {
            CombatEvent::AttackStateUpdate { damage, absorbed, .. } => Some((*damage, *absorbed)),
            _ => None,
        })
        .expect("swing reported");
    assert_eq!(swing, (700, 300));
    assert!(!engine.unit(DUMMY).expect("dummy").has_aura(SHIELD));
    assert!(engine.state().events().iter().any(|event| matches!(
        event,
        CombatEvent::AuraRemoved { spell, mode: AuraRemoveMode::EnemySpell, .. } if *spell == SHIELD
    )));
}

#[test]
fn partial_resist_takes_a_whole_tenth_and_binary_spells_skip_it() {
    let scorch = |id: SpellId, binary: bool| {
        let info = SpellInfo::new(id, "Scorch")
            .with_school(SchoolMask::FIRE)
            .with_dmg_class(DamageClass::Magic)
            .with_effect(SpellEffectInfo::new(SpellEffectKind::SchoolDamage, 1_000));
        if binary {
            info.with_attributes(SpellAttributes::BINARY)
        } else {
            info
        }
    };
    let catalog = SpellCatalog::new()
        .with(scorch(SCORCH, false))
        .with(scorch(FIREBALL, true));
    let fixture = Fixture::new(catalog);
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);
    // 300 fire resistance at level 60 averages a 50% resist
    engine.despawn(DUMMY).expect("despawn");
    engine
        .spawn(training_dummy().with_resistance(2, 300))
        .expect("respawn");

    engine
        .cast_spell(HERO, SCORCH, SpellTargets::unit(DUMMY), None)
        .expect("scorch");
    engine.update_world(0);
    engine
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY), None)
        .expect("binary bolt");

    let partial = spell_damage_logs(&engine, SCORCH);
    assert_eq!(partial.len(), 1);
    let (damage, resisted) = partial[0];
    assert!(resisted > 0);
    assert_eq!(resisted % 100, 0);
    assert_eq!(damage + resisted, 1_000);

    assert_eq!(spell_damage_logs(&engine, FIREBALL), vec![(1_000, 0)]);
}

#[test]
fn heavy_hits_break_fear_unless_exempt() {
    let fear = SpellInfo::new(FEAR, "Fear")
        .with_duration(10_000)
        .with_effect(SpellEffectInfo::aura(AuraType::ModFear, 0));
    let howl = SpellInfo::new(HOWL_OF_TERROR, "Howl of Terror")
        .with_duration(10_000)
        .with_attributes(SpellAttributes::NO_DAMAGE_FEAR_BREAK)
        .with_effect(SpellEffectInfo::aura(AuraType::ModFear, 0));
    let catalog = SpellCatalog::new()
        .with(fear)
        .with(howl)
        .with(fire_spell(SCORCH, "Scorch", 0, 1_500));
    let mut fixture = Fixture::new(catalog);
    fixture.config.fear_break_health_pct = 15;
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    for spell in [FEAR, HOWL_OF_TERROR] {
        let info = engine.spell_info(spell).expect("spell");
        engine
            .add_aura_from_spell(Some(HERO), DUMMY, info, EffectMask::EFFECT_0, NO_OVERRIDES)
            .expect("applied");
    }
    assert!(engine.unit(DUMMY).expect("dummy").has_state(UnitState::FLEEING));

    // 1000 of 10000 health stays under the 15% threshold
    engine.attacker_state_update(HERO, DUMMY, WeaponAttackType::Base, false);
    assert_eq!(health(&engine, DUMMY), 9_000);
    assert!(engine.unit(DUMMY).expect("dummy").has_aura(FEAR));

    // 1500 of 9000 health crosses it
    engine
        .cast_spell(HERO, SCORCH, SpellTargets::unit(DUMMY), None)
        .expect("scorch");
    assert_eq!(health(&engine, DUMMY), 7_500);
    let dummy = engine.unit(DUMMY).expect("dummy");
    assert!(!dummy.has_aura(FEAR));
    assert!(dummy.has_aura(HOWL_OF_TERROR));
    assert!(dummy.has_state(UnitState::FLEEING));
}

#[test]
fn crit_damage_bonus_scales_the_crit_surplus() {
    let talent = SpellInfo::new(CRITICAL_MASS, "Critical Mass")
        .positive()
        .with_effect(
            SpellEffectInfo::aura(AuraType::ModCritDamageBonus, 20)
                .with_misc(i32::from(SchoolMask::FIRE.bits())),
        );
    let fixture = Fixture::new(SpellCatalog::new().with(talent));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let plain = engine.critical_damage(HERO, 1_000, SchoolMask::FIRE, DamageClass::Magic);
    assert_eq!(plain, 1_500);

    let info = engine.spell_info(CRITICAL_MASS).expect("spell");
    engine
        .add_aura_from_spell(Some(HERO), HERO, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");
    // 500 surplus, 20% more of it
    assert_eq!(engine.critical_damage(HERO, 1_000, SchoolMask::FIRE, DamageClass::Magic), 1_600);
    assert_eq!(engine.critical_damage(HERO, 1_000, SchoolMask::FROST, DamageClass::Magic), 1_500);
    assert_eq!(engine.critical_damage(HERO, 1_000, SchoolMask::FIRE, DamageClass::Melee), 2_200);
}

#[test]
fn crit_multiplier_below_normal_damage_does_not_underflow() {
    let talent = SpellInfo::new(CRITICAL_MASS, "Critical Mass")
        .positive()
        .with_effect(
            SpellEffectInfo::aura(AuraType::ModCritDamageBonus, 20)
                .with_misc(i32::from(SchoolMask::FIRE.bits())),
        );
    let mut fixture = Fixture::new(SpellCatalog::new().with(talent));
    fixture.config.spell_crit_multiplier_pct = 50;
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let info = engine.spell_info(CRITICAL_MASS).expect("spell");
    engine
        .add_aura_from_spell(Some(HERO), HERO, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");
    // 500 after the multiplier, the bonus widens the 500 shortfall by 20%
    assert_eq!(engine.critical_damage(HERO, 1_000, SchoolMask::FIRE, DamageClass::Magic), 400);
}

// ============================================================================
// Hit tables
// ============================================================================

fn creature(id: UnitId, level: u8, faction: u32, x: f32) -> Unit {
    Unit::new(id, UnitRole::Creature, level)
        .with_faction(faction)
        .with_health(10_000, 10_000)
        .with_armor(0)
        .with_position(Position::new(x, 0.0, 0.0, PI))
}

#[test]
fn glancing_and_crushing_need_a_level_gap() {
    let fixture = Fixture::new(SpellCatalog::new());
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);
    engine.spawn(creature(BOSS, 64, 2, 3.0)).expect("boss spawns");

    let even = engine
        .melee_chances(HERO, DUMMY, WeaponAttackType::Base)
        .expect("chances");
    assert_eq!(even.glancing, 0);
    let even = engine
        .melee_chances(DUMMY, HERO, WeaponAttackType::Base)
        .expect("chances");
    assert_eq!(even.crushing, 0);

    // defense 320 against weapon skill 300
    let up = engine
        .melee_chances(HERO, BOSS, WeaponAttackType::Base)
        .expect("chances");
    assert_eq!(up.glancing, 3_000);
    assert_eq!(up.crushing, 0);
    let ranged = engine
        .melee_chances(HERO, BOSS, WeaponAttackType::Ranged)
        .expect("chances");
    assert_eq!(ranged.glancing, 0);

    // skill 320 against defense 300
    let down = engine
        .melee_chances(BOSS, HERO, WeaponAttackType::Base)
        .expect("chances");
    assert_eq!(down.crushing, 2_500);
    assert_eq!(down.glancing, 0);
}

// ============================================================================
// Healing
// ============================================================================

#[test]
fn overheal_is_not_counted_as_healing_done() {
    let heal = SpellInfo::new(FLASH_HEAL, "Flash Heal")
        .positive()
        .with_school(SchoolMask::HOLY)
        .with_dmg_class(DamageClass::Magic)
        .with_effect(SpellEffectInfo::new(SpellEffectKind::Heal, 500));
    let fixture = Fixture::new(SpellCatalog::new().with(heal));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);
    engine.despawn(HERO).expect("despawn");
    engine.spawn(hero().with_health(4_900, 5_000)).expect("respawn");

    engine
        .cast_spell(HERO, FLASH_HEAL, SpellTargets::unit(HERO), None)
        .expect("heal cast");

    let hero = engine.unit(HERO).expect("hero");
    assert!(hero.is_full_health());
    assert_eq!(hero.statistics.healing_done, 100);
    assert_eq!(hero.statistics.healing_received, 100);
    assert_eq!(hero.statistics.highest_heal_cast, 500);
    assert!(engine.state().events().iter().any(|event| matches!(
        event,
        CombatEvent::HealLog { amount: 500, gain: 100, overheal: 400, .. }
    )));
}

// ============================================================================
// Cast slots
// ============================================================================

#[test]
fn hard_cast_interrupts_running_channel() {
    let missiles = SpellInfo::new(ARCANE_MISSILES, "Arcane Missiles")
        .positive()
        .with_attributes(SpellAttributes::CHANNELED)
        .with_duration(5_000)
        .with_effect(SpellEffectInfo::new(SpellEffectKind::Dummy, 0).on_caster());
    let fireball = SpellInfo::new(FIREBALL, "Fireball")
        .with_school(SchoolMask::FIRE)
        .with_dmg_class(DamageClass::Magic)
        .with_cast_time(2_500)
        .with_effect(SpellEffectInfo::new(SpellEffectKind::SchoolDamage, 500));
    let fixture = Fixture::new(SpellCatalog::new().with(missiles).with(fireball));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let channel = engine
        .cast_spell(HERO, ARCANE_MISSILES, SpellTargets::none(), None)
        .expect("channel");
    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Channeled), Some(channel));
    assert!(hero.has_state(UnitState::CASTING));

    let bolt = engine
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY), None)
        .expect("fireball");

    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Channeled), None);
    assert_eq!(hero.current_cast(CurrentSpellType::Generic), Some(bolt));
    assert!(hero.has_state(UnitState::CASTING));
    assert_eq!(engine.cast(channel).map(|c| c.state), Some(CastState::Cancelled));
    assert!(engine.slots_consistent(HERO));
    assert!(engine.state().events().iter().any(|event| matches!(
        event,
        CombatEvent::SpellInterrupted { spell, cast, .. }
            if *spell == ARCANE_MISSILES && *cast == channel
    )));

    engine.update_world(2_500);

    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Generic), None);
    assert!(!hero.has_state(UnitState::CASTING));
    assert_eq!(health(&engine, DUMMY), 9_500);
    assert!(engine.cast(channel).is_none(), "finished casts leave the arena");
}

fn fire_spell(id: SpellId, name: &str, cast_time_ms: u32, damage: i32) -> SpellInfo {
    SpellInfo::new(id, name)
        .with_school(SchoolMask::FIRE)
        .with_dmg_class(DamageClass::Magic)
        .with_cast_time(cast_time_ms)
        .with_effect(SpellEffectInfo::new(SpellEffectKind::SchoolDamage, damage))
}

fn channel(id: SpellId, name: &str) -> SpellInfo {
    SpellInfo::new(id, name)
        .positive()
        .with_attributes(SpellAttributes::CHANNELED)
        .with_duration(5_000)
        .with_effect(SpellEffectInfo::new(SpellEffectKind::Dummy, 0).on_caster())
}

fn ranged_attack(id: SpellId, name: &str) -> SpellInfo {
    SpellInfo::new(id, name)
        .with_attributes(SpellAttributes::AUTOREPEAT)
        .with_dmg_class(DamageClass::Ranged)
        .with_effect(SpellEffectInfo::new(SpellEffectKind::SchoolDamage, 100))
}

fn interrupted(engine: &CombatEngine<'_>, id: CastId) -> bool {
    engine
        .state()
        .events()
        .iter()
        .any(|event| matches!(event, CombatEvent::SpellInterrupted { cast, .. } if *cast == id))
}

#[test]
fn second_hard_cast_takes_over_the_generic_slot() {
    let catalog = SpellCatalog::new()
        .with(fire_spell(FIREBALL, "Fireball", 2_500, 500))
        .with(fire_spell(SCORCH, "Scorch", 1_500, 300));
    let fixture = Fixture::new(catalog);
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let bolt = engine
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY), None)
        .expect("fireball");
    let second = engine.cast_spell(HERO, SCORCH, SpellTargets::unit(DUMMY), None);
    assert!(second.is_ok(), "a new hard cast is never refused: {second:?}");
    let scorch = second.expect("scorch");

    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Generic), Some(scorch));
    assert!(hero.has_state(UnitState::CASTING));
    assert_eq!(engine.cast(bolt).map(|c| c.state), Some(CastState::Cancelled));
    assert!(interrupted(&engine, bolt));
    assert!(engine.slots_consistent(HERO));

    engine.update_world(1_500);
    assert_eq!(health(&engine, DUMMY), 9_700);
    engine.update_world(1_000);
    assert_eq!(health(&engine, DUMMY), 9_700, "the replaced fireball never lands");
    assert!(spell_damage_logs(&engine, FIREBALL).is_empty());
}

#[test]
fn new_channel_replaces_running_channel() {
    let catalog = SpellCatalog::new()
        .with(channel(ARCANE_MISSILES, "Arcane Missiles"))
        .with(channel(DRAIN_LIFE, "Drain Life"));
    let fixture = Fixture::new(catalog);
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let missiles = engine
        .cast_spell(HERO, ARCANE_MISSILES, SpellTargets::none(), None)
        .expect("missiles");
    assert_eq!(engine.cast(missiles).map(|c| c.state), Some(CastState::Casting));

    let drain = engine
        .cast_spell(HERO, DRAIN_LIFE, SpellTargets::none(), None)
        .expect("drain");

    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Channeled), Some(drain));
    assert!(hero.has_state(UnitState::CASTING));
    assert_eq!(engine.cast(missiles).map(|c| c.state), Some(CastState::Cancelled));
    assert_eq!(engine.cast(drain).map(|c| c.state), Some(CastState::Casting));
    assert!(interrupted(&engine, missiles));
    assert!(engine.slots_consistent(HERO));
}

#[test]
fn only_wand_style_autorepeat_breaks_on_hard_casts() {
    let catalog = SpellCatalog::new()
        .with(ranged_attack(AUTO_SHOT, "Auto Shot"))
        .with(ranged_attack(SHOOT, "Shoot"))
        .with(fire_spell(FIREBALL, "Fireball", 2_500, 500));
    let fixture = Fixture::new(catalog);
    assert_eq!(fixture.config.default_ranged_spell, AUTO_SHOT);
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let shot = engine
        .cast_spell(HERO, AUTO_SHOT, SpellTargets::unit(DUMMY), None)
        .expect("auto shot");
    let bolt = engine
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY), None)
        .expect("fireball");
    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Autorepeat), Some(shot));
    assert_eq!(hero.current_cast(CurrentSpellType::Generic), Some(bolt));
    assert_eq!(engine.cast(shot).map(|c| c.state), Some(CastState::Preparing));

    // a wand shot displaces the auto shot and the hard cast alike
    let wand = engine
        .cast_spell(HERO, SHOOT, SpellTargets::unit(DUMMY), None)
        .expect("wand");
    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Autorepeat), Some(wand));
    assert_eq!(hero.current_cast(CurrentSpellType::Generic), None);
    assert!(!hero.has_state(UnitState::CASTING));
    assert_eq!(engine.cast(shot).map(|c| c.state), Some(CastState::Cancelled));
    assert_eq!(engine.cast(bolt).map(|c| c.state), Some(CastState::Cancelled));

    let second_bolt = engine
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY), None)
        .expect("fireball");
    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Autorepeat), None);
    assert_eq!(hero.current_cast(CurrentSpellType::Generic), Some(second_bolt));
    assert_eq!(engine.cast(wand).map(|c| c.state), Some(CastState::Cancelled));
    assert!(engine.slots_consistent(HERO));
}

#[test]
fn listed_spells_ignore_interrupts_from_other_units() {
    let catalog = SpellCatalog::new().with(fire_spell(FIREBALL, "Fireball", 2_500, 500));
    let mut fixture = Fixture::new(catalog);
    fixture.config.uninterruptible_by_others = vec![FIREBALL];
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let bolt = engine
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY), None)
        .expect("fireball");

    let kicked = engine.interrupt_spell(HERO, CurrentSpellType::Generic, false, true, Some(DUMMY));
    assert!(!kicked);
    assert_eq!(engine.cast(bolt).map(|c| c.state), Some(CastState::Preparing));
    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.current_cast(CurrentSpellType::Generic), Some(bolt));

    // the caster can still stop its own cast
    assert!(engine.interrupt_spell(HERO, CurrentSpellType::Generic, false, true, Some(HERO)));
    assert_eq!(engine.cast(bolt).map(|c| c.state), Some(CastState::Cancelled));
    assert!(!engine.unit(HERO).expect("hero").has_state(UnitState::CASTING));
}

// ============================================================================
// Aura stacking
// ============================================================================

fn shout(id: SpellId, amount: i32, rule: StackRule) -> SpellInfo {
    SpellInfo::new(id, "Shout")
        .positive()
        .with_duration(120_000)
        .with_stack_group(1, rule)
        .with_effect(SpellEffectInfo::aura(AuraType::ModDamageDone, amount).with_misc(1))
}

#[test]
fn exclusive_group_keeps_only_the_newest() {
    let catalog = SpellCatalog::new()
        .with(shout(BATTLE_SHOUT, 10, StackRule::Exclusive))
        .with(shout(COMMANDING_SHOUT, 20, StackRule::Exclusive));
    let fixture = Fixture::new(catalog);
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    for spell in [BATTLE_SHOUT, COMMANDING_SHOUT] {
        let info = engine.spell_info(spell).expect("spell");
        engine
            .add_aura_from_spell(Some(HERO), HERO, info, EffectMask::EFFECT_0, NO_OVERRIDES)
            .expect("applied");
    }

    let hero = engine.unit(HERO).expect("hero");
    assert!(!hero.has_aura(BATTLE_SHOUT));
    assert!(hero.has_aura(COMMANDING_SHOUT));
    assert_eq!(hero.applied_auras.len(), 1);
    assert_eq!(engine.effects_of(HERO).total_modifier(AuraType::ModDamageDone), 20);
}

#[test]
fn exclusive_highest_rejects_a_weaker_newcomer() {
    let catalog = SpellCatalog::new()
        .with(shout(GREATER_MIGHT, 185, StackRule::ExclusiveHighest))
        .with(shout(BLESSING_OF_MIGHT, 155, StackRule::ExclusiveHighest));
    let fixture = Fixture::new(catalog);
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let strong = engine.spell_info(GREATER_MIGHT).expect("spell");
    engine
        .add_aura_from_spell(Some(HERO), HERO, strong, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");
    let weak = engine.spell_info(BLESSING_OF_MIGHT).expect("spell");
    let rejected =
        engine.add_aura_from_spell(Some(DUMMY), HERO, weak, EffectMask::EFFECT_0, NO_OVERRIDES);

    assert!(rejected.is_none());
    let hero = engine.unit(HERO).expect("hero");
    assert!(hero.has_aura(GREATER_MIGHT));
    assert!(!hero.has_aura(BLESSING_OF_MIGHT));
}

#[test]
fn restacking_stops_at_the_cap() {
    let sunder = SpellInfo::new(SUNDER, "Sunder Armor")
        .with_duration(30_000)
        .with_max_stack(3)
        .with_effect(SpellEffectInfo::aura(AuraType::ModResistance, -90).with_misc(1));
    let fixture = Fixture::new(SpellCatalog::new().with(sunder));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let info = engine.spell_info(SUNDER).expect("spell");
    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(
            engine
                .add_aura_from_spell(Some(HERO), DUMMY, info, EffectMask::EFFECT_0, NO_OVERRIDES)
                .expect("applied"),
        );
    }

    ids.dedup();
    assert_eq!(ids.len(), 1, "every application refreshed the same aura");
    assert_eq!(engine.aura(ids[0]).map(|a| a.stack), Some(3));
    assert_eq!(engine.unit(DUMMY).expect("dummy").applications_of(SUNDER).count(), 1);
}

#[test]
fn refreshed_aura_gets_the_same_charges_as_a_fresh_one() {
    let thrash = SpellInfo::new(THRASH, "Thrash")
        .positive()
        .with_charges(3)
        .with_proc(ProcEntry {
            charges: 2,
            ..ProcEntry::new(ProcFlags::DONE_MELEE_AUTO_ATTACK)
        })
        .with_effect(SpellEffectInfo::aura(AuraType::ProcTriggerDamage, 100));
    let fixture = Fixture::new(SpellCatalog::new().with(thrash));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let info = engine.spell_info(THRASH).expect("spell");
    let aura = engine
        .add_aura_from_spell(Some(HERO), HERO, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");
    assert_eq!(engine.aura(aura).map(|a| a.charges), Some(3));

    engine.attacker_state_update(HERO, DUMMY, WeaponAttackType::Base, false);
    assert_eq!(engine.aura(aura).map(|a| a.charges), Some(2));

    let refreshed = engine
        .add_aura_from_spell(Some(HERO), HERO, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("refreshed");
    assert_eq!(refreshed, aura);
    assert_eq!(engine.aura(aura).map(|a| a.charges), Some(3));
}

// ============================================================================
// Dispel and targeting
// ============================================================================

#[test]
fn dispel_takes_buffs_from_enemies_and_debuffs_from_friends() {
    let shout = SpellInfo::new(BATTLE_SHOUT, "Battle Shout")
        .positive()
        .with_duration(120_000)
        .with_max_stack(2)
        .with_dispel(DispelType::Magic)
        .with_effect(SpellEffectInfo::aura(AuraType::ModDamageDone, 10).with_misc(1));
    let pain = SpellInfo::new(SHADOW_WORD_PAIN, "Shadow Word: Pain")
        .with_school(SchoolMask::SHADOW)
        .with_duration(18_000)
        .with_dispel(DispelType::Magic)
        .with_effect(SpellEffectInfo::aura(AuraType::PeriodicDamage, 50).with_amplitude(3_000));
    let fixture = Fixture::new(SpellCatalog::new().with(shout).with(pain));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let buff = engine.spell_info(BATTLE_SHOUT).expect("spell");
    let mut stacked = None;
    for _ in 0..2 {
        stacked = engine.add_aura_from_spell(
            Some(DUMMY),
            DUMMY,
            buff,
            EffectMask::EFFECT_0,
            NO_OVERRIDES,
        );
    }
    let stacked = stacked.expect("applied");
    assert_eq!(engine.aura(stacked).map(|a| a.stack), Some(2));
    let debuff = engine.spell_info(SHADOW_WORD_PAIN).expect("spell");
    engine
        .add_aura_from_spell(Some(HERO), DUMMY, debuff, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");

    // an enemy dispel peels one stack at a time and never touches the debuff
    assert_eq!(engine.remove_auras_by_dispel(DUMMY, DispelType::Magic, 1, HERO), 1);
    assert_eq!(engine.aura(stacked).map(|a| a.stack), Some(1));
    assert_eq!(engine.remove_auras_by_dispel(DUMMY, DispelType::Magic, 5, HERO), 1);
    assert!(!engine.unit(DUMMY).expect("dummy").has_aura(BATTLE_SHOUT));
    assert_eq!(engine.remove_auras_by_dispel(DUMMY, DispelType::Magic, 5, HERO), 0);
    assert!(engine.unit(DUMMY).expect("dummy").has_aura(SHADOW_WORD_PAIN));

    assert_eq!(engine.remove_auras_by_dispel(DUMMY, DispelType::Curse, 5, DUMMY), 0);
    assert_eq!(engine.remove_auras_by_dispel(DUMMY, DispelType::Magic, 5, DUMMY), 1);
    assert!(!engine.unit(DUMMY).expect("dummy").has_aura(SHADOW_WORD_PAIN));
    assert!(engine.state().events().iter().any(|event| matches!(
        event,
        CombatEvent::AuraRemoved { spell, mode: AuraRemoveMode::EnemySpell, .. }
            if *spell == SHADOW_WORD_PAIN
    )));
}

#[test]
fn single_target_aura_follows_the_casters_latest_target() {
    let roots = SpellInfo::new(ENTANGLING_ROOTS, "Entangling Roots")
        .with_duration(12_000)
        .with_attributes(SpellAttributes::SINGLE_TARGET)
        .with_effect(SpellEffectInfo::aura(AuraType::ModRoot, 0));
    let fixture = Fixture::new(SpellCatalog::new().with(roots));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);
    engine.spawn(creature(BOSS, 60, 2, 4.0)).expect("second target");

    let info = engine.spell_info(ENTANGLING_ROOTS).expect("spell");
    let first = engine
        .add_aura_from_spell(Some(HERO), DUMMY, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");
    assert!(engine.unit(DUMMY).expect("dummy").has_state(UnitState::ROOT));

    let second = engine
        .add_aura_from_spell(Some(HERO), BOSS, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");

    assert_ne!(first, second);
    let dummy = engine.unit(DUMMY).expect("dummy");
    assert!(!dummy.has_aura(ENTANGLING_ROOTS));
    assert!(!dummy.has_state(UnitState::ROOT));
    assert!(engine.unit(BOSS).expect("boss").has_aura(ENTANGLING_ROOTS));
    assert_eq!(engine.unit(HERO).expect("hero").single_cast_auras, vec![second]);

    // a second caster keeps its own copy
    engine
        .add_aura_from_spell(Some(DUMMY), DUMMY, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");
    assert!(engine.unit(BOSS).expect("boss").has_aura(ENTANGLING_ROOTS));
}

#[test]
fn area_aura_follows_allies_in_and_out_of_range() {
    let aura = SpellInfo::new(DEVOTION_AURA, "Devotion Aura")
        .positive()
        .with_effect(
            SpellEffectInfo {
                kind: SpellEffectKind::ApplyAreaAuraFriend,
                ..SpellEffectInfo::aura(AuraType::ModDamageDone, 10).with_misc(1)
            }
            .with_radius(10.0),
        );
    let fixture = Fixture::new(SpellCatalog::new().with(aura));
    let interval = u64::from(fixture.config.area_aura_update_interval_ms);
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);
    engine.spawn(creature(ALLY, 60, 1, -5.0)).expect("ally spawns");

    let info = engine.spell_info(DEVOTION_AURA).expect("spell");
    let aura = engine
        .add_aura_from_spell(Some(HERO), HERO, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");
    assert!(engine.unit(HERO).expect("hero").has_aura(DEVOTION_AURA));
    assert!(engine.unit(ALLY).expect("ally").has_aura(DEVOTION_AURA));
    assert!(!engine.unit(DUMMY).expect("dummy").has_aura(DEVOTION_AURA), "enemies are skipped");

    engine.state_mut().unit_mut(ALLY).expect("ally").position = Position::new(-30.0, 0.0, 0.0, 0.0);
    engine.update_world(interval);
    assert!(!engine.unit(ALLY).expect("ally").has_aura(DEVOTION_AURA));
    assert_eq!(engine.effects_of(ALLY).total_modifier(AuraType::ModDamageDone), 0);
    assert!(engine.unit(HERO).expect("hero").has_aura(DEVOTION_AURA));

    engine.state_mut().unit_mut(ALLY).expect("ally").position = Position::new(-5.0, 0.0, 0.0, 0.0);
    engine.update_world(interval);
    assert!(engine.unit(ALLY).expect("ally").has_aura(DEVOTION_AURA));
    assert_eq!(engine.aura(aura).map(|a| a.targets().count()), Some(2));
}

// ============================================================================
// Re-entrant removal
// ============================================================================

/// Removing the shield also strips the shout, from inside the removal.
fn strip_shout_on_shield_removal(
    engine: &mut CombatEngine<'_>,
    _aura: AuraId,
    target: UnitId,
    _mode: AuraRemoveMode,
) {
    engine.remove_auras_by_spell(target, BATTLE_SHOUT, None, AuraRemoveMode::Default);
}

#[test]
fn nested_removal_from_a_remove_hook_leaves_no_auras_behind() {
    let shield = SpellInfo::new(SHIELD, "Power Word: Shield")
        .positive()
        .with_duration(30_000)
        .with_effect(SpellEffectInfo::aura(AuraType::SchoolAbsorb, 300).with_misc(127));
    let mut scripts = SpellScriptRegistry::new();
    scripts.register_on_aura_remove(SHIELD, strip_shout_on_shield_removal);
    let catalog = SpellCatalog::new()
        .with(shield)
        .with(shout(BATTLE_SHOUT, 10, StackRule::Default))
        .with(shout(SUNDER, 5, StackRule::Default));
    let fixture = Fixture::with_scripts(catalog, scripts);
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    for spell in [SHIELD, BATTLE_SHOUT, SUNDER] {
        let info = engine.spell_info(spell).expect("spell");
        engine
            .add_aura_from_spell(Some(HERO), HERO, info, EffectMask::EFFECT_0, NO_OVERRIDES)
            .expect("applied");
    }
    assert_eq!(engine.unit(HERO).expect("hero").applied_auras.len(), 3);

    engine.remove_auras_by_spell(HERO, SHIELD, None, AuraRemoveMode::Cancel);
    let hero = engine.unit(HERO).expect("hero");
    assert!(!hero.has_aura(SHIELD));
    assert!(!hero.has_aura(BATTLE_SHOUT));
    assert!(hero.has_aura(SUNDER));

    engine.remove_all_auras(HERO);
    engine.update_world(0);
    let hero = engine.unit(HERO).expect("hero");
    assert!(hero.applied_auras.is_empty());
    assert!(hero.owned_auras.is_empty());
    assert!(hero.effects.is_empty());
}

// ============================================================================
// Update loop
// ============================================================================

#[test]
fn auto_attack_swings_on_its_timer() {
    let fixture = Fixture::new(SpellCatalog::new());
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    assert!(engine.attack_start(HERO, DUMMY));
    engine.update_world(100);
    assert_eq!(health(&engine, DUMMY), 9_000);

    engine.update_world(1_000);
    assert_eq!(health(&engine, DUMMY), 9_000, "swing timer still running");

    engine.update_world(1_000);
    assert_eq!(health(&engine, DUMMY), 8_000);

    assert!(engine.attack_stop(HERO));
    engine.update_world(5_000);
    assert_eq!(health(&engine, DUMMY), 8_000);
}

#[test]
fn damage_over_time_ticks_until_expiry() {
    let pain = SpellInfo::new(SHADOW_WORD_PAIN, "Shadow Word: Pain")
        .with_school(SchoolMask::SHADOW)
        .with_dmg_class(DamageClass::Magic)
        .with_duration(3_000)
        .with_effect(SpellEffectInfo::aura(AuraType::PeriodicDamage, 50).with_amplitude(1_000));
    let fixture = Fixture::new(SpellCatalog::new().with(pain));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    engine
        .cast_spell(HERO, SHADOW_WORD_PAIN, SpellTargets::unit(DUMMY), None)
        .expect("dot cast");
    assert!(engine.unit(DUMMY).expect("dummy").has_aura(SHADOW_WORD_PAIN));

    for _ in 0..3 {
        engine.update_world(1_000);
    }
    assert_eq!(health(&engine, DUMMY), 9_850);
    assert!(!engine.unit(DUMMY).expect("dummy").has_aura(SHADOW_WORD_PAIN));

    engine.update_world(1_000);
    assert_eq!(health(&engine, DUMMY), 9_850);
}

// ============================================================================
// Procs
// ============================================================================

#[test]
fn proc_charges_run_out_and_remove_the_aura() {
    let thrash = SpellInfo::new(THRASH, "Thrash")
        .positive()
        .with_proc(ProcEntry {
            charges: 2,
            ..ProcEntry::new(ProcFlags::DONE_MELEE_AUTO_ATTACK)
        })
        .with_effect(SpellEffectInfo::aura(AuraType::ProcTriggerDamage, 100));
    let fixture = Fixture::new(SpellCatalog::new().with(thrash));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    let info = engine.spell_info(THRASH).expect("spell");
    let aura = engine
        .add_aura_from_spell(Some(HERO), HERO, info, EffectMask::EFFECT_0, NO_OVERRIDES)
        .expect("applied");
    assert_eq!(engine.aura(aura).map(|a| a.charges), Some(2));

    engine.attacker_state_update(HERO, DUMMY, WeaponAttackType::Base, false);
    assert_eq!(health(&engine, DUMMY), 8_900);
    assert_eq!(engine.aura(aura).map(|a| a.charges), Some(1));

    engine.attacker_state_update(HERO, DUMMY, WeaponAttackType::Base, false);
    assert_eq!(health(&engine, DUMMY), 7_800);
    assert!(!engine.unit(HERO).expect("hero").has_aura(THRASH));

    engine.attacker_state_update(HERO, DUMMY, WeaponAttackType::Base, false);
    assert_eq!(health(&engine, DUMMY), 6_800);
    assert_eq!(engine.unit(HERO).expect("hero").proc_depth, 0);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn despawn_leaves_the_unit_quiescent() {
    let pain = SpellInfo::new(SHADOW_WORD_PAIN, "Shadow Word: Pain")
        .with_school(SchoolMask::SHADOW)
        .with_dmg_class(DamageClass::Magic)
        .with_duration(18_000)
        .with_effect(SpellEffectInfo::aura(AuraType::PeriodicDamage, 50).with_amplitude(3_000));
    let fixture = Fixture::new(SpellCatalog::new().with(pain));
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);

    engine
        .cast_spell(HERO, SHADOW_WORD_PAIN, SpellTargets::unit(DUMMY), None)
        .expect("dot cast");
    assert!(engine.attack_start(HERO, DUMMY));

    let dummy = engine.despawn(DUMMY).expect("despawn");
    assert!(dummy.is_quiescent());
    assert!(engine.unit(DUMMY).is_none());
    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.victim, None);
    assert!(!hero.has_state(UnitState::MELEE_ATTACKING));

    // the world keeps running without the dummy
    engine.update_world(3_000);
    assert!(engine.spawn(training_dummy()).is_ok());
    assert!(engine.spawn(training_dummy()).is_err());
}

#[test]
#[should_panic(expected = "despawned while still active")]
fn despawn_with_a_dangling_attacker_panics() {
    let fixture = Fixture::new(SpellCatalog::new());
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);
    // an attacker id that no longer resolves cannot be stopped
    engine
        .state_mut()
        .unit_mut(DUMMY)
        .expect("dummy")
        .attackers
        .insert(UnitId(99));

    let _ = engine.despawn(DUMMY);
}

#[test]
#[should_panic(expected = "proc depth")]
fn update_with_leaked_proc_depth_panics() {
    let fixture = Fixture::new(SpellCatalog::new());
    let mut world = WorldState::new(7);
    let mut engine = fixture.engine(&mut world);
    engine.state_mut().unit_mut(HERO).expect("hero").proc_depth = 1;

    engine.update_unit(HERO, 100);
}

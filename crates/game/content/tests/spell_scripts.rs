//! The registered special cases, driven through a real engine.

use std::f32::consts::PI;

use combat_content::scripts::{
    ANTI_MAGIC_SHELL, LIFE_TAP, LIVING_BOMB, LIVING_BOMB_EXPLOSION, SUDDEN_DEATH, VENGEANCE,
};
use combat_content::spell_scripts;
use combat_core::aura::BaseAmounts;
use combat_core::proc::ProcFlags;
use combat_core::spell::DamageClass;
use combat_core::state::{PowerType, WeaponAttackType, WeaponProfile};
use combat_core::{
    AuraId, AuraType, CombatConfig, CombatEngine, CombatEnv, CombatEvent, EffectMask, Position,
    ProcEventInfo, SchoolMask, ScriptedRng, SpellCatalog, SpellEffectInfo, SpellEffectKind, SpellId,
    SpellInfo, SpellScriptRegistry, SpellTargets, Unit, UnitId, UnitRole, WorldState,
};

const HERO: UnitId = UnitId(1);
const DUMMY: UnitId = UnitId(2);
const FROSTFIRE_BOLT: SpellId = SpellId(44614);

struct Fixture {
    catalog: SpellCatalog,
    rng: ScriptedRng,
    scripts: SpellScriptRegistry,
    config: CombatConfig,
}

impl Fixture {
    fn new(catalog: SpellCatalog) -> Self {
        Self {
            catalog,
            rng: ScriptedRng::constant(9999),
            scripts: spell_scripts(),
            config: CombatConfig::default(),
        }
    }

    fn engine<'a>(&'a self, world: &'a mut WorldState) -> CombatEngine<'a> {
        let env = CombatEnv::new(&self.catalog, &self.rng, &self.scripts, &self.config);
        let mut engine = CombatEngine::new(world, env);
        let hero = Unit::new(HERO, UnitRole::Player, 60)
            .with_faction(1)
            .with_health(5_000, 5_000)
            .with_power(PowerType::Mana, 0, 5_000)
            .with_position(Position::new(0.0, 0.0, 0.0, 0.0))
            .with_weapon(WeaponAttackType::Base, WeaponProfile::new(1000.0, 1000.0, 2000));
        let dummy = Unit::new(DUMMY, UnitRole::Creature, 60)
            .with_faction(2)
            .with_health(10_000, 10_000)
            .with_armor(0)
            .with_position(Position::new(2.0, 0.0, 0.0, PI));
        engine.spawn(hero).expect("hero spawns");
        engine.spawn(dummy).expect("dummy spawns");
        engine
    }
}

fn health(engine: &CombatEngine<'_>, unit: UnitId) -> u32 {
    engine.unit(unit).map_or(0, Unit::health)
}

fn fire_bolt(id: SpellId, damage: i32) -> SpellInfo {
    SpellInfo::new(id, "Bolt")
        .with_school(SchoolMask::FIRE)
        .with_dmg_class(DamageClass::Magic)
        .with_effect(SpellEffectInfo::new(SpellEffectKind::SchoolDamage, damage))
}

#[test]
fn anti_magic_shell_soaks_three_quarters() {
    let shell = SpellInfo::new(ANTI_MAGIC_SHELL, "Anti-Magic Shell")
        .positive()
        .with_duration(5_000)
        .with_effect(
            SpellEffectInfo::aura(AuraType::SchoolAbsorb, 10_000)
                .with_misc(i32::from(SchoolMask::MAGIC.bits())),
        );
    let fixture =
        Fixture::new(SpellCatalog::new().with(shell).with(fire_bolt(FROSTFIRE_BOLT, 1_000)));
    let mut world = WorldState::new(3);
    let mut engine = fixture.engine(&mut world);

    engine
        .cast_spell(DUMMY, ANTI_MAGIC_SHELL, SpellTargets::unit(DUMMY), None)
        .expect("shell cast");
    engine
        .cast_spell(HERO, FROSTFIRE_BOLT, SpellTargets::unit(DUMMY), None)
        .expect("bolt cast");

    assert_eq!(health(&engine, DUMMY), 9_750);
    assert!(engine.unit(DUMMY).expect("dummy").has_aura(ANTI_MAGIC_SHELL));
}

#[test]
fn living_bomb_explodes_when_it_runs_out() {
    let bomb = SpellInfo::new(LIVING_BOMB, "Living Bomb")
        .with_school(SchoolMask::FIRE)
        .with_dmg_class(DamageClass::Magic)
        .with_duration(3_000)
        .with_effect(SpellEffectInfo::aura(AuraType::PeriodicDamage, 100).with_amplitude(1_000));
    let explosion = fire_bolt(LIVING_BOMB_EXPLOSION, 500);
    let fixture = Fixture::new(SpellCatalog::new().with(bomb).with(explosion));
    let mut world = WorldState::new(3);
    let mut engine = fixture.engine(&mut world);

    engine
        .cast_spell(HERO, LIVING_BOMB, SpellTargets::unit(DUMMY), None)
        .expect("bomb cast");
    for _ in 0..3 {
        engine.update_world(1_000);
    }

    assert!(!engine.unit(DUMMY).expect("dummy").has_aura(LIVING_BOMB));
    assert_eq!(health(&engine, DUMMY), 10_000 - 300 - 500);
    assert!(engine.state().events().iter().any(|event| matches!(
        event,
        CombatEvent::SpellDamageLog { spell, damage: 500, .. } if *spell == LIVING_BOMB_EXPLOSION
    )));
}

#[test]
fn living_bomb_does_not_explode_when_cancelled() {
    let bomb = SpellInfo::new(LIVING_BOMB, "Living Bomb")
        .with_school(SchoolMask::FIRE)
        .with_dmg_class(DamageClass::Magic)
        .with_duration(3_000)
        .with_effect(SpellEffectInfo::aura(AuraType::PeriodicDamage, 100).with_amplitude(1_000));
    let fixture = Fixture::new(
        SpellCatalog::new()
            .with(bomb)
            .with(fire_bolt(LIVING_BOMB_EXPLOSION, 500)),
    );
    let mut world = WorldState::new(3);
    let mut engine = fixture.engine(&mut world);

    engine
        .cast_spell(HERO, LIVING_BOMB, SpellTargets::unit(DUMMY), None)
        .expect("bomb cast");
    engine.remove_all_auras(DUMMY);

    assert_eq!(health(&engine, DUMMY), 10_000);
}

#[test]
fn life_tap_trades_health_for_mana() {
    let tap = SpellInfo::new(LIFE_TAP, "Life Tap")
        .positive()
        .with_school(SchoolMask::SHADOW)
        .with_effect(SpellEffectInfo::new(SpellEffectKind::Dummy, 500).on_caster());
    let fixture = Fixture::new(SpellCatalog::new().with(tap));
    let mut world = WorldState::new(3);
    let mut engine = fixture.engine(&mut world);

    engine
        .cast_spell(HERO, LIFE_TAP, SpellTargets::none(), None)
        .expect("life tap cast");

    let hero = engine.unit(HERO).expect("hero");
    assert_eq!(hero.health(), 4_500);
    assert_eq!(hero.power(PowerType::Mana), 500);
}

#[test]
fn vengeance_converts_damage_taken_exactly_once() {
    let vengeance = SpellInfo::new(VENGEANCE, "Vengeance")
        .positive()
        .with_effect(SpellEffectInfo::aura(AuraType::Dummy, 0));
    let fixture = Fixture::new(SpellCatalog::new().with(vengeance));
    let mut world = WorldState::new(3);
    let mut engine = fixture.engine(&mut world);

    let info = engine.spell_info(VENGEANCE).expect("vengeance");
    let no_overrides: BaseAmounts = [None; 3];
    engine
        .add_aura_from_spell(Some(DUMMY), DUMMY, info, EffectMask::EFFECT_0, no_overrides)
        .expect("vengeance applied");

    engine.attacker_state_update(HERO, DUMMY, WeaponAttackType::Base, false);

    let grants: Vec<i32> = engine
        .state()
        .events()
        .iter()
        .filter_map(|event| match event {
            CombatEvent::Energize { spell, amount, .. } if *spell == VENGEANCE => Some(*amount),
            _ => None,
        })
        .collect();
    assert_eq!(grants.len(), 1);
}

#[test]
fn sudden_death_only_procs_in_execute_range() {
    let fixture = Fixture::new(SpellCatalog::new());
    let mut world = WorldState::new(3);
    let mut engine = fixture.engine(&mut world);
    let check = fixture.scripts.check_proc(SUDDEN_DEATH).expect("registered");
    let event = ProcEventInfo::new(HERO, Some(DUMMY), ProcFlags::DONE_MELEE_AUTO_ATTACK);

    assert!(!check(&engine, AuraId(0), &event));

    engine
        .state_mut()
        .unit_mut(DUMMY)
        .expect("dummy")
        .modify_health(-8_500);
    assert!(check(&engine, AuraId(0), &event));
}

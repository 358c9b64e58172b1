//! Runtime behavior end to end: commands over the channel, events on topics,
//! timed and manual clock advancement, and the combat log.

use std::f32::consts::PI;

use tokio::sync::broadcast;

use combat_content::spell_scripts;
use combat_core::spell::DamageClass;
use combat_core::state::{WeaponAttackType, WeaponProfile};
use combat_core::{
    CombatConfig, CombatEvent, CurrentSpellType, EngineError, GameTime, Position, SchoolMask,
    ScriptedRng, SpellCatalog, SpellEffectInfo, SpellEffectKind, SpellId, SpellInfo, SpellTargets,
    Unit, UnitId, UnitRole,
};
use combat_runtime::{
    CombatLog, Event, IdleProvider, MeleeProvider, OracleManager, Runtime, RuntimeError, Topic,
    WorldEvent,
};

const HERO: UnitId = UnitId(1);
const DUMMY: UnitId = UnitId(2);
const FIREBALL: SpellId = SpellId(133);

fn catalog() -> SpellCatalog {
    SpellCatalog::new().with(
        SpellInfo::new(FIREBALL, "Fireball")
            .with_school(SchoolMask::FIRE)
            .with_dmg_class(DamageClass::Magic)
            .with_cast_time(2_500)
            .with_effect(SpellEffectInfo::new(SpellEffectKind::SchoolDamage, 500)),
    )
}

/// Rolls 9999 on every table: no misses, no avoidance, no crits.
fn oracles() -> OracleManager {
    OracleManager::new(catalog(), spell_scripts(), CombatConfig::default())
        .with_rng(ScriptedRng::constant(9999))
}

fn hero() -> Unit {
    Unit::new(HERO, UnitRole::Player, 60)
        .with_faction(1)
        .with_health(5_000, 5_000)
        .with_position(Position::new(0.0, 0.0, 0.0, 0.0))
        .with_weapon(WeaponAttackType::Base, WeaponProfile::new(100.0, 100.0, 2000))
}

fn dummy() -> Unit {
    Unit::new(DUMMY, UnitRole::Creature, 60)
        .with_faction(2)
        .with_health(10_000, 10_000)
        .with_armor(0)
        .with_position(Position::new(2.0, 0.0, 0.0, PI))
}

async fn runtime() -> Runtime {
    combat_runtime::init_tracing();
    Runtime::builder()
        .oracles(oracles())
        .world_seed(7)
        .unit(hero())
        .unit(dummy())
        .build()
        .await
        .expect("runtime builds")
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn combat_events(events: &[Event]) -> Vec<&CombatEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Combat(record) => Some(&record.event),
            Event::World(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn hard_cast_lands_after_the_clock_advances() {
    let runtime = runtime().await;
    let handle = runtime.handle();
    let mut spells = handle.subscribe(Topic::Spell);
    let mut combat = handle.subscribe(Topic::Combat);
    let mut world = handle.subscribe(Topic::World);

    handle
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY))
        .await
        .unwrap();
    let started = drain(&mut spells);
    assert!(combat_events(&started).iter().any(|event| matches!(
        event,
        CombatEvent::SpellStart { spell, cast_time_ms: 2_500, .. } if *spell == FIREBALL
    )));
    assert_eq!(handle.require_unit(DUMMY).await.unwrap().health(), 10_000);

    let clock = handle.advance(2_500).await.unwrap();
    assert_eq!(clock, GameTime(2_500));
    assert_eq!(handle.clock().await.unwrap(), GameTime(2_500));
    assert_eq!(handle.require_unit(DUMMY).await.unwrap().health(), 9_500);

    assert!(combat_events(&drain(&mut spells))
        .iter()
        .any(|event| matches!(event, CombatEvent::SpellGo { spell, .. } if *spell == FIREBALL)));
    let damage = drain(&mut combat);
    let record = damage
        .iter()
        .find_map(|event| match event {
            Event::Combat(record)
                if matches!(record.event, CombatEvent::SpellDamageLog { .. }) =>
            {
                Some(record)
            }
            _ => None,
        })
        .expect("damage log published");
    assert_eq!(record.clock, GameTime(2_500));
    assert!(matches!(record.event, CombatEvent::SpellDamageLog { damage: 500, .. }));

    assert!(drain(&mut world)
        .iter()
        .any(|event| matches!(event, Event::World(WorldEvent::Tick { diff_ms: 2_500, .. }))));

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn interrupted_cast_never_lands() {
    let runtime = runtime().await;
    let handle = runtime.handle();
    let mut spells = handle.subscribe(Topic::Spell);

    handle
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY))
        .await
        .unwrap();
    handle.advance(1_000).await.unwrap();
    handle
        .interrupt_cast(HERO, CurrentSpellType::Generic)
        .await
        .unwrap();
    handle.advance(2_000).await.unwrap();

    assert_eq!(handle.require_unit(DUMMY).await.unwrap().health(), 10_000);
    let events = drain(&mut spells);
    assert!(combat_events(&events).iter().any(|event| matches!(
        event,
        CombatEvent::SpellInterrupted { spell, .. } if *spell == FIREBALL
    )));

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn engine_rejections_surface_as_errors() {
    let runtime = runtime().await;
    let handle = runtime.handle();

    let err = handle.attack_start(UnitId(99), DUMMY).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Engine(EngineError::UnknownUnit(UnitId(99)))));

    let err = handle
        .cast_spell(HERO, SpellId(4242), SpellTargets::unit(DUMMY))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Engine(_)));

    let err = handle.spawn(hero()).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Engine(EngineError::DuplicateUnit(HERO))));

    assert_eq!(runtime.metrics().rejected(), 2);
    assert!(matches!(handle.require_unit(UnitId(99)).await, Err(RuntimeError::UnknownUnit(_))));

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn spawn_and_despawn_are_published() {
    let runtime = runtime().await;
    let handle = runtime.handle();
    let mut world = handle.subscribe(Topic::World);

    let adds = Unit::new(UnitId(3), UnitRole::Creature, 58).with_health(3_000, 3_000);
    assert_eq!(handle.spawn(adds).await.unwrap(), UnitId(3));
    let removed = handle.despawn(UnitId(3)).await.unwrap();
    assert_eq!(removed.level, 58);
    assert!(handle.query_unit(UnitId(3)).await.unwrap().is_none());

    let events = drain(&mut world);
    assert!(matches!(
        events.as_slice(),
        [
            Event::World(WorldEvent::UnitSpawned { unit: UnitId(3), .. }),
            Event::World(WorldEvent::UnitDespawned { unit: UnitId(3), .. }),
        ]
    ));

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn providers_drive_units_each_step() {
    let mut runtime = Runtime::builder()
        .oracles(oracles())
        .world_seed(7)
        .unit(hero())
        .unit(dummy())
        .provider(HERO, MeleeProvider::new(DUMMY))
        .provider(DUMMY, IdleProvider)
        .build()
        .await
        .unwrap();
    let mut combat = runtime.subscribe(Topic::Combat);

    let clock = runtime.run_for(3, 100).await.unwrap();
    assert_eq!(clock, GameTime(300));

    let handle = runtime.handle();
    let hero = handle.require_unit(HERO).await.unwrap();
    assert_eq!(hero.victim, Some(DUMMY));
    assert!(handle.require_unit(DUMMY).await.unwrap().health() < 10_000);

    let events = drain(&mut combat);
    let starts = combat_events(&events)
        .into_iter()
        .filter(|event| matches!(event, CombatEvent::AttackStart { .. }))
        .count();
    assert_eq!(starts, 1);
    assert_eq!(runtime.metrics().commands(), 1);
    assert_eq!(runtime.metrics().ticks(), 3);

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn timed_ticks_advance_the_clock() {
    let runtime = Runtime::builder()
        .oracles(oracles())
        .world_seed(7)
        .unit(hero())
        .unit(dummy())
        .tick_interval_ms(100)
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();
    let mut world = handle.subscribe(Topic::World);

    let first = world.recv().await.unwrap();
    assert!(matches!(first, Event::World(WorldEvent::Tick { diff_ms: 100, .. })));
    let second = world.recv().await.unwrap();
    assert!(matches!(second, Event::World(WorldEvent::Tick { diff_ms: 100, .. })));
    assert!(handle.clock().await.unwrap() >= GameTime(200));

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn combat_log_records_the_fight() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("combat.jsonl");
    let runtime = Runtime::builder()
        .oracles(oracles())
        .world_seed(7)
        .unit(hero())
        .unit(dummy())
        .combat_log(&path)
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    handle
        .cast_spell(HERO, FIREBALL, SpellTargets::unit(DUMMY))
        .await
        .unwrap();
    handle.advance(2_500).await.unwrap();
    drop(handle);
    runtime.shutdown().await.unwrap();

    let events = CombatLog::read_all(&path).unwrap();
    let spawned = events
        .iter()
        .filter(|event| matches!(event, Event::World(WorldEvent::UnitSpawned { .. })))
        .count();
    assert_eq!(spawned, 2);
    assert!(combat_events(&events)
        .iter()
        .any(|event| matches!(event, CombatEvent::SpellDamageLog { damage: 500, .. })));
    assert!(matches!(events.last(), Some(Event::World(WorldEvent::Tick { .. }))));
}

#[tokio::test]
async fn build_without_oracles_fails() {
    let err = Runtime::builder().build().await.err().expect("no oracles");
    assert!(matches!(err, RuntimeError::MissingOracles));
}

#[tokio::test]
async fn builds_from_a_content_directory() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("spells.ron"),
        r#"(spells: [(id: (133), name: "Fireball", effects: [(kind: SchoolDamage, base_points: 500)])])"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("units.ron"),
        "[(id: (1), level: 60, health: 5000), (id: (2), level: 60, health: 8000)]",
    )
    .unwrap();

    let runtime = Runtime::builder()
        .content(combat_content::ContentFactory::new(dir.path()))
        .rng(ScriptedRng::constant(9999))
        .world_seed(1)
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    let world = handle.query_world().await.unwrap();
    assert_eq!(world.unit_ids(), vec![UnitId(1), UnitId(2)]);
    assert_eq!(world.seed, 1);
    assert_eq!(handle.require_unit(UnitId(2)).await.unwrap().max_health(), 8_000);

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn missing_content_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = Runtime::builder()
        .content(combat_content::ContentFactory::new(dir.path()))
        .build()
        .await
        .err()
        .expect("no spells.ron");
    assert!(matches!(err, RuntimeError::Content(message) if message.contains("spells.ron")));
}

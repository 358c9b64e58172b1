//! Combat participants.
//!
//! A [`Unit`] carries everything the engine mutates for one participant.
//! Subtype behavior is expressed through the [`UnitRole`] tag and the
//! capability queries on `Unit`; formulas branch on capabilities, not roles.

use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;
use strum::{Display, EnumIter};

use super::deferred::DeferredQueue;
use super::ids::{AuraId, CastId, GameTime, SpellId, UnitId};
use crate::aura::{AuraApplication, AuraState, EffectStore};
use crate::combat::ThreatList;
use crate::spell::{CurrentSpellType, SchoolMask, SpellHistory};

/// Closed set of unit kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitRole {
    Player,
    #[default]
    Creature,
    Pet,
    Guardian,
    Totem,
    Vehicle,
}

bitflags! {
    /// Transient condition flags of a unit.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct UnitState: u32 {
        const DIED = 0x0001;
        const MELEE_ATTACKING = 0x0002;
        const CASTING = 0x0004;
        const STUNNED = 0x0008;
        const ROOT = 0x0010;
        const FLEEING = 0x0020;
        const SILENCED = 0x0040;
        const EVADE = 0x0080;
        const SITTING = 0x0100;

        /// States in which the unit does not control itself.
        const CONTROLLED = Self::STUNNED.bits() | Self::FLEEING.bits();
    }
}

/// Resource pool kind. A unit has exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PowerType {
    #[default]
    Mana = 0,
    /// Stored in tenths: 1000 is a full bar of 100 rage.
    Rage = 1,
    Focus = 2,
    Energy = 3,
    RunicPower = 6,
}

impl PowerType {
    /// Power type selected by an energize effect's misc value.
    pub const fn from_misc(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Mana),
            1 => Some(Self::Rage),
            2 => Some(Self::Focus),
            3 => Some(Self::Energy),
            6 => Some(Self::RunicPower),
            _ => None,
        }
    }
}

/// Attack kinds with their own timer and weapon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WeaponAttackType {
    Base = 0,
    Off = 1,
    Ranged = 2,
}

impl WeaponAttackType {
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// World position and facing.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Facing in radians.
    pub orientation: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32, z: f32, orientation: f32) -> Self {
        Self { x, y, z, orientation }
    }

    pub fn distance(&self, other: &Position) -> f32 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// True if `other` lies within the `arc` (radians) centered on our facing.
    pub fn has_in_arc(&self, arc: f32, other: &Position) -> bool {
        if self.x == other.x && self.y == other.y {
            return true;
        }
        let angle = (other.y - self.y).atan2(other.x - self.x);
        let mut delta = angle - self.orientation;
        while delta > core::f32::consts::PI {
            delta -= core::f32::consts::TAU;
        }
        while delta < -core::f32::consts::PI {
            delta += core::f32::consts::TAU;
        }
        delta.abs() <= arc / 2.0
    }
}

/// Damage profile of one equipped weapon.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WeaponProfile {
    pub min_damage: f32,
    pub max_damage: f32,
    /// Swing time before haste.
    pub attack_time_ms: u32,
    pub school: SchoolMask,
}

impl WeaponProfile {
    pub const fn new(min_damage: f32, max_damage: f32, attack_time_ms: u32) -> Self {
        Self {
            min_damage,
            max_damage,
            attack_time_ms,
            school: SchoolMask::NORMAL,
        }
    }

    pub const fn none() -> Self {
        Self::new(0.0, 0.0, 0)
    }

    pub fn is_present(&self) -> bool {
        self.attack_time_ms > 0 && self.max_damage > 0.0
    }
}

impl Default for WeaponProfile {
    fn default() -> Self {
        Self::none()
    }
}

/// Avoidance and critical chances, per 10000.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AvoidanceProfile {
    pub dodge: i32,
    pub parry: i32,
    pub block: i32,
    pub crit: i32,
    pub spell_crit: i32,
    pub can_dodge: bool,
    pub can_parry: bool,
    pub can_block: bool,
    /// Rating-derived reduction of incoming critical chance.
    pub crit_resilience: i32,
}

impl AvoidanceProfile {
    pub const fn new() -> Self {
        Self {
            dodge: 0,
            parry: 0,
            block: 0,
            crit: 0,
            spell_crit: 0,
            can_dodge: true,
            can_parry: true,
            can_block: false,
            crit_resilience: 0,
        }
    }
}

/// Base values and the values recomputed from auras.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitStats {
    pub base_max_health: u32,
    pub base_armor: i32,
    pub base_resistances: [i32; SchoolMask::COUNT],
    pub base_attack_power: i32,
    pub spell_power: i32,
    pub weapon_skill_bonus: i32,
    pub defense_skill_bonus: i32,
    pub expertise: i32,

    // recomputed
    pub armor: i32,
    pub resistances: [i32; SchoolMask::COUNT],
    pub attack_power: i32,
    /// Melee haste in percent.
    pub melee_haste_pct: i32,
}

impl UnitStats {
    /// Resistance of the weakest school in the mask.
    pub fn resistance(&self, schools: SchoolMask) -> i32 {
        schools
            .school_indices()
            .map(|i| if i == 0 { self.armor } else { self.resistances[i] })
            .min()
            .unwrap_or(0)
    }
}

/// Achievement-style counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitStatistics {
    pub damage_done: u64,
    pub damage_taken: u64,
    /// Actual health restored to targets.
    pub healing_done: u64,
    pub healing_received: u64,
    /// Largest nominal heal cast, before overheal.
    pub highest_heal_cast: u32,
    pub highest_heal_received: u32,
    pub highest_hit_dealt: u32,
    pub highest_hit_received: u32,
    pub kills: u32,
    pub deaths: u32,
}

/// A combat participant.
#[derive(Clone, Debug)]
pub struct Unit {
    pub id: UnitId,
    pub role: UnitRole,
    /// Pets, guardians and charmed units of a player.
    pub controlled_by_player: bool,
    pub owner: Option<UnitId>,
    pub level: u8,
    pub faction: u32,
    pub position: Position,
    pub state: UnitState,

    health: u32,
    max_health: u32,
    pub power_type: PowerType,
    power: i32,
    max_power: i32,

    pub stats: UnitStats,
    pub avoidance: AvoidanceProfile,
    pub weapons: [WeaponProfile; WeaponAttackType::COUNT],
    /// Remaining time until each attack is ready.
    pub attack_timers: [i64; WeaponAttackType::COUNT],

    // casts
    pub current_casts: [Option<CastId>; 4],
    pub cooldowns: SpellHistory,

    // auras
    pub owned_auras: BTreeMap<SpellId, Vec<AuraId>>,
    pub applied_auras: BTreeMap<AuraId, AuraApplication>,
    pub effects: EffectStore,
    /// Applications carrying aura interrupt flags.
    pub interruptible_auras: Vec<AuraId>,
    /// Health-derived aura states.
    pub aura_state_mask: u32,
    /// Applications granting each aura state.
    pub aura_state_auras: BTreeMap<AuraState, Vec<AuraId>>,
    /// Owned auras removed this tick, released by the update sweep.
    pub removed_auras: Vec<AuraId>,
    /// Bumped on every owned-aura removal.
    pub removed_auras_count: u64,
    /// Single-target auras this unit has cast on others.
    pub single_cast_auras: Vec<AuraId>,
    pub visible_slots: BTreeSet<u8>,

    // combat
    pub in_combat: bool,
    pub combat_timer_ms: i64,
    pub attackers: BTreeSet<UnitId>,
    pub victim: Option<UnitId>,
    pub threat: ThreatList,
    /// Units whose threat list contains this unit.
    pub hostile_refs: BTreeSet<UnitId>,
    pub extra_attacks: u32,
    pub executing_extra_attacks: bool,
    /// Nonzero while procs are suppressed for this unit.
    pub proc_depth: u32,

    pub deferred: DeferredQueue,
    pub statistics: UnitStatistics,
    pub last_update: GameTime,
}

impl Unit {
    pub const MAX_RAGE: i32 = 1000;

    pub fn new(id: UnitId, role: UnitRole, level: u8) -> Self {
        let mut unit = Self {
            id,
            role,
            controlled_by_player: matches!(role, UnitRole::Player),
            owner: None,
            level,
            faction: 0,
            position: Position::default(),
            state: UnitState::empty(),
            health: 100,
            max_health: 100,
            power_type: PowerType::Mana,
            power: 0,
            max_power: 0,
            stats: UnitStats {
                base_max_health: 100,
                ..UnitStats::default()
            },
            avoidance: AvoidanceProfile::new(),
            weapons: [
                WeaponProfile::new(1.0, 2.0, 2000),
                WeaponProfile::none(),
                WeaponProfile::none(),
            ],
            attack_timers: [0; WeaponAttackType::COUNT],
            current_casts: [None; 4],
            cooldowns: SpellHistory::default(),
            owned_auras: BTreeMap::new(),
            applied_auras: BTreeMap::new(),
            effects: EffectStore::new(),
            interruptible_auras: Vec::new(),
            aura_state_mask: 0,
            aura_state_auras: BTreeMap::new(),
            removed_auras: Vec::new(),
            removed_auras_count: 0,
            single_cast_auras: Vec::new(),
            visible_slots: BTreeSet::new(),
            in_combat: false,
            combat_timer_ms: 0,
            attackers: BTreeSet::new(),
            victim: None,
            threat: ThreatList::default(),
            hostile_refs: BTreeSet::new(),
            extra_attacks: 0,
            executing_extra_attacks: false,
            proc_depth: 0,
            deferred: DeferredQueue::default(),
            statistics: UnitStatistics::default(),
            last_update: GameTime::ZERO,
        };
        unit.recompute_base_stats();
        unit
    }

    // ===== builders =====

    pub fn with_health(mut self, health: u32, max_health: u32) -> Self {
        self.stats.base_max_health = max_health;
        self.max_health = max_health;
        self.health = health.min(max_health);
        self
    }

    pub fn with_power(mut self, power_type: PowerType, power: i32, max_power: i32) -> Self {
        self.power_type = power_type;
        self.max_power = max_power.max(0);
        self.power = power.clamp(0, self.max_power);
        self
    }

    pub fn with_faction(mut self, faction: u32) -> Self {
        self.faction = faction;
        self
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_weapon(mut self, attack: WeaponAttackType, weapon: WeaponProfile) -> Self {
        self.weapons[attack.index()] = weapon;
        self
    }

    pub fn with_armor(mut self, armor: i32) -> Self {
        self.stats.base_armor = armor;
        self.stats.armor = armor;
        self
    }

    pub fn with_resistance(mut self, school: usize, value: i32) -> Self {
        if school < SchoolMask::COUNT {
            self.stats.base_resistances[school] = value;
            self.stats.resistances[school] = value;
        }
        self
    }

    pub fn with_attack_power(mut self, attack_power: i32) -> Self {
        self.stats.base_attack_power = attack_power;
        self.stats.attack_power = attack_power;
        self
    }

    pub fn with_spell_power(mut self, spell_power: i32) -> Self {
        self.stats.spell_power = spell_power;
        self
    }

    pub fn with_avoidance(mut self, avoidance: AvoidanceProfile) -> Self {
        self.avoidance = avoidance;
        self
    }

    pub fn with_owner(mut self, owner: UnitId, controlled_by_player: bool) -> Self {
        self.owner = Some(owner);
        self.controlled_by_player = controlled_by_player;
        self
    }

    fn recompute_base_stats(&mut self) {
        self.stats.armor = self.stats.base_armor;
        self.stats.resistances = self.stats.base_resistances;
        self.stats.attack_power = self.stats.base_attack_power;
    }

    // ===== capability queries =====

    pub fn is_player(&self) -> bool {
        self.role == UnitRole::Player
    }

    pub fn is_player_controlled(&self) -> bool {
        self.is_player() || self.controlled_by_player
    }

    pub fn is_pet_or_player(&self) -> bool {
        matches!(self.role, UnitRole::Player | UnitRole::Pet)
    }

    pub fn is_totem(&self) -> bool {
        self.role == UnitRole::Totem
    }

    /// Creatures not controlled by a player keep a threat list.
    pub fn can_have_threat_list(&self) -> bool {
        matches!(self.role, UnitRole::Creature | UnitRole::Vehicle) && !self.controlled_by_player
    }

    pub fn is_alive(&self) -> bool {
        !self.state.contains(UnitState::DIED)
    }

    pub fn has_state(&self, state: UnitState) -> bool {
        self.state.intersects(state)
    }

    pub fn is_controlled(&self) -> bool {
        self.state.intersects(UnitState::CONTROLLED)
    }

    pub fn is_evading(&self) -> bool {
        self.state.contains(UnitState::EVADE)
    }

    pub fn is_hostile_to(&self, other: &Unit) -> bool {
        self.faction != other.faction
    }

    pub fn is_friendly_to(&self, other: &Unit) -> bool {
        !self.is_hostile_to(other)
    }

    pub fn distance_to(&self, other: &Unit) -> f32 {
        self.position.distance(&other.position)
    }

    pub fn is_in_front(&self, other: &Unit) -> bool {
        self.position.has_in_arc(core::f32::consts::PI, &other.position)
    }

    /// Highest weapon or defense skill at this level.
    pub fn max_skill(&self) -> i32 {
        i32::from(self.level) * 5
    }

    pub fn weapon_skill(&self) -> i32 {
        self.max_skill() + self.stats.weapon_skill_bonus
    }

    pub fn defense_skill(&self) -> i32 {
        self.max_skill() + self.stats.defense_skill_bonus
    }

    // ===== health =====

    pub fn health(&self) -> u32 {
        self.health
    }

    pub fn max_health(&self) -> u32 {
        self.max_health
    }

    pub fn health_pct(&self) -> f32 {
        if self.max_health == 0 {
            0.0
        } else {
            self.health as f32 * 100.0 / self.max_health as f32
        }
    }

    pub fn is_full_health(&self) -> bool {
        self.health >= self.max_health
    }

    /// Adds `delta` to health, saturating in `0..=max_health`. Returns the
    /// change actually applied.
    pub fn modify_health(&mut self, delta: i64) -> i64 {
        let current = i64::from(self.health);
        let target = current.saturating_add(delta).clamp(0, i64::from(self.max_health));
        self.health = target as u32;
        target - current
    }

    pub fn set_health(&mut self, health: u32) {
        self.health = health.min(self.max_health);
    }

    /// Changes the maximum, clamping current health into the new range.
    pub fn set_max_health(&mut self, max_health: u32) {
        self.max_health = max_health;
        self.health = self.health.min(max_health);
    }

    // ===== power =====

    pub fn power(&self, power_type: PowerType) -> i32 {
        if power_type == self.power_type { self.power } else { 0 }
    }

    pub fn max_power(&self, power_type: PowerType) -> i32 {
        if power_type == self.power_type { self.max_power } else { 0 }
    }

    /// Adds to the pool if it is of `power_type`; returns the applied change.
    pub fn modify_power(&mut self, power_type: PowerType, delta: i32) -> i32 {
        if power_type != self.power_type {
            return 0;
        }
        let before = self.power;
        self.power = self.power.saturating_add(delta).clamp(0, self.max_power);
        self.power - before
    }

    // ===== aura bookkeeping =====

    pub fn owned_aura_ids(&self) -> impl Iterator<Item = AuraId> + '_ {
        self.owned_auras.values().flatten().copied()
    }

    pub fn owned_aura_count(&self) -> usize {
        self.owned_auras.values().map(Vec::len).sum()
    }

    pub(crate) fn insert_owned_aura(&mut self, spell: SpellId, aura: AuraId) {
        self.owned_auras.entry(spell).or_default().push(aura);
    }

    /// Drops an owned aura from the collection. Returns true if it was present.
    pub(crate) fn take_owned_aura(&mut self, spell: SpellId, aura: AuraId) -> bool {
        let Some(list) = self.owned_auras.get_mut(&spell) else {
            return false;
        };
        let before = list.len();
        list.retain(|id| *id != aura);
        let removed = list.len() != before;
        if list.is_empty() {
            self.owned_auras.remove(&spell);
        }
        removed
    }

    pub fn application(&self, aura: AuraId) -> Option<&AuraApplication> {
        self.applied_auras.get(&aura)
    }

    pub fn has_aura(&self, spell: SpellId) -> bool {
        self.applied_auras.values().any(|app| app.spell == spell)
    }

    pub fn applications_of(&self, spell: SpellId) -> impl Iterator<Item = &AuraApplication> {
        self.applied_auras.values().filter(move |app| app.spell == spell)
    }

    pub fn has_aura_state(&self, state: AuraState) -> bool {
        self.aura_state_mask & state.bit() != 0
            || self
                .aura_state_auras
                .get(&state)
                .is_some_and(|list| !list.is_empty())
    }

    // ===== casts =====

    pub fn current_cast(&self, slot: CurrentSpellType) -> Option<CastId> {
        self.current_casts[slot.index()]
    }

    pub fn can_proc(&self) -> bool {
        self.proc_depth == 0
    }

    /// No casts, no auras, no attackers: the unit may be destroyed.
    pub fn is_quiescent(&self) -> bool {
        self.current_casts.iter().all(Option::is_none)
            && self.owned_auras.is_empty()
            && self.applied_auras.is_empty()
            && self.attackers.is_empty()
    }
}

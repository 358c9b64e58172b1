//! Unit template loader.
//!
//! Templates describe the starting state of a unit: level, pools, armor,
//! resistances, weapons and placement. Everything aura-derived is computed
//! by the engine on spawn.

use std::collections::BTreeSet;
use std::path::Path;

use combat_core::state::{AvoidanceProfile, PowerType, WeaponAttackType, WeaponProfile};
use combat_core::{Position, SchoolMask, Unit, UnitId, UnitRole};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::loaders::{LoadResult, read_file};

/// Starting state of one unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitTemplate {
    pub id: UnitId,
    pub name: String,
    pub role: UnitRole,
    pub level: u8,
    pub faction: u32,
    /// Maximum health; units spawn at full health.
    pub health: u32,
    pub power_type: PowerType,
    /// Mana, energy and focus spawn full; rage and runic power spawn empty.
    pub max_power: i32,
    pub armor: i32,
    pub resistances: Vec<(SchoolMask, i32)>,
    pub attack_power: i32,
    pub spell_power: i32,
    pub main_hand: Option<WeaponProfile>,
    pub off_hand: Option<WeaponProfile>,
    pub ranged: Option<WeaponProfile>,
    pub avoidance: Option<AvoidanceProfile>,
    pub position: Position,
}

impl UnitTemplate {
    /// Builds the unit this template describes.
    pub fn to_unit(&self) -> Unit {
        let starting_power = match self.power_type {
            PowerType::Rage | PowerType::RunicPower => 0,
            _ => self.max_power,
        };
        let mut unit = Unit::new(self.id, self.role, self.level)
            .with_faction(self.faction)
            .with_health(self.health, self.health)
            .with_power(self.power_type, starting_power, self.max_power)
            .with_armor(self.armor)
            .with_attack_power(self.attack_power)
            .with_spell_power(self.spell_power)
            .with_position(self.position);
        for (schools, value) in &self.resistances {
            for school in schools.school_indices() {
                unit = unit.with_resistance(school, *value);
            }
        }
        for (attack_type, weapon) in [
            (WeaponAttackType::Base, self.main_hand),
            (WeaponAttackType::Off, self.off_hand),
            (WeaponAttackType::Ranged, self.ranged),
        ] {
            if let Some(weapon) = weapon {
                unit = unit.with_weapon(attack_type, weapon);
            }
        }
        if let Some(avoidance) = self.avoidance {
            unit = unit.with_avoidance(avoidance);
        }
        unit
    }
}

/// Loader for unit templates from RON files.
pub struct UnitLoader;

impl UnitLoader {
    /// Load unit templates from a RON file.
    ///
    /// RON format: `Vec<UnitTemplate>`
    pub fn load(path: &Path) -> LoadResult<Vec<UnitTemplate>> {
        let content = read_file(path)?;
        let templates = Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Invalid unit templates {}: {}", path.display(), e))?;
        debug!(path = %path.display(), units = templates.len(), "unit templates loaded");

        Ok(templates)
    }

    /// Parse unit templates from RON text.
    pub fn parse(content: &str) -> LoadResult<Vec<UnitTemplate>> {
        let templates: Vec<UnitTemplate> = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse unit templates RON: {}", e))?;

        let mut ids = BTreeSet::new();
        for template in &templates {
            if !ids.insert(template.id) {
                return Err(ConfigError::DuplicateUnit(template.id).into());
            }
            if template.health == 0 {
                return Err(ConfigError::EmptyHealth(template.id).into());
            }
        }

        Ok(templates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNITS: &str = r#"
        [
            (
                id: (1),
                name: "Warrior",
                role: Player,
                level: 60,
                faction: 1,
                health: 4200,
                power_type: Rage,
                max_power: 1000,
                armor: 3200,
                main_hand: Some((min_damage: 120.0, max_damage: 180.0, attack_time_ms: 3600, school: "NORMAL")),
            ),
            (
                id: (2),
                name: "Ragnaros",
                level: 63,
                faction: 2,
                health: 1000000,
                resistances: [("FIRE", 300), ("FROST | NATURE", 50)],
                position: (x: 3.0, y: 0.0, z: 0.0, orientation: 3.14),
            ),
        ]
    "#;

    #[test]
    fn parses_templates_with_defaults() {
        let templates = UnitLoader::parse(UNITS).unwrap();
        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].role, UnitRole::Player);
        assert_eq!(templates[1].role, UnitRole::Creature);
        assert_eq!(templates[1].max_power, 0);
        assert!(templates[1].main_hand.is_none());
    }

    #[test]
    fn builds_units_from_templates() {
        let templates = UnitLoader::parse(UNITS).unwrap();

        let warrior = templates[0].to_unit();
        assert_eq!(warrior.id, UnitId(1));
        assert_eq!(warrior.health(), 4_200);
        assert_eq!(warrior.power(PowerType::Rage), 0);
        assert_eq!(warrior.stats.base_armor, 3_200);
        assert_eq!(warrior.weapons[WeaponAttackType::Base.index()].attack_time_ms, 3_600);

        let boss = templates[1].to_unit();
        assert_eq!(boss.level, 63);
        assert_eq!(boss.stats.base_resistances[2], 300);
        assert_eq!(boss.stats.base_resistances[3], 50);
        assert_eq!(boss.stats.base_resistances[4], 50);
        assert_eq!(boss.stats.base_resistances[5], 0);
    }

    #[test]
    fn rejects_templates_without_health() {
        let err = UnitLoader::parse("[(id: (4), level: 10)]").unwrap_err();
        assert!(err.to_string().contains("has no health"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let err = UnitLoader::parse("[(id: (4), health: 10), (id: (4), health: 20)]").unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }
}

//! Spell catalog loader.

use std::path::Path;

use combat_core::{SpellCatalog, SpellInfo};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loaders::{LoadResult, read_file};
use crate::validate::validate_spells;

/// Spell catalog structure for RON files.
///
/// Every `SpellInfo` field has a default, so entries only list what they
/// use:
///
/// ```ron
/// (
///     spells: [
///         (
///             id: (133),
///             name: "Fireball",
///             school: "FIRE",
///             dmg_class: Magic,
///             cast_time_ms: 2500,
///             effects: [(kind: SchoolDamage, base_points: 500)],
///         ),
///     ],
/// )
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpellCatalogFile {
    pub spells: Vec<SpellInfo>,
}

/// Loader for the spell catalog from RON files.
pub struct SpellLoader;

impl SpellLoader {
    /// Load and validate a spell catalog from a RON file.
    pub fn load(path: &Path) -> LoadResult<SpellCatalog> {
        let content = read_file(path)?;
        let catalog = Self::parse(&content)
            .map_err(|e| anyhow::anyhow!("Invalid spell catalog {}: {}", path.display(), e))?;
        debug!(path = %path.display(), spells = catalog.len(), "spell catalog loaded");

        Ok(catalog)
    }

    /// Parse and validate a spell catalog from RON text.
    pub fn parse(content: &str) -> LoadResult<SpellCatalog> {
        let file: SpellCatalogFile = ron::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse spell catalog RON: {}", e))?;
        validate_spells(&file.spells)?;

        Ok(file.spells.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use combat_core::spell::DamageClass;
    use combat_core::{AuraType, SchoolMask, SpellEffectKind, SpellId, SpellOracle};

    use super::*;

    const CATALOG: &str = r#"
        (
            spells: [
                (
                    id: (133),
                    name: "Fireball",
                    school: "FIRE",
                    dmg_class: Magic,
                    cast_time_ms: 2500,
                    effects: [(kind: SchoolDamage, base_points: 500)],
                ),
                (
                    id: (589),
                    name: "Shadow Word: Pain",
                    school: "SHADOW",
                    dmg_class: Magic,
                    duration_ms: Some(18000),
                    effects: [
                        (kind: ApplyAura, aura: Some(PeriodicDamage), base_points: 30, amplitude_ms: 3000),
                    ],
                ),
            ],
        )
    "#;

    #[test]
    fn parses_sparse_entries() {
        let catalog = SpellLoader::parse(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let fireball = catalog.spell(SpellId(133)).unwrap();
        assert_eq!(fireball.name, "Fireball");
        assert_eq!(fireball.school, SchoolMask::FIRE);
        assert_eq!(fireball.dmg_class, DamageClass::Magic);
        assert_eq!(fireball.cast_time_ms, 2_500);
        assert_eq!(fireball.effects.len(), 1);
        assert_eq!(fireball.effects[0].kind, SpellEffectKind::SchoolDamage);

        let pain = catalog.spell(SpellId(589)).unwrap();
        assert_eq!(pain.duration_ms, Some(18_000));
        assert_eq!(pain.effects[0].aura, Some(AuraType::PeriodicDamage));
        assert_eq!(pain.effects[0].amplitude_ms, 3_000);
    }

    #[test]
    fn rejects_more_effects_than_a_spell_holds() {
        let content = r#"
            (
                spells: [
                    (
                        id: (1),
                        effects: [(kind: Dummy), (kind: Dummy), (kind: Dummy), (kind: Dummy)],
                    ),
                ],
            )
        "#;
        assert!(SpellLoader::parse(content).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let content = "(spells: [(id: (7)), (id: (7))])";
        let err = SpellLoader::parse(content).unwrap_err();
        assert!(err.to_string().contains("defined more than once"));
    }

    #[test]
    fn load_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spells.ron");
        std::fs::write(
            &path,
            "(spells: [(id: (7), effects: [(kind: TriggerSpell, trigger_spell: Some((8)))])])",
        )
        .unwrap();

        let err = SpellLoader::load(&path).unwrap_err();
        assert!(err.to_string().contains("spells.ron"));
    }
}

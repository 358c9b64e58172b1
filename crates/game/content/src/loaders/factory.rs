//! Content factory for building the engine environment from data files.

use std::path::{Path, PathBuf};

use combat_core::{CombatConfig, SpellCatalog, SpellScriptRegistry};

use crate::loaders::{ConfigLoader, LoadResult, SpellLoader, UnitLoader, UnitTemplate};
use crate::scripts::spell_scripts;

/// Content factory that loads all combat content from a data directory.
///
/// # Directory Structure
///
/// ```text
/// data_dir/
/// ├── combat.toml
/// ├── spells.ron
/// └── units.ron
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    /// Creates a new content factory pointing to a data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load engine configuration from `combat.toml`.
    ///
    /// A missing file is not an error: the engine runs on defaults.
    pub fn load_config(&self) -> LoadResult<CombatConfig> {
        let path = self.data_dir.join("combat.toml");
        if !path.exists() {
            tracing::info!(path = %path.display(), "no combat.toml, using default configuration");
            return Ok(CombatConfig::default());
        }
        ConfigLoader::load(&path)
    }

    /// Load the spell catalog from `spells.ron`.
    pub fn load_spells(&self) -> LoadResult<SpellCatalog> {
        let path = self.data_dir.join("spells.ron");
        SpellLoader::load(&path)
    }

    /// Load unit templates from `units.ron`.
    pub fn load_units(&self) -> LoadResult<Vec<UnitTemplate>> {
        let path = self.data_dir.join("units.ron");
        UnitLoader::load(&path)
    }

    /// The registered spell special cases. These live in code, not data.
    pub fn scripts(&self) -> SpellScriptRegistry {
        spell_scripts()
    }

    /// Returns the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

#[cfg(test)]
mod tests {
    use combat_core::{SpellId, SpellOracle};

    use super::*;

    #[test]
    fn test_factory_paths() {
        let factory = ContentFactory::new("/tmp/data");
        assert_eq!(factory.data_dir(), Path::new("/tmp/data"));
    }

    #[test]
    fn loads_a_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("combat.toml"), "combat_timeout_ms = 6000\n").unwrap();
        std::fs::write(
            dir.path().join("spells.ron"),
            r#"(spells: [(id: (133), name: "Fireball", effects: [(kind: SchoolDamage, base_points: 500)])])"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("units.ron"),
            "[(id: (1), level: 60, health: 5000)]",
        )
        .unwrap();

        let factory = ContentFactory::new(dir.path());
        assert_eq!(factory.load_config().unwrap().combat_timeout_ms, 6_000);
        assert!(factory.load_spells().unwrap().spell(SpellId(133)).is_some());
        assert_eq!(factory.load_units().unwrap().len(), 1);
        assert!(!factory.scripts().is_empty());
    }

    #[test]
    fn missing_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ContentFactory::new(dir.path());
        assert_eq!(factory.load_config().unwrap(), CombatConfig::default());
        assert!(factory.load_spells().is_err());
    }
}

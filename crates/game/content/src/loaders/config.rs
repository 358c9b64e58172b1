//! Engine configuration loader.

use std::path::Path;

use combat_core::CombatConfig;

use crate::loaders::{LoadResult, read_file};
use crate::validate::validate_config;

/// Loader for engine configuration from TOML files.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config data from a TOML file.
    ///
    /// Missing keys keep their defaults, so an empty file yields
    /// [`CombatConfig::default`].
    pub fn load(path: &Path) -> LoadResult<CombatConfig> {
        let content = read_file(path)?;
        Self::parse(&content)
    }

    /// Parse config data from TOML text.
    pub fn parse(content: &str) -> LoadResult<CombatConfig> {
        let config: CombatConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config TOML: {}", e))?;
        validate_config(&config)?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use combat_core::SpellId;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ConfigLoader::parse("").unwrap();
        assert_eq!(config, CombatConfig::default());
    }

    #[test]
    fn overrides_selected_keys() {
        let config = ConfigLoader::parse(
            r#"
            combat_timeout_ms = 8000
            melee_range = 6.5
            uninterruptible_by_others = [20252, 1680]
            default_ranged_spell = 5019
            "#,
        )
        .unwrap();

        assert_eq!(config.combat_timeout_ms, 8_000);
        assert_eq!(config.melee_range, 6.5);
        assert!(config.is_uninterruptible_by_others(SpellId(1680)));
        assert_eq!(config.default_ranged_spell, SpellId(5019));
        assert_eq!(config.block_percent, CombatConfig::default().block_percent);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = ConfigLoader::parse("durability_loss_on_damage = 1.5").unwrap_err();
        assert!(err.to_string().contains("durability_loss_on_damage"));
    }

    #[test]
    fn reports_parse_errors() {
        let err = ConfigLoader::parse("melee_range = \"far\"").unwrap_err();
        assert!(err.to_string().starts_with("Failed to parse config TOML"));
    }
}

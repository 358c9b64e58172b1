//! Data-driven combat content and the registered spell scripts.
//!
//! This crate houses everything the engine treats as external data:
//! - Spell catalog (data-driven via RON)
//! - Unit templates (data-driven via RON)
//! - Engine configuration (data-driven via TOML)
//! - Per-spell special cases, registered as engine script hooks
//!
//! Content is consumed through the engine's read-only environment and never
//! appears in world state.

pub mod error;
pub mod scripts;
pub mod validate;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use error::ConfigError;
pub use scripts::{register_spell_scripts, spell_scripts};
pub use validate::{validate_config, validate_spells};

#[cfg(feature = "loaders")]
pub use loaders::{
    ConfigLoader, ContentFactory, LoadResult, SpellCatalogFile, SpellLoader, UnitLoader,
    UnitTemplate,
};

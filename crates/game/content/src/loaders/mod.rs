//! Content loaders for reading combat data from files.
//!
//! Each loader turns one RON or TOML file into the engine type it describes
//! and runs the matching consistency checks from [`crate::validate`].

pub mod config;
pub mod factory;
pub mod spells;
pub mod units;

pub use config::ConfigLoader;
pub use factory::ContentFactory;
pub use spells::{SpellCatalogFile, SpellLoader};
pub use units::{UnitLoader, UnitTemplate};

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}

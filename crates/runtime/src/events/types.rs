//! Typed payloads carried by [`super::Event`].

use serde::{Deserialize, Serialize};

use combat_core::{CombatEvent, GameTime, UnitId};

/// A drained engine notification together with the clock it was drained at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRecord {
    pub clock: GameTime,
    pub event: CombatEvent,
}

/// Changes to the world itself rather than to a fight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WorldEvent {
    /// The world advanced by `diff_ms` and now reads `clock`.
    Tick { clock: GameTime, diff_ms: u64 },
    UnitSpawned { clock: GameTime, unit: UnitId },
    UnitDespawned { clock: GameTime, unit: UnitId },
}

impl WorldEvent {
    pub fn clock(&self) -> GameTime {
        match self {
            Self::Tick { clock, .. }
            | Self::UnitSpawned { clock, .. }
            | Self::UnitDespawned { clock, .. } => *clock,
        }
    }
}

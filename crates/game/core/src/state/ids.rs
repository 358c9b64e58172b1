//! Identifier newtypes and the world clock.

use core::fmt;
use core::ops::{Add, Sub};

/// Unique identifier for a unit in the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static spell identifier (key into the spell catalog).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpellId(pub u32);

impl fmt::Display for SpellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spell:{}", self.0)
    }
}

/// Identifier of an aura instance in the world's aura arena.
///
/// Ids are handed out in creation order, so ordering by id is ordering by
/// application time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AuraId(pub u64);

impl fmt::Display for AuraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "aura:{}", self.0)
    }
}

/// Identifier of an in-flight spell cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CastId(pub u64);

impl fmt::Display for CastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cast:{}", self.0)
    }
}

/// World clock in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameTime(pub u64);

impl GameTime {
    pub const ZERO: Self = Self(0);

    pub const fn millis(self) -> u64 {
        self.0
    }

    /// Milliseconds from `self` until `later`, zero if `later` is in the past.
    pub const fn until(self, later: GameTime) -> u64 {
        later.0.saturating_sub(self.0)
    }
}

impl Add<u64> for GameTime {
    type Output = GameTime;

    fn add(self, rhs: u64) -> Self::Output {
        GameTime(self.0.saturating_add(rhs))
    }
}

impl Sub<GameTime> for GameTime {
    type Output = u64;

    fn sub(self, rhs: GameTime) -> Self::Output {
        self.0.saturating_sub(rhs.0)
    }
}

impl fmt::Display for GameTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

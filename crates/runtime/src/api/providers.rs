//! Asynchronous abstraction for sourcing unit intent.
//!
//! Runtime users plug in [`CommandProvider`] implementations so units can be
//! driven by session input, scripted fixtures, or AI policies.
use async_trait::async_trait;
use combat_core::{Unit, UnitCommand, UnitId};

use super::errors::Result;

/// Trait for deciding what a unit does next.
///
/// Different implementations can handle:
/// - Player input (from a session)
/// - Creature AI decisions
/// - Scripted/replayed fights
/// - Testing fixtures
#[async_trait]
pub trait CommandProvider: Send + Sync {
    /// Provide the next command for `unit`, or `None` to leave it alone.
    ///
    /// # Arguments
    /// * `unit` - The unit being driven
    /// * `snapshot` - Read-only snapshot of that unit
    async fn provide_command(&self, unit: UnitId, snapshot: &Unit) -> Result<Option<UnitCommand>>;
}

/// A provider that never issues anything.
/// Useful for training dummies or as a fallback.
pub struct IdleProvider;

#[async_trait]
impl CommandProvider for IdleProvider {
    async fn provide_command(
        &self,
        _unit: UnitId,
        _snapshot: &Unit,
    ) -> Result<Option<UnitCommand>> {
        Ok(None)
    }
}

/// Keeps a unit auto-attacking one target while both are alive.
pub struct MeleeProvider {
    target: UnitId,
}

impl MeleeProvider {
    pub fn new(target: UnitId) -> Self {
        Self { target }
    }
}

#[async_trait]
impl CommandProvider for MeleeProvider {
    async fn provide_command(&self, _unit: UnitId, snapshot: &Unit) -> Result<Option<UnitCommand>> {
        if !snapshot.is_alive() || snapshot.victim == Some(self.target) {
            return Ok(None);
        }
        Ok(Some(UnitCommand::AttackStart {
            target: self.target,
        }))
    }
}

#[cfg(test)]
mod tests {
    use combat_core::UnitRole;

    use super::*;

    #[tokio::test]
    async fn melee_provider_only_starts_once() {
        let provider = MeleeProvider::new(UnitId(2));
        let mut unit = Unit::new(UnitId(1), UnitRole::Creature, 10).with_health(100, 100);

        let first = provider.provide_command(UnitId(1), &unit).await.unwrap();
        assert_eq!(first, Some(UnitCommand::AttackStart { target: UnitId(2) }));

        unit.victim = Some(UnitId(2));
        assert_eq!(provider.provide_command(UnitId(1), &unit).await.unwrap(), None);
    }

    #[tokio::test]
    async fn idle_provider_does_nothing() {
        let unit = Unit::new(UnitId(1), UnitRole::Player, 10);
        assert_eq!(IdleProvider.provide_command(UnitId(1), &unit).await.unwrap(), None);
    }
}

//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and offers async helpers for
//! commanding units, stepping the world clock or streaming events from
//! specific topics.
use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc, oneshot};

use combat_core::{
    CurrentSpellType, GameTime, SpellId, SpellTargets, Unit, UnitCommand, UnitId, WorldState,
};

use super::errors::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::workers::Command;

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl RuntimeHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.command_tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;

        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Apply one unit command.
    ///
    /// Engine rejections come back as [`RuntimeError::Engine`]; the matching
    /// failure notification has already been published by then.
    pub async fn command(&self, unit: UnitId, command: UnitCommand) -> Result<()> {
        self.request(|reply| Command::Issue {
            unit,
            command,
            reply,
        })
        .await?
    }

    pub async fn cast_spell(
        &self,
        caster: UnitId,
        spell: SpellId,
        targets: SpellTargets,
    ) -> Result<()> {
        self.command(caster, UnitCommand::CastSpell { spell, targets })
            .await
    }

    pub async fn attack_start(&self, attacker: UnitId, target: UnitId) -> Result<()> {
        self.command(attacker, UnitCommand::AttackStart { target }).await
    }

    pub async fn attack_stop(&self, attacker: UnitId) -> Result<()> {
        self.command(attacker, UnitCommand::AttackStop).await
    }

    pub async fn interrupt_cast(&self, caster: UnitId, slot: CurrentSpellType) -> Result<()> {
        self.command(caster, UnitCommand::InterruptCast { slot }).await
    }

    /// Add a unit to the world.
    pub async fn spawn(&self, unit: Unit) -> Result<UnitId> {
        self.request(|reply| Command::Spawn {
            unit: Box::new(unit),
            reply,
        })
        .await?
    }

    /// Remove a unit, returning its final state.
    pub async fn despawn(&self, unit: UnitId) -> Result<Unit> {
        let unit = self
            .request(|reply| Command::Despawn { unit, reply })
            .await??;
        Ok(*unit)
    }

    /// Advance the world clock by `diff_ms` and return the new clock.
    pub async fn advance(&self, diff_ms: u64) -> Result<GameTime> {
        self.request(|reply| Command::Advance { diff_ms, reply })
            .await
    }

    /// Query one unit (read-only snapshot)
    pub async fn query_unit(&self, unit: UnitId) -> Result<Option<Unit>> {
        self.request(|reply| Command::QueryUnit { unit, reply })
            .await
    }

    /// Like [`Self::query_unit`] but treats a missing unit as an error.
    pub async fn require_unit(&self, unit: UnitId) -> Result<Unit> {
        self.query_unit(unit)
            .await?
            .ok_or(RuntimeError::UnknownUnit(unit))
    }

    /// Query the whole world (read-only snapshot)
    pub async fn query_world(&self) -> Result<WorldState> {
        let world = self
            .request(|reply| Command::QueryWorld { reply })
            .await?;
        Ok(*world)
    }

    pub async fn clock(&self) -> Result<GameTime> {
        Ok(self.query_world().await?.clock)
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Combat` - Damage, healing, energize, attack state and deaths
    /// - `Topic::Aura` - Aura application, removal and stack changes
    /// - `Topic::Spell` - Cast lifecycle
    /// - `Topic::World` - Clock ticks and unit spawns
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use combat_runtime::Topic;
    ///
    /// let mut auras = handle.subscribe(Topic::Aura);
    /// while let Ok(event) = auras.recv().await {
    ///     // Handle aura events
    /// }
    /// ```
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    ///
    /// Returns a map of topic to receiver for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}

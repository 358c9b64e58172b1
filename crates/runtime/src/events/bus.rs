//! Topic-based event bus implementation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::types::{CombatRecord, WorldEvent};

/// Topics for event routing
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Damage, healing, energize, misses, attack state and deaths
    Combat,
    /// Aura application, removal and stack changes
    Aura,
    /// Cast start, go, failure and interruption
    Spell,
    /// Clock ticks and unit spawns
    World,
}

impl Topic {
    pub const ALL: [Topic; 4] = [Topic::Combat, Topic::Aura, Topic::Spell, Topic::World];
}

/// Event wrapper that carries the topic and typed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Combat(CombatRecord),
    World(WorldEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Combat(record) if record.event.is_aura_event() => Topic::Aura,
            Event::Combat(record) if record.event.is_cast_event() => Topic::Spell,
            Event::Combat(_) => Topic::Combat,
            Event::World(_) => Topic::World,
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about. Channels are created up front, one per topic, so
/// the map is never written after construction.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<HashMap<Topic, broadcast::Sender<Event>>>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let channels = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity.max(1)).0))
            .collect();

        Self {
            channels: Arc::new(channels),
        }
    }

    /// Publish an event to its corresponding topic
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        if let Some(tx) = self.channels.get(&topic)
            && tx.send(event).is_err()
        {
            // No subscribers for this topic - this is normal, not an error
            tracing::trace!("No subscribers for topic {:?}", topic);
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns a receiver that will only receive events for that topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        match self.channels.get(&topic) {
            Some(tx) => tx.subscribe(),
            // unreachable while every topic is registered in `with_capacity`
            None => broadcast::channel(1).1,
        }
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        topics
            .iter()
            .map(|&topic| (topic, self.subscribe(topic)))
            .collect()
    }

    /// Number of live receivers on `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.channels
            .get(&topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use combat_core::{AuraId, AuraRemoveMode, CastId, CombatEvent, GameTime, SpellId, UnitId};

    use super::*;

    fn record(event: CombatEvent) -> Event {
        Event::Combat(CombatRecord {
            clock: GameTime(10),
            event,
        })
    }

    #[test]
    fn routes_engine_events_by_kind() {
        let died = record(CombatEvent::UnitDied {
            unit: UnitId(2),
            killer: Some(UnitId(1)),
        });
        let removed = record(CombatEvent::AuraRemoved {
            target: UnitId(2),
            aura: AuraId(0),
            spell: SpellId(1),
            mode: AuraRemoveMode::Expire,
        });
        let interrupted = record(CombatEvent::SpellInterrupted {
            caster: UnitId(1),
            spell: SpellId(1),
            cast: CastId(3),
        });
        let tick = Event::World(WorldEvent::Tick {
            clock: GameTime(10),
            diff_ms: 10,
        });

        assert_eq!(died.topic(), Topic::Combat);
        assert_eq!(removed.topic(), Topic::Aura);
        assert_eq!(interrupted.topic(), Topic::Spell);
        assert_eq!(tick.topic(), Topic::World);
    }

    #[tokio::test]
    async fn subscribers_only_see_their_topic() {
        let bus = EventBus::with_capacity(8);
        let mut world = bus.subscribe(Topic::World);
        let mut combat = bus.subscribe(Topic::Combat);

        bus.publish(Event::World(WorldEvent::UnitSpawned {
            clock: GameTime::ZERO,
            unit: UnitId(7),
        }));

        assert!(matches!(
            world.recv().await.unwrap(),
            Event::World(WorldEvent::UnitSpawned { unit: UnitId(7), .. })
        ));
        assert!(combat.try_recv().is_err());
        assert_eq!(bus.subscriber_count(Topic::Combat), 1);
        assert_eq!(bus.subscriber_count(Topic::Aura), 0);
    }
}

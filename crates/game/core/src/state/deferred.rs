//! Per-unit queue of work scheduled for a later tick.

use std::collections::BTreeMap;

use super::ids::{CastId, GameTime};

/// Scheduled work item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DeferredEvent {
    /// A launched projectile lands. No-op if the cast was cancelled and
    /// released in the meantime.
    SpellHit { cast: CastId },
}

/// Events ordered by due time, then by scheduling order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeferredQueue {
    events: BTreeMap<(GameTime, u64), DeferredEvent>,
    next_seq: u64,
}

impl DeferredQueue {
    pub fn schedule(&mut self, at: GameTime, event: DeferredEvent) {
        self.events.insert((at, self.next_seq), event);
        self.next_seq += 1;
    }

    /// Removes and returns every event due at or before `now`.
    pub fn pop_due(&mut self, now: GameTime) -> Vec<DeferredEvent> {
        let later = self.events.split_off(&(GameTime(now.0.saturating_add(1)), 0));
        let due = core::mem::replace(&mut self.events, later);
        due.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pops_due_events_in_order() {
        let mut queue = DeferredQueue::default();
        queue.schedule(GameTime(300), DeferredEvent::SpellHit { cast: CastId(3) });
        queue.schedule(GameTime(100), DeferredEvent::SpellHit { cast: CastId(1) });
        queue.schedule(GameTime(100), DeferredEvent::SpellHit { cast: CastId(2) });

        let due = queue.pop_due(GameTime(100));
        assert_eq!(
            due,
            vec![
                DeferredEvent::SpellHit { cast: CastId(1) },
                DeferredEvent::SpellHit { cast: CastId(2) },
            ]
        );
        assert_eq!(queue.len(), 1);
    }
}

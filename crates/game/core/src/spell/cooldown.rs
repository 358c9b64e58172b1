//! Spell cooldown history.

use std::collections::BTreeMap;

use super::{SchoolMask, SpellInfo};
use crate::state::{GameTime, SpellId};

/// When each spell, category and school becomes usable again.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpellHistory {
    spells: BTreeMap<SpellId, GameTime>,
    categories: BTreeMap<u32, GameTime>,
    school_lockouts: [GameTime; SchoolMask::COUNT],
}

impl SpellHistory {
    /// True if neither the spell nor its category is cooling down.
    pub fn is_ready(&self, info: &SpellInfo, now: GameTime) -> bool {
        let spell_ready = self.spells.get(&info.id).is_none_or(|until| *until <= now);
        let category_ready = info.category == 0
            || self
                .categories
                .get(&info.category)
                .is_none_or(|until| *until <= now);
        spell_ready && category_ready
    }

    /// Starts the spell and category cooldowns defined by `info`.
    pub fn start_cooldown(&mut self, info: &SpellInfo, now: GameTime) {
        if info.recovery_ms > 0 {
            self.spells.insert(info.id, now + u64::from(info.recovery_ms));
        }
        if info.category != 0 && info.category_recovery_ms > 0 {
            self.categories
                .insert(info.category, now + u64::from(info.category_recovery_ms));
        }
    }

    pub fn remaining_ms(&self, spell: SpellId, now: GameTime) -> u64 {
        self.spells.get(&spell).map_or(0, |until| now.until(*until))
    }

    pub fn reset_cooldown(&mut self, spell: SpellId) {
        self.spells.remove(&spell);
    }

    /// Prevents casting spells of `schools` for `duration_ms`.
    pub fn lock_school(&mut self, schools: SchoolMask, duration_ms: u32, now: GameTime) {
        let until = now + u64::from(duration_ms);
        for index in schools.school_indices() {
            self.school_lockouts[index] = self.school_lockouts[index].max(until);
        }
    }

    pub fn is_school_locked(&self, schools: SchoolMask, now: GameTime) -> bool {
        schools
            .school_indices()
            .any(|index| self.school_lockouts[index] > now)
    }

    /// Drops entries that already expired.
    pub fn prune(&mut self, now: GameTime) {
        self.spells.retain(|_, until| *until > now);
        self.categories.retain(|_, until| *until > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_cooldown_blocks_siblings() {
        let mut history = SpellHistory::default();
        let a = SpellInfo {
            category: 4,
            category_recovery_ms: 1_000,
            ..SpellInfo::new(SpellId(1), "A")
        };
        let b = SpellInfo {
            category: 4,
            ..SpellInfo::new(SpellId(2), "B")
        };
        history.start_cooldown(&a, GameTime(0));
        assert!(!history.is_ready(&b, GameTime(999)));
        assert!(history.is_ready(&b, GameTime(1_000)));
    }

    #[test]
    fn school_lockout_matches_any_school() {
        let mut history = SpellHistory::default();
        history.lock_school(SchoolMask::FIRE, 4_000, GameTime(100));
        assert!(history.is_school_locked(SchoolMask::FIRE | SchoolMask::FROST, GameTime(200)));
        assert!(!history.is_school_locked(SchoolMask::FROST, GameTime(200)));
        assert!(!history.is_school_locked(SchoolMask::FIRE, GameTime(4_100)));
    }
}

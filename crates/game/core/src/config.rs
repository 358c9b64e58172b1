//! Engine-wide tunables.
//!
//! [`CombatConfig`] is built once at startup (usually from `combat.toml` via the
//! content crate) and handed to the engine by reference through
//! [`crate::env::CombatEnv`]. Nothing in the engine mutates it.

use crate::spell::SpellId;

/// Combat configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CombatConfig {
    /// Milliseconds a player-controlled unit stays in combat after the last
    /// hostile reference disappears.
    pub combat_timeout_ms: u32,

    /// The ranged auto-attack spell. Generic and channeled casts do not
    /// interrupt it, and it does not interrupt them.
    pub default_ranged_spell: SpellId,

    /// Spells that cannot be interrupted by another unit's interrupt call.
    /// Self-interrupts still apply.
    pub uninterruptible_by_others: Vec<SpellId>,

    /// Multiplier applied to every rage award.
    pub rage_income_rate: f32,

    /// Probability (0.0..=1.0) that a damage event rolls an equipment
    /// durability loss for the player involved.
    pub durability_loss_on_damage: f32,

    /// Interval between area aura target refreshes.
    pub area_aura_update_interval_ms: u32,

    /// Maximum distance for melee swings.
    pub melee_range: f32,

    /// Percentage of damage stopped by a block; doubled on a critical block.
    pub block_percent: u32,

    /// Chance (per 10000) that a block is critical.
    pub critical_block_chance: u32,

    /// Damage at or above this percentage of current health breaks fear.
    pub fear_break_health_pct: u32,

    /// Spell critical multiplier in percent (150 = x1.5).
    pub spell_crit_multiplier_pct: u32,

    /// Melee and ranged critical multiplier in percent (200 = x2).
    pub melee_crit_multiplier_pct: u32,

    /// Base miss chance (per 10000) before skill adjustments.
    pub base_miss_chance: u32,

    /// Extra miss chance (per 10000) for auto attacks while dual wielding.
    pub dual_wield_miss_penalty: u32,

    /// Base dodge/parry/block chance (per 10000) for units without explicit values.
    pub base_avoidance_chance: u32,

    /// Cast time pushback per damaging hit.
    pub pushback_ms: u32,

    /// Maximum pushbacks applied to one cast.
    pub max_pushbacks: u8,

    /// Number of visible aura slots per unit.
    pub visible_aura_slots: u8,
}

impl CombatConfig {
    // ===== compile-time constants =====
    /// Maximum effects per spell.
    pub const MAX_SPELL_EFFECTS: usize = 3;
    /// Number of discrete resist buckets (0%, 10%, ..., 100%).
    pub const RESIST_BUCKETS: usize = 11;
    /// Resistance constant used for the level 83 boss tier.
    pub const BOSS_RESISTANCE_CONSTANT: f32 = 510.0;
    /// Level treated as the boss tier for resistance.
    pub const BOSS_LEVEL: u8 = 83;
    /// Maximum armor damage reduction.
    pub const MAX_ARMOR_REDUCTION: f32 = 0.75;
    /// Glancing blow chance cap (per 10000).
    pub const MAX_GLANCING_CHANCE: i32 = 4000;
    /// Miss chance cap (per 10000).
    pub const MAX_MISS_CHANCE: i32 = 6000;
    /// Equipment slots rolled by durability loss.
    pub const EQUIPMENT_SLOTS: u8 = 19;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_COMBAT_TIMEOUT_MS: u32 = 5_000;
    pub const DEFAULT_RANGED_SPELL: SpellId = SpellId(75);
    pub const DEFAULT_AREA_AURA_INTERVAL_MS: u32 = 500;
    pub const DEFAULT_MELEE_RANGE: f32 = 5.0;

    pub fn new() -> Self {
        Self {
            combat_timeout_ms: Self::DEFAULT_COMBAT_TIMEOUT_MS,
            default_ranged_spell: Self::DEFAULT_RANGED_SPELL,
            uninterruptible_by_others: Vec::new(),
            rage_income_rate: 1.0,
            durability_loss_on_damage: 0.0,
            area_aura_update_interval_ms: Self::DEFAULT_AREA_AURA_INTERVAL_MS,
            melee_range: Self::DEFAULT_MELEE_RANGE,
            block_percent: 30,
            critical_block_chance: 0,
            fear_break_health_pct: 10,
            spell_crit_multiplier_pct: 150,
            melee_crit_multiplier_pct: 200,
            base_miss_chance: 500,
            dual_wield_miss_penalty: 1900,
            base_avoidance_chance: 500,
            pushback_ms: 500,
            max_pushbacks: 2,
            visible_aura_slots: 64,
        }
    }

    /// Returns true if `spell` ignores interrupts issued by other units.
    pub fn is_uninterruptible_by_others(&self, spell: SpellId) -> bool {
        self.uninterruptible_by_others.contains(&spell)
    }
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Combat resolution: outcome rolls, mitigation, damage and healing commit,
//! threat and combat state.
//!
//! # Design
//!
//! Pure formulas (armor curve, resist buckets, rage conversion, the melee
//! ladder) are free functions taking plain numbers so they can be tested in
//! isolation. Everything that reads auras or mutates units is an
//! `impl CombatEngine` block in the submodule owning that stage.
//!
//! ```text
//! roll -> done bonus -> armor -> taken bonus -> crit      (CalcDamageInfo)
//!      -> resist -> absorb -> block                       (DamageInfo ledger)
//!      -> deal_damage (commit + side effects)
//! ```

mod damage;
mod heal;
mod info;
mod mitigation;
mod outcome;
mod power;
mod threat;

pub use info::{CalcDamageInfo, DamageInfo, HealInfo};
pub use mitigation::{
    armor_reduction, average_resist, resist_bucket_chances, select_resist_bucket,
};
pub use outcome::{MeleeChances, roll_melee_outcome};
pub use power::{rage_conversion, rage_from_damage_dealt, rage_from_damage_taken};
pub use threat::ThreatList;

pub use crate::state::WeaponAttackType;

use strum::Display;

/// Result of a melee swing or a melee-class spell roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeleeHitOutcome {
    Evade,
    Miss,
    Dodge,
    Block,
    Parry,
    Glancing,
    Crit,
    Crushing,
    Normal,
}

impl MeleeHitOutcome {
    /// Outcomes after which no damage is dealt.
    pub const fn is_avoided(self) -> bool {
        matches!(self, Self::Evade | Self::Miss | Self::Dodge | Self::Parry)
    }
}

/// Per-target result of a spell hit check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpellMissInfo {
    None,
    Miss,
    Resist,
    Dodge,
    Parry,
    /// Melee-class spell partially blocked; still lands.
    Block,
    Evade,
    Immune,
    Deflect,
    Absorb,
    Reflect,
}

impl SpellMissInfo {
    /// True if the spell does not land on the target.
    pub const fn is_miss(self) -> bool {
        !matches!(self, Self::None | Self::Block)
    }
}

/// How damage entered the pipeline; drives interrupt flags and pushback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DamageEffectType {
    /// White melee or ranged swing.
    Direct,
    SpellDirect,
    /// Periodic tick.
    Dot,
    /// Redirected share of another hit (split damage).
    NoDamage,
    SelfDamage,
}

//! Common error infrastructure for combat-core.
//!
//! Recoverable failures are typed errors (`CastError`, `EngineError`). Broken
//! engine invariants (applying an aura twice, a non-quiescent despawn, a stuck
//! proc counter) are not errors: they panic through `assert!`.
//!
//! # Design Principles
//!
//! - **Type Safety**: each concern has its own error enum
//! - **Severity Classification**: errors are categorized for recovery strategies
//! - **Quiet Failures**: ineligible targets resolve to outcome codes, not errors

use crate::spell::SpellId;
use crate::state::{AuraId, GameTime, UnitId};

/// Severity level of an error, used for categorization and recovery strategies.
///
/// - **Recoverable**: temporary conditions that may succeed later (cooldown, power)
/// - **Validation**: invalid input that should be rejected without retry
/// - **Internal**: missing data that should have been present
/// - **Fatal**: unrecoverable corruption
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Recoverable error - can retry later.
    ///
    /// Examples: spell on cooldown, not enough power
    Recoverable,

    /// Validation error - invalid input, should not retry without changes.
    ///
    /// Examples: unknown target, dead target
    Validation,

    /// Internal error - missing external data.
    ///
    /// Examples: unknown spell id, unknown trigger spell
    Internal,

    /// Fatal error - state corrupted, cannot continue.
    Fatal,
}

impl ErrorSeverity {
    /// Returns a human-readable description of this severity level.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Fatal => "fatal",
        }
    }

    /// Returns true if this error is potentially recoverable.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }

    /// Returns true if this error indicates missing data or a bug.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal | Self::Fatal)
    }
}

/// Contextual information attached to errors for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ErrorContext {
    /// Unit that triggered the error (if applicable).
    pub unit: Option<UnitId>,

    /// Spell involved (if applicable).
    pub spell: Option<SpellId>,

    /// World clock at the time of error.
    pub time: GameTime,
}

impl ErrorContext {
    #[must_use]
    pub const fn new(time: GameTime) -> Self {
        Self {
            unit: None,
            spell: None,
            time,
        }
    }

    /// Attaches a unit to this context (builder pattern).
    #[must_use]
    pub const fn with_unit(mut self, unit: UnitId) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Attaches a spell to this context (builder pattern).
    #[must_use]
    pub const fn with_spell(mut self, spell: SpellId) -> Self {
        self.spell = Some(spell);
        self
    }
}

/// Common trait for all combat-core errors.
///
/// # Implementation Guidelines
///
/// - All error enums should implement this trait
/// - Use `#[derive(thiserror::Error)]` for Display/Error impl
/// - Classify severity based on recoverability, not impact
pub trait GameError: core::fmt::Display + core::fmt::Debug {
    /// Returns the severity level of this error.
    fn severity(&self) -> ErrorSeverity;

    /// Returns the context information for this error, if available.
    fn context(&self) -> Option<&ErrorContext> {
        None
    }

    /// Returns a static string identifier for this error variant.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

/// Reasons a cast attempt is rejected before it starts.
///
/// These mirror the protocol's cast-failure codes; the session layer turns
/// them into a failure notification for the casting player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CastError {
    #[error("spell is not ready yet")]
    NotReady,

    #[error("not enough power")]
    NoPower,

    #[error("caster is dead")]
    CasterDead,

    #[error("caster is silenced")]
    Silenced,

    #[error("caster is stunned")]
    Stunned,

    #[error("caster is fleeing")]
    Fleeing,

    #[error("school is locked out")]
    SchoolLockedOut,

    #[error("target is dead")]
    TargetsDead,

    #[error("invalid target")]
    BadTargets,

    #[error("target is out of range")]
    OutOfRange,

    #[error("caster aura state requirement not met")]
    CasterAuraState,

    #[error("target aura state requirement not met")]
    TargetAuraState,

    #[error("cast was interrupted")]
    Interrupted,
}

impl GameError for CastError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotReady
            | Self::NoPower
            | Self::Silenced
            | Self::Stunned
            | Self::Fleeing
            | Self::SchoolLockedOut
            | Self::OutOfRange
            | Self::Interrupted => ErrorSeverity::Recoverable,
            Self::CasterDead
            | Self::TargetsDead
            | Self::BadTargets
            | Self::CasterAuraState
            | Self::TargetAuraState => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotReady => "CAST_NOT_READY",
            Self::NoPower => "CAST_NO_POWER",
            Self::CasterDead => "CAST_CASTER_DEAD",
            Self::Silenced => "CAST_SILENCED",
            Self::Stunned => "CAST_STUNNED",
            Self::Fleeing => "CAST_FLEEING",
            Self::SchoolLockedOut => "CAST_SCHOOL_LOCKED_OUT",
            Self::TargetsDead => "CAST_TARGETS_DEAD",
            Self::BadTargets => "CAST_BAD_TARGETS",
            Self::OutOfRange => "CAST_OUT_OF_RANGE",
            Self::CasterAuraState => "CAST_CASTER_AURA_STATE",
            Self::TargetAuraState => "CAST_TARGET_AURA_STATE",
            Self::Interrupted => "CAST_INTERRUPTED",
        }
    }
}

/// Errors surfaced by engine entry points.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("unit {0} does not exist")]
    UnknownUnit(UnitId),

    #[error("unit {0} is already spawned")]
    DuplicateUnit(UnitId),

    #[error("spell {0} has no definition")]
    UnknownSpell(SpellId),

    #[error("aura {aura} triggers unknown spell {trigger}")]
    UnknownTriggerSpell { aura: SpellId, trigger: SpellId },

    #[error("aura {0} has no live caster")]
    MissingCaster(AuraId),

    #[error("cast failed: {error}")]
    Cast {
        error: CastError,
        context: ErrorContext,
    },
}

impl EngineError {
    pub fn cast(error: CastError, context: ErrorContext) -> Self {
        Self::Cast { error, context }
    }

    /// Returns the cast failure reason, if this is a cast rejection.
    pub fn cast_error(&self) -> Option<CastError> {
        match self {
            Self::Cast { error, .. } => Some(*error),
            _ => None,
        }
    }
}

impl GameError for EngineError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::UnknownUnit(_) | Self::DuplicateUnit(_) => ErrorSeverity::Validation,
            Self::UnknownSpell(_) | Self::UnknownTriggerSpell { .. } | Self::MissingCaster(_) => {
                ErrorSeverity::Internal
            }
            Self::Cast { error, .. } => error.severity(),
        }
    }

    fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Cast { context, .. } => Some(context),
            _ => None,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownUnit(_) => "ENGINE_UNKNOWN_UNIT",
            Self::DuplicateUnit(_) => "ENGINE_DUPLICATE_UNIT",
            Self::UnknownSpell(_) => "ENGINE_UNKNOWN_SPELL",
            Self::UnknownTriggerSpell { .. } => "ENGINE_UNKNOWN_TRIGGER_SPELL",
            Self::MissingCaster(_) => "ENGINE_MISSING_CASTER",
            Self::Cast { error, .. } => error.error_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_errors_classify_by_recoverability() {
        assert!(CastError::NotReady.severity().is_recoverable());
        assert!(!CastError::TargetsDead.severity().is_recoverable());
        assert_eq!(CastError::NoPower.error_code(), "CAST_NO_POWER");
    }

    #[test]
    fn engine_error_forwards_cast_context() {
        let ctx = ErrorContext::new(GameTime(1200))
            .with_unit(UnitId(4))
            .with_spell(SpellId(133));
        let err = EngineError::cast(CastError::Silenced, ctx.clone());

        assert_eq!(err.cast_error(), Some(CastError::Silenced));
        assert_eq!(err.context(), Some(&ctx));
        assert_eq!(err.error_code(), "CAST_SILENCED");
        assert!(EngineError::UnknownSpell(SpellId(1)).severity().is_internal());
    }
}

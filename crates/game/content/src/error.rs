//! Content validation errors.

use combat_core::{ErrorSeverity, GameError, SpellId, UnitId};

/// Content that parsed but cannot be handed to the engine.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("spell {0} is defined more than once")]
    DuplicateSpell(SpellId),

    #[error("spell {spell} triggers unknown spell {trigger}")]
    UnknownTriggerSpell { spell: SpellId, trigger: SpellId },

    #[error("spell {0} has a periodic aura effect without an amplitude")]
    MissingAmplitude(SpellId),

    #[error("unit {0} is defined more than once")]
    DuplicateUnit(UnitId),

    #[error("unit {0} has no health")]
    EmptyHealth(UnitId),
}

impl ConfigError {
    pub(crate) fn out_of_range(
        field: &'static str,
        value: impl Into<f64>,
        min: impl Into<f64>,
        max: impl Into<f64>,
    ) -> Self {
        Self::OutOfRange {
            field,
            value: value.into(),
            min: min.into(),
            max: max.into(),
        }
    }
}

impl GameError for ConfigError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Validation
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::OutOfRange { .. } => "CONFIG_OUT_OF_RANGE",
            Self::DuplicateSpell(_) => "CONFIG_DUPLICATE_SPELL",
            Self::UnknownTriggerSpell { .. } => "CONFIG_UNKNOWN_TRIGGER_SPELL",
            Self::MissingAmplitude(_) => "CONFIG_MISSING_AMPLITUDE",
            Self::DuplicateUnit(_) => "CONFIG_DUPLICATE_UNIT",
            Self::EmptyHealth(_) => "CONFIG_EMPTY_HEALTH",
        }
    }
}

//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, content loading and the engine so
//! clients can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use combat_core::{EngineError, ErrorSeverity, GameError, UnitId};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("runtime requires content oracles to be configured before building")]
    MissingOracles,

    #[error("failed to load combat content: {0}")]
    Content(String),

    #[error("unit {0} is not in the world")]
    UnknownUnit(UnitId),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("combat log i/o failed")]
    CombatLog(#[source] std::io::Error),
}

impl RuntimeError {
    /// Severity of the failure, following the engine's classification where
    /// the engine produced it.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Engine(error) => error.severity(),
            Self::UnknownUnit(_) => ErrorSeverity::Validation,
            Self::MissingOracles | Self::Content(_) => ErrorSeverity::Internal,
            Self::CommandChannelClosed
            | Self::ReplyChannelClosed(_)
            | Self::WorkerJoin(_)
            | Self::CombatLog(_) => ErrorSeverity::Fatal,
        }
    }
}

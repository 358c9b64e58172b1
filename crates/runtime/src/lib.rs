//! Async runtime around the combat engine.
//!
//! The runtime owns the world on a single simulation worker task, feeds it
//! unit commands over a channel and fans the drained engine events out on a
//! topic-based bus. [`Runtime`] is built with [`RuntimeBuilder`] and hands out
//! cloneable [`RuntimeHandle`]s to clients.
pub mod api;
pub mod events;
pub mod logging;
pub mod oracle;
mod runtime;
mod workers;

pub use api::{CommandProvider, IdleProvider, MeleeProvider, Result, RuntimeError, RuntimeHandle};
pub use events::{CombatRecord, Event, EventBus, Topic, WorldEvent};
pub use logging::init_tracing;
pub use oracle::OracleManager;
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use workers::{CombatLog, SimulationMetrics};

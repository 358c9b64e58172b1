//! Worker tasks that back the runtime orchestration.
//!
//! The simulation worker owns the world and runs every engine call; metrics
//! and the combat log are shared with it rather than running as tasks.

mod combat_log;
mod metrics;
mod simulation;

pub use combat_log::CombatLog;
pub use metrics::SimulationMetrics;
pub use simulation::{Command, SimulationWorker};

//! Event system for the combat runtime.
//!
//! Engine notifications are drained after every command and tick, stamped
//! with the world clock and routed to topics so consumers only see what they
//! subscribed to.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{CombatRecord, WorldEvent};

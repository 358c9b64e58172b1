//! Inbound commands from sessions and AI controllers.

use tracing::debug;

use super::CombatEngine;
use crate::error::EngineError;
use crate::event::UnitCommand;
use crate::state::UnitId;

impl CombatEngine<'_> {
    /// Applies one command issued for `unit`.
    ///
    /// A rejected cast is returned as an error after its `SpellFailure`
    /// notification went out. Attack and interrupt commands that change
    /// nothing succeed silently.
    pub fn handle_command(
        &mut self,
        unit: UnitId,
        command: UnitCommand,
    ) -> Result<(), EngineError> {
        if !self.state.contains(unit) {
            return Err(EngineError::UnknownUnit(unit));
        }
        debug!(%unit, ?command, "command");
        match command {
            UnitCommand::CastSpell { spell, targets } => {
                self.cast_spell(unit, spell, targets, None)?;
            }
            UnitCommand::AttackStart { target } => {
                if !self.state.contains(target) {
                    return Err(EngineError::UnknownUnit(target));
                }
                self.attack_start(unit, target);
            }
            UnitCommand::AttackStop => {
                self.attack_stop(unit);
            }
            UnitCommand::InterruptCast { slot } => {
                self.interrupt_spell(unit, slot, true, true, None);
            }
        }
        Ok(())
    }
}

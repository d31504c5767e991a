use chrono::Utc;

use super::{ChargingController, ControllerCommand};

impl ChargingController {
    pub(crate) async fn handle_command(&mut self, cmd: ControllerCommand) {
        match cmd {
            ControllerCommand::SetEnabled(enabled) => self.set_enabled(enabled),
            ControllerCommand::SetCurrentCap(amps) => self.set_current_cap(amps),
            ControllerCommand::UpdateCharger => {
                self.update_charger().await;
            }
            // Handled by the run loop
            ControllerCommand::Shutdown => {}
        }
    }

    /// Flip the enable switch. Outputs are recomputed and published right
    /// away; actuators follow on the next tick.
    pub fn set_enabled(&mut self, enabled: bool) {
        if !self.state.controls.set_enabled(enabled) {
            return;
        }
        self.logger.info(&format!(
            "Charging control {}",
            if enabled { "enabled" } else { "disabled" }
        ));
        self.persist_controls();
        self.recompute(Utc::now());
    }

    /// Change the user current cap; out-of-range values are rejected with a
    /// warning and the previous cap stays.
    pub fn set_current_cap(&mut self, amps: u32) {
        match self.state.controls.set_current_cap(amps) {
            Ok(false) => {}
            Ok(true) => {
                self.logger
                    .info(&format!("Max charging current cap set to {}A", amps));
                self.persist_controls();
                self.recompute(Utc::now());
            }
            Err(e) => {
                self.logger
                    .warn(&format!("Invalid charging current option {}: {}", amps, e));
            }
        }
    }
}

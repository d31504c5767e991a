use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::ControlState;
use super::types::{ControllerSnapshot, ControllerState};
use crate::config::Config;
use crate::engine::{ChargeDecision, DecisionBreakdown};
use crate::power::total_power;

/// Snapshot published before the first evaluation
pub(super) fn initial(config: &Config, state: &ControlState) -> ControllerSnapshot {
    ControllerSnapshot {
        timestamp: Utc::now().to_rfc3339(),
        controller_id: config.controller_id.clone(),
        controller_state: format!("{:?}", ControllerState::Initializing),
        charging_allowed: false,
        max_current: 0,
        decision: ChargeDecision::CONSERVATIVE,
        enabled: state.controls.enabled,
        current_cap: state.controls.current_cap,
        avg_power_30s: None,
        avg_power_15min: None,
        avg_import_power_15min: 0.0,
        max_import_power: 0.0,
        current_power: 0.0,
        breakdown: DecisionBreakdown::default(),
        charger_switch_configured: config.actuators.charger_switch.is_some(),
        charger_current_select_configured: config.actuators.charger_current_select.is_some(),
        last_update: None,
        total_ticks: 0,
        last_reconcile: None,
    }
}

impl super::ChargingController {
    pub(super) fn build_snapshot(&mut self, now: DateTime<Utc>) -> ControllerSnapshot {
        let enabled = self.state.controls.enabled;
        let (decision, breakdown) = self
            .last_evaluation
            .map_or((ChargeDecision::CONSERVATIVE, DecisionBreakdown::default()), |e| {
                (e.decision, e.breakdown)
            });
        let gated = decision.gated(enabled);

        ControllerSnapshot {
            timestamp: now.to_rfc3339(),
            controller_id: self.config.controller_id.clone(),
            controller_state: format!("{:?}", self.lifecycle),
            charging_allowed: gated.allowed,
            max_current: gated.max_current,
            decision,
            enabled,
            current_cap: self.state.controls.current_cap,
            avg_power_30s: self.state.window_short.average(now),
            avg_power_15min: self.state.window_budget.average(now),
            avg_import_power_15min: self.last_readings.avg_import_power_15min,
            max_import_power: self.last_readings.max_import_power,
            current_power: total_power(&self.last_readings),
            breakdown,
            charger_switch_configured: self.config.actuators.charger_switch.is_some(),
            charger_current_select_configured: self
                .config
                .actuators
                .charger_current_select
                .is_some(),
            last_update: self.state.last_update.map(|t| t.to_rfc3339()),
            total_ticks: self.total_ticks,
            last_reconcile: self.last_report.clone(),
        }
    }

    /// Push a fresh snapshot to watchers and SSE subscribers
    pub(super) fn publish(&mut self, now: DateTime<Utc>) {
        let snapshot = self.build_snapshot(now);
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                // No subscribers is fine
                let _ = self.status_tx.send(json);
            }
            Err(e) => self
                .logger
                .warn(&format!("Failed to serialize status snapshot: {}", e)),
        }
        self.snapshot_tx.send_replace(Arc::new(snapshot));
    }
}

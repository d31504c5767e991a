use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use super::types::{ControllerCommand, ControllerState, TickOutcome};
use crate::engine::{ChargeDecision, Evaluation};
use crate::error::Result;
use crate::power::total_power;
use crate::reconcile::ReconcileReport;

impl super::ChargingController {
    /// Run the controller main loop until a `Shutdown` command arrives or the
    /// command channel closes. `changes` carries ids of entities whose state
    /// changed on the host.
    pub async fn run(&mut self, mut changes: broadcast::Receiver<String>) -> Result<()> {
        self.logger.info(&format!(
            "Starting charging controller main loop ({} s interval, {} tracked sources)",
            self.config.update_interval_seconds,
            self.tracked.len()
        ));
        self.lifecycle = ControllerState::Running;

        let mut ticker = interval(self.config.update_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut changes_open = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Reconciliation runs detached
                    let _ = self.tick_at(Utc::now());
                }
                change = changes.recv(), if changes_open => match change {
                    Ok(entity_id) => {
                        if self.tracked.contains(&entity_id) {
                            self.on_source_changed_at(Utc::now());
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        self.logger.debug(&format!("Missed {} change notifications", skipped));
                        self.on_source_changed_at(Utc::now());
                    }
                    Err(RecvError::Closed) => {
                        self.logger.warn("Change notifications closed, continuing on timer only");
                        changes_open = false;
                    }
                },
                Some(report) = self.reports_rx.recv() => {
                    self.last_report = Some(report);
                }
                cmd = self.commands_rx.recv() => match cmd {
                    Some(ControllerCommand::Shutdown) | None => {
                        self.logger.info("Shutdown signal received");
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                },
            }
        }

        self.shutdown()
    }

    /// One timer tick at `now`: sample total power into both windows,
    /// recompute, and start reconciliation when actuators are configured.
    pub fn tick_at(&mut self, now: DateTime<Utc>) -> TickOutcome {
        let readings = self.collect_readings();
        let power = total_power(&readings);
        self.state.record_sample(power, now);
        self.total_ticks = self.total_ticks.saturating_add(1);
        self.logger.trace(&format!("Sampled total power {:.1} W", power));

        let evaluation = self.evaluate(readings, now);
        let reconcile = self
            .reconciler
            .has_actuators()
            .then(|| self.spawn_reconcile(evaluation.decision));
        self.publish(now);

        TickOutcome {
            evaluation,
            reconcile,
        }
    }

    /// A tracked source changed. Recomputes only when at least one update
    /// interval has passed since the last recompute; returns the evaluation
    /// when it did.
    pub fn on_source_changed_at(&mut self, now: DateTime<Utc>) -> Option<Evaluation> {
        let min_gap = chrono::Duration::from_std(self.config.update_interval())
            .unwrap_or(chrono::Duration::MAX);
        if !self.state.due(now, min_gap) {
            return None;
        }
        Some(self.recompute(now))
    }

    /// Evaluate from fresh readings and publish, without sampling or
    /// commanding anything
    pub(crate) fn recompute(&mut self, now: DateTime<Utc>) -> Evaluation {
        let readings = self.collect_readings();
        let evaluation = self.evaluate(readings, now);
        self.publish(now);
        evaluation
    }

    /// Manual trigger: evaluate and reconcile now, waiting for the
    /// actuators
    pub async fn update_charger(&mut self) -> Option<ReconcileReport> {
        let now = Utc::now();
        self.logger.info("Manual charger update requested");
        let evaluation = self.recompute(now);
        if !self.reconciler.has_actuators() {
            self.logger
                .debug("No charger actuators configured, nothing to update");
            return None;
        }
        let report = self
            .reconciler
            .reconcile(
                self.port.as_ref(),
                self.state.controls.enabled,
                evaluation.decision,
            )
            .await;
        self.last_report = Some(report.clone());
        self.publish(now);
        Some(report)
    }

    /// Stop: drop sample history and persist the user controls
    pub fn shutdown(&mut self) -> Result<()> {
        self.lifecycle = ControllerState::ShuttingDown;
        self.state.clear_windows();
        self.persistence.update(self.state.controls);
        let saved = self.persistence.save();
        self.publish(Utc::now());
        match &saved {
            Ok(()) => self.logger.info("Charging controller stopped"),
            Err(e) => self
                .logger
                .error(&format!("Failed to persist controls on shutdown: {}", e)),
        }
        saved
    }

    fn evaluate(&mut self, readings: crate::power::ReadingSet, now: DateTime<Utc>) -> Evaluation {
        let avg_power_30s = self.state.window_short.average(now);
        let evaluation =
            self.engine
                .evaluate(&readings, avg_power_30s, self.state.controls.current_cap);
        self.state.last_update = Some(now);
        self.last_readings = readings;
        self.last_evaluation = Some(evaluation);

        let gated = evaluation.decision.gated(self.state.controls.enabled);
        self.logger.debug(&format!(
            "Evaluated: allowed={}, max_current={} A (available {:.0} W)",
            gated.allowed, gated.max_current, evaluation.breakdown.available_power
        ));
        evaluation
    }

    fn spawn_reconcile(&self, decision: ChargeDecision) -> JoinHandle<ReconcileReport> {
        let port = Arc::clone(&self.port);
        let reconciler = self.reconciler.clone();
        let enabled = self.state.controls.enabled;
        let reports_tx = self.reports_tx.clone();
        tokio::spawn(async move {
            let report = reconciler.reconcile(port.as_ref(), enabled, decision).await;
            let _ = reports_tx.send(report.clone());
            report
        })
    }
}

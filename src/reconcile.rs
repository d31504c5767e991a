//! Actuator reconciliation
//!
//! Turns a decision plus the enable switch into commands for the charger's
//! on/off switch and its current selector. Actuator state is read fresh on
//! every call and a command is only issued when the reported state differs
//! from the desired one, so repeated calls are idempotent. Each actuator is
//! handled independently; a failure on one never stops the other.

use crate::engine::ChargeDecision;
use crate::host::{ActuatorPort, SwitchState};
use crate::logging::{StructuredLogger, get_logger};
use serde::{Deserialize, Serialize};

/// What happened to one actuator during a reconcile pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum ActuatorOutcome {
    /// No entity configured for this actuator
    NotConfigured,
    /// Reported state already matches
    Unchanged,
    /// A command was issued; carries the commanded state
    Commanded(String),
    /// Nothing to do or nothing possible; carries the reason
    Skipped(String),
    /// The command or the state read failed
    Failed(String),
}

impl ActuatorOutcome {
    pub fn is_command(&self) -> bool {
        matches!(self, ActuatorOutcome::Commanded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub switch: ActuatorOutcome,
    pub selector: ActuatorOutcome,
}

impl ReconcileReport {
    pub fn commands_issued(&self) -> usize {
        usize::from(self.switch.is_command()) + usize::from(self.selector.is_command())
    }
}

/// Pick the selector option for `target` amperes: the exact option when
/// offered, else the greatest integer option not above the target. Never
/// rounds up; `None` when no option qualifies.
pub fn select_level(target: u32, options: &[String]) -> Option<String> {
    let exact = target.to_string();
    if options.iter().any(|o| *o == exact) {
        return Some(exact);
    }
    options
        .iter()
        .filter_map(|o| o.trim().parse::<i64>().ok().map(|v| (v, o)))
        .filter(|(v, _)| *v <= i64::from(target))
        .max_by_key(|(v, _)| *v)
        .map(|(_, o)| o.clone())
}

#[derive(Clone)]
pub struct ActuatorReconciler {
    switch_id: Option<String>,
    selector_id: Option<String>,
    logger: StructuredLogger,
}

impl ActuatorReconciler {
    pub fn new(switch_id: Option<String>, selector_id: Option<String>) -> Self {
        Self {
            switch_id,
            selector_id,
            logger: get_logger("reconcile"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// True when at least one actuator is wired
    pub fn has_actuators(&self) -> bool {
        self.switch_id.is_some() || self.selector_id.is_some()
    }

    /// Bring both actuators in line with `enabled` and `decision`
    pub async fn reconcile(
        &self,
        port: &dyn ActuatorPort,
        enabled: bool,
        decision: ChargeDecision,
    ) -> ReconcileReport {
        let should_charge = decision.should_charge(enabled);

        let switch = match self.switch_id.as_deref() {
            Some(id) => self.reconcile_switch(port, id, should_charge).await,
            None => ActuatorOutcome::NotConfigured,
        };

        let selector = match self.selector_id.as_deref() {
            None => ActuatorOutcome::NotConfigured,
            // The level is left where it is while charging is off
            Some(_) if !should_charge => {
                ActuatorOutcome::Skipped("charging not active".to_string())
            }
            Some(id) => {
                self.reconcile_selector(port, id, decision.max_current)
                    .await
            }
        };

        ReconcileReport { switch, selector }
    }

    async fn reconcile_switch(
        &self,
        port: &dyn ActuatorPort,
        id: &str,
        should_charge: bool,
    ) -> ActuatorOutcome {
        let current = port.switch_state(id);
        if current == SwitchState::Unavailable {
            self.logger
                .warn(&format!("Charger switch {} is unavailable", id));
            return ActuatorOutcome::Skipped("switch unavailable".to_string());
        }
        let is_on = current == SwitchState::On;
        if is_on == should_charge {
            return ActuatorOutcome::Unchanged;
        }

        let target = if should_charge { "on" } else { "off" };
        match port.command_switch(id, should_charge).await {
            Ok(()) => {
                self.logger
                    .debug(&format!("Turned {} charger switch: {}", target, id));
                ActuatorOutcome::Commanded(target.to_string())
            }
            Err(e) => {
                self.logger
                    .error(&format!("Error controlling charger switch {}: {}", id, e));
                ActuatorOutcome::Failed(e.to_string())
            }
        }
    }

    async fn reconcile_selector(
        &self,
        port: &dyn ActuatorPort,
        id: &str,
        target: u32,
    ) -> ActuatorOutcome {
        let Some(state) = port.selector_state(id) else {
            self.logger
                .warn(&format!("Charger current select entity {} not found", id));
            return ActuatorOutcome::Skipped("selector unavailable".to_string());
        };
        if state.options.is_empty() {
            self.logger
                .warn(&format!("No options available for {}", id));
            return ActuatorOutcome::Skipped("no options".to_string());
        }

        let Some(level) = select_level(target, &state.options) else {
            self.logger.debug(&format!(
                "No option of {} at or below {} A, keeping {}",
                id, target, state.current
            ));
            return ActuatorOutcome::Skipped(format!("no option <= {}", target));
        };
        if state.current == level {
            return ActuatorOutcome::Unchanged;
        }

        match port.command_selector(id, &level).await {
            Ok(()) => {
                self.logger
                    .debug(&format!("Set charger current to {}A: {}", level, id));
                ActuatorOutcome::Commanded(level)
            }
            Err(e) => {
                self.logger
                    .error(&format!("Error controlling charger current {}: {}", id, e));
                ActuatorOutcome::Failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChargeCtlError, Result};
    use crate::host::SelectorState;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Port that applies commands to its own state and counts them
    struct MockPort {
        switch: Mutex<SwitchState>,
        selector: Mutex<Option<SelectorState>>,
        fail_switch: bool,
        fail_selector: bool,
        commands: AtomicUsize,
    }

    impl MockPort {
        fn new(switch: SwitchState, current: &str, options: &[u32]) -> Self {
            Self {
                switch: Mutex::new(switch),
                selector: Mutex::new(Some(SelectorState {
                    current: current.to_string(),
                    options: options.iter().map(u32::to_string).collect(),
                })),
                fail_switch: false,
                fail_selector: false,
                commands: AtomicUsize::new(0),
            }
        }

        fn selected(&self) -> String {
            self.selector
                .lock()
                .unwrap()
                .as_ref()
                .map(|s| s.current.clone())
                .unwrap_or_default()
        }

        fn commands(&self) -> usize {
            self.commands.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl ActuatorPort for MockPort {
        fn switch_state(&self, _entity_id: &str) -> SwitchState {
            *self.switch.lock().unwrap()
        }

        async fn command_switch(&self, entity_id: &str, on: bool) -> Result<()> {
            self.commands.fetch_add(1, Ordering::SeqCst);
            if self.fail_switch {
                return Err(ChargeCtlError::actuator(entity_id, "unreachable"));
            }
            *self.switch.lock().unwrap() = if on { SwitchState::On } else { SwitchState::Off };
            Ok(())
        }

        fn selector_state(&self, _entity_id: &str) -> Option<SelectorState> {
            self.selector.lock().unwrap().clone()
        }

        async fn command_selector(&self, entity_id: &str, option: &str) -> Result<()> {
            self.commands.fetch_add(1, Ordering::SeqCst);
            if self.fail_selector {
                return Err(ChargeCtlError::actuator(entity_id, "option rejected"));
            }
            if let Some(s) = self.selector.lock().unwrap().as_mut() {
                s.current = option.to_string();
            }
            Ok(())
        }
    }

    fn reconciler() -> ActuatorReconciler {
        ActuatorReconciler::new(
            Some("switch.charger".to_string()),
            Some("select.charger_current".to_string()),
        )
    }

    fn decision(allowed: bool, max_current: u32) -> ChargeDecision {
        ChargeDecision {
            allowed,
            max_current,
        }
    }

    fn opts(levels: &[u32]) -> Vec<String> {
        levels.iter().map(u32::to_string).collect()
    }

    #[test]
    fn select_level_prefers_exact() {
        assert_eq!(select_level(16, &opts(&[6, 10, 16, 20])), Some("16".to_string()));
    }

    #[test]
    fn select_level_rounds_down() {
        let options = opts(&[6, 10, 13, 16, 20, 32]);
        assert_eq!(select_level(17, &options), Some("16".to_string()));
        assert_eq!(select_level(12, &options), Some("10".to_string()));
        assert_eq!(select_level(100, &options), Some("32".to_string()));
    }

    #[test]
    fn select_level_never_rounds_up() {
        assert_eq!(select_level(5, &opts(&[6, 10, 13, 16, 20, 32])), None);
        assert_eq!(select_level(0, &opts(&[6])), None);
    }

    #[test]
    fn select_level_ignores_non_integer_options() {
        let options = vec!["auto".to_string(), "8.5".to_string(), "8".to_string()];
        assert_eq!(select_level(9, &options), Some("8".to_string()));
        assert_eq!(select_level(9, &["max".to_string()]), None);
    }

    #[tokio::test]
    async fn second_pass_issues_no_commands() {
        let port = MockPort::new(SwitchState::Off, "6", &[6, 10, 13, 16, 20, 32]);
        let r = reconciler();

        let first = r.reconcile(&port, true, decision(true, 17)).await;
        assert_eq!(first.switch, ActuatorOutcome::Commanded("on".to_string()));
        assert_eq!(first.selector, ActuatorOutcome::Commanded("16".to_string()));
        assert_eq!(port.commands(), 2);

        let second = r.reconcile(&port, true, decision(true, 17)).await;
        assert_eq!(second.commands_issued(), 0);
        assert_eq!(second.switch, ActuatorOutcome::Unchanged);
        assert_eq!(second.selector, ActuatorOutcome::Unchanged);
        assert_eq!(port.commands(), 2);
    }

    #[tokio::test]
    async fn disabled_turns_off_and_keeps_level() {
        let port = MockPort::new(SwitchState::On, "20", &[6, 10, 16, 20]);
        let report = reconciler()
            .reconcile(&port, false, decision(true, 10))
            .await;
        assert_eq!(report.switch, ActuatorOutcome::Commanded("off".to_string()));
        assert!(matches!(report.selector, ActuatorOutcome::Skipped(_)));
        assert_eq!(port.selected(), "20");
    }

    #[tokio::test]
    async fn disallowed_turns_off_and_keeps_level() {
        let port = MockPort::new(SwitchState::On, "16", &[6, 16]);
        let report = reconciler()
            .reconcile(&port, true, decision(false, 6))
            .await;
        assert_eq!(report.switch, ActuatorOutcome::Commanded("off".to_string()));
        assert_eq!(port.selected(), "16");
    }

    #[tokio::test]
    async fn target_below_every_option_keeps_level() {
        let port = MockPort::new(SwitchState::On, "13", &[6, 10, 13]);
        let report = reconciler()
            .reconcile(&port, true, decision(true, 5))
            .await;
        assert!(matches!(report.selector, ActuatorOutcome::Skipped(_)));
        assert_eq!(port.selected(), "13");
        assert_eq!(port.commands(), 0);
    }

    #[tokio::test]
    async fn switch_failure_does_not_block_selector() {
        let mut port = MockPort::new(SwitchState::Off, "6", &[6, 10, 16]);
        port.fail_switch = true;
        let report = reconciler()
            .reconcile(&port, true, decision(true, 10))
            .await;
        assert!(matches!(report.switch, ActuatorOutcome::Failed(_)));
        assert_eq!(report.selector, ActuatorOutcome::Commanded("10".to_string()));
    }

    #[tokio::test]
    async fn selector_failure_is_reported_and_level_kept() {
        let mut port = MockPort::new(SwitchState::Off, "6", &[6, 10, 16]);
        port.fail_selector = true;
        let report = reconciler()
            .reconcile(&port, true, decision(true, 16))
            .await;
        assert_eq!(report.switch, ActuatorOutcome::Commanded("on".to_string()));
        assert!(matches!(report.selector, ActuatorOutcome::Failed(ref msg) if msg.contains("option rejected")));
        assert_eq!(port.selected(), "6");
        assert_eq!(port.commands(), 2);
        assert_eq!(report.commands_issued(), 1);
    }

    #[tokio::test]
    async fn unavailable_switch_is_left_alone() {
        let port = MockPort::new(SwitchState::Unavailable, "6", &[6]);
        let report = reconciler()
            .reconcile(&port, true, decision(true, 6))
            .await;
        assert!(matches!(report.switch, ActuatorOutcome::Skipped(_)));
        assert_eq!(report.selector, ActuatorOutcome::Unchanged);
        assert_eq!(port.commands(), 0);
    }

    #[tokio::test]
    async fn missing_selector_and_empty_options() {
        let port = MockPort::new(SwitchState::On, "6", &[]);
        let report = reconciler()
            .reconcile(&port, true, decision(true, 16))
            .await;
        assert_eq!(report.selector, ActuatorOutcome::Skipped("no options".to_string()));

        *port.selector.lock().unwrap() = None;
        let report = reconciler()
            .reconcile(&port, true, decision(true, 16))
            .await;
        assert_eq!(
            report.selector,
            ActuatorOutcome::Skipped("selector unavailable".to_string())
        );
    }

    #[tokio::test]
    async fn nothing_configured() {
        let port = MockPort::new(SwitchState::Off, "6", &[6]);
        let r = ActuatorReconciler::new(None, None);
        assert!(!r.has_actuators());
        let report = r.reconcile(&port, true, decision(true, 16)).await;
        assert_eq!(report.switch, ActuatorOutcome::NotConfigured);
        assert_eq!(report.selector, ActuatorOutcome::NotConfigured);
        assert_eq!(port.commands(), 0);
    }
}

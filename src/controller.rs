//! Charging controller
//!
//! Owns one instance's power windows, user controls and configuration, and
//! drives the decision core from a single task: a periodic timer, change
//! notifications from the entity host and user commands are all handled in
//! one `select!` loop, so no two recomputations ever overlap.

use crate::config::Config;
use crate::engine::{DecisionEngine, Evaluation};
use crate::error::Result;
use crate::host::{ActuatorPort, SensorReader};
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::{PersistenceManager, PersistentState};
use crate::power::ReadingSet;
use crate::reconcile::{ActuatorReconciler, ReconcileReport};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};

mod commands;
mod runtime;
mod snapshot;
mod state;
mod types;

pub use state::ControlState;
pub use types::{ControllerCommand, ControllerSnapshot, ControllerState, TickOutcome};

pub struct ChargingController {
    config: Config,

    reader: Arc<dyn SensorReader>,
    port: Arc<dyn ActuatorPort>,

    engine: DecisionEngine,
    reconciler: ActuatorReconciler,

    /// Controls, windows and last recompute time
    state: ControlState,
    lifecycle: ControllerState,

    persistence: PersistenceManager,
    logger: StructuredLogger,

    /// Source ids whose change notifications trigger a recompute
    tracked: HashSet<String>,

    last_readings: ReadingSet,
    last_evaluation: Option<Evaluation>,
    last_report: Option<ReconcileReport>,
    total_ticks: u64,

    commands_rx: mpsc::UnboundedReceiver<ControllerCommand>,

    /// Spawned reconciliations hand their report back here
    reports_tx: mpsc::UnboundedSender<ReconcileReport>,
    reports_rx: mpsc::UnboundedReceiver<ReconcileReport>,

    /// Serialized snapshots for SSE
    status_tx: broadcast::Sender<String>,
    snapshot_tx: watch::Sender<Arc<ControllerSnapshot>>,
    snapshot_rx: watch::Receiver<Arc<ControllerSnapshot>>,
}

impl ChargingController {
    pub fn new(
        config: Config,
        reader: Arc<dyn SensorReader>,
        port: Arc<dyn ActuatorPort>,
        commands_rx: mpsc::UnboundedReceiver<ControllerCommand>,
    ) -> Result<Self> {
        config.validate()?;

        let logger = get_logger("controller").for_controller(&config.controller_id);
        logger.info("Initializing charging controller");

        // Restore user controls (best-effort)
        let mut persistence = PersistenceManager::new(&config.persistence.state_file).with_state(
            PersistentState {
                enabled: config.defaults.enabled,
                current_cap: config.defaults.current_cap,
            },
        );
        if let Err(e) = persistence.load() {
            logger.warn(&format!(
                "Failed to load persisted controls from {}: {}",
                persistence.path().display(),
                e
            ));
        }
        let controls = persistence.controls();

        let engine = DecisionEngine::new()
            .with_logger(get_logger("engine").for_controller(&config.controller_id));
        let reconciler = ActuatorReconciler::new(
            config.actuators.charger_switch.clone(),
            config.actuators.charger_current_select.clone(),
        )
        .with_logger(get_logger("reconcile").for_controller(&config.controller_id));

        let state = ControlState::new(controls);
        let tracked = config.sources.tracked_ids().into_iter().collect();

        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let (status_tx, _status_rx) = broadcast::channel::<String>(100);
        let (snapshot_tx, snapshot_rx) =
            watch::channel(Arc::new(snapshot::initial(&config, &state)));

        Ok(Self {
            config,
            reader,
            port,
            engine,
            reconciler,
            state,
            lifecycle: ControllerState::Initializing,
            persistence,
            logger,
            tracked,
            last_readings: ReadingSet::default(),
            last_evaluation: None,
            last_report: None,
            total_ticks: 0,
            commands_rx,
            reports_tx,
            reports_rx,
            status_tx,
            snapshot_tx,
            snapshot_rx,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn controls(&self) -> crate::controls::ChargingControls {
        self.state.controls
    }

    pub fn state(&self) -> ControllerState {
        self.lifecycle
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    pub fn last_evaluation(&self) -> Option<Evaluation> {
        self.last_evaluation
    }

    pub fn last_report(&self) -> Option<&ReconcileReport> {
        self.last_report.as_ref()
    }

    /// Latest snapshot, updated after every recompute
    pub fn subscribe_snapshot(&self) -> watch::Receiver<Arc<ControllerSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Serialized snapshots as they are published
    pub fn subscribe_status(&self) -> broadcast::Receiver<String> {
        self.status_tx.subscribe()
    }

    /// Sender side of the status stream, for consumers that subscribe later
    pub fn status_sender(&self) -> broadcast::Sender<String> {
        self.status_tx.clone()
    }

    /// Read every source once
    fn collect_readings(&self) -> ReadingSet {
        ReadingSet::collect(
            self.reader.as_ref(),
            &self.config.sources,
            &self.config.defaults,
            &self.logger,
        )
    }

    fn persist_controls(&mut self) {
        self.persistence.update(self.state.controls);
        if let Err(e) = self.persistence.save() {
            self.logger
                .warn(&format!("Failed to persist controls: {}", e));
        }
    }
}

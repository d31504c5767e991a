use chargectl::config::Config;
use chargectl::controller::{ChargingController, ControllerCommand, ControllerState};
use chargectl::hub::EntityHub;
use chargectl::reconcile::ActuatorOutcome;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn wired_config(dir: &tempfile::TempDir) -> Config {
    let mut config = Config::default();
    config.controller_id = "garage".to_string();
    config.sources.max_import_power = Some("sensor.max_import_power".to_string());
    config.sources.avg_import_power_15min = Some("sensor.avg_import_15min".to_string());
    config.sources.current_l1 = Some("sensor.grid_current_l1".to_string());
    config.sources.voltage_l1 = Some("sensor.grid_voltage_l1".to_string());
    config.sources.charger_current_l1 = Some("sensor.charger_current_l1".to_string());
    config.actuators.charger_switch = Some("switch.charger".to_string());
    config.actuators.charger_current_select = Some("select.charger_current".to_string());
    config.persistence.state_file = dir
        .path()
        .join("state.json")
        .to_string_lossy()
        .into_owned();
    config
}

/// Household importing 3000 W of which the charger draws 1000 W, all on L1
fn household(max_import: &str) -> Arc<EntityHub> {
    let hub = Arc::new(EntityHub::new());
    hub.set_state("sensor.max_import_power", max_import);
    hub.set_state("sensor.avg_import_15min", "4000");
    hub.set_state("sensor.grid_voltage_l1", "230");
    hub.set_state("sensor.grid_current_l1", (3000.0_f64 / 230.0).to_string());
    hub.set_state("sensor.charger_current_l1", (1000.0_f64 / 230.0).to_string());
    hub.set_state("switch.charger", "off");
    hub.upsert(
        "select.charger_current",
        "16",
        ["6", "8", "10", "13", "16", "20", "25", "32"]
            .map(String::from)
            .to_vec(),
    );
    hub
}

fn start(
    config: Config,
    hub: &Arc<EntityHub>,
) -> (ChargingController, mpsc::UnboundedSender<ControllerCommand>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = ChargingController::new(config, hub.clone(), hub.clone(), rx).unwrap();
    (controller, tx)
}

#[tokio::test]
async fn small_headroom_charges_at_floor() {
    let dir = tempfile::tempdir().unwrap();
    let hub = household("5000");
    let (mut controller, _tx) = start(wired_config(&dir), &hub);

    let outcome = controller.tick_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    let breakdown = outcome.evaluation.breakdown;
    assert!((breakdown.base_power - 2000.0).abs() < 1e-6);
    assert!((breakdown.available_power - 3000.0).abs() < 1e-6);
    assert!(outcome.evaluation.decision.allowed);
    assert_eq!(outcome.evaluation.decision.max_current, 6);

    let report = outcome.reconcile.unwrap().await.unwrap();
    assert_eq!(report.switch, ActuatorOutcome::Commanded("on".to_string()));
    assert_eq!(report.selector, ActuatorOutcome::Commanded("6".to_string()));
    assert_eq!(hub.get("switch.charger").unwrap().state, "on");
    assert_eq!(hub.get("select.charger_current").unwrap().state, "6");

    let snapshot = controller.subscribe_snapshot().borrow().clone();
    assert_eq!(snapshot.controller_id, "garage");
    assert!(snapshot.charging_allowed);
    assert_eq!(snapshot.max_current, 6);
    assert_eq!(snapshot.avg_import_power_15min, 4000.0);
}

#[tokio::test]
async fn large_headroom_is_capped_by_user_cap() {
    let dir = tempfile::tempdir().unwrap();
    // 18560 W budget leaves 16560 W, 24 A per phase before the cap
    let hub = household("18560");
    let (mut controller, _tx) = start(wired_config(&dir), &hub);
    controller.set_current_cap(10);

    let outcome = controller.tick_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    assert_eq!(outcome.evaluation.decision.max_current, 10);
    let report = outcome.reconcile.unwrap().await.unwrap();
    assert_eq!(report.selector, ActuatorOutcome::Commanded("10".to_string()));
    assert_eq!(hub.get("select.charger_current").unwrap().state, "10");
}

#[tokio::test]
async fn floor_is_fixed_regardless_of_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chargectl.yaml");
    let mut yaml = serde_yaml::to_string(&wired_config(&dir)).unwrap();
    // Unknown sections from older configs are ignored
    yaml.push_str("controls:\n  min_charging_current: 1\n");
    std::fs::write(&path, yaml).unwrap();
    let config = Config::from_file(&path).unwrap();

    // 2001 W budget against 2000 W base load leaves 1 W of headroom
    let hub = household("2001");
    let (mut controller, _tx) = start(config, &hub);
    let outcome = controller.tick_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    assert!((outcome.evaluation.breakdown.available_power - 1.0).abs() < 1e-6);
    assert_eq!(outcome.evaluation.decision.max_current, 6);
}

#[tokio::test]
async fn repeated_ticks_issue_no_new_commands() {
    let dir = tempfile::tempdir().unwrap();
    let hub = household("5000");
    let (mut controller, _tx) = start(wired_config(&dir), &hub);

    let first = controller.tick_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    assert_eq!(first.reconcile.unwrap().await.unwrap().commands_issued(), 2);

    let second = controller.tick_at(Utc.timestamp_opt(1_700_000_010, 0).unwrap());
    assert_eq!(second.reconcile.unwrap().await.unwrap().commands_issued(), 0);
}

#[tokio::test]
async fn over_budget_turns_charger_off() {
    let dir = tempfile::tempdir().unwrap();
    let hub = household("5000");
    hub.set_state("switch.charger", "on");
    hub.set_state("sensor.avg_import_15min", "5000");
    let (mut controller, _tx) = start(wired_config(&dir), &hub);

    let outcome = controller.tick_at(Utc.timestamp_opt(1_700_000_000, 0).unwrap());
    assert!(!outcome.evaluation.decision.allowed);
    let report = outcome.reconcile.unwrap().await.unwrap();
    assert_eq!(report.switch, ActuatorOutcome::Commanded("off".to_string()));
    assert!(!report.selector.is_command());
    assert_eq!(hub.get("select.charger_current").unwrap().state, "16");
}

#[tokio::test]
async fn controls_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let hub = household("5000");

    let (mut controller, _tx) = start(wired_config(&dir), &hub);
    controller.set_enabled(false);
    controller.set_current_cap(25);
    controller.shutdown().unwrap();

    let (restarted, _tx) = start(wired_config(&dir), &hub);
    let controls = restarted.controls();
    assert!(!controls.enabled);
    assert_eq!(controls.current_cap, 25);
}

#[tokio::test]
async fn run_loop_follows_source_changes_and_commands() {
    let dir = tempfile::tempdir().unwrap();
    let hub = household("5000");
    let (mut controller, tx) = start(wired_config(&dir), &hub);
    let mut snapshots = controller.subscribe_snapshot();
    let changes = hub.subscribe();

    let task = tokio::spawn(async move {
        controller.run(changes).await.unwrap();
        controller
    });

    // First interval tick fires immediately
    tokio::time::timeout(Duration::from_secs(5), async {
        while snapshots.borrow().total_ticks == 0 {
            snapshots.changed().await.unwrap();
        }
    })
    .await
    .unwrap();

    tx.send(ControllerCommand::SetEnabled(false)).unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while snapshots.borrow().enabled {
            snapshots.changed().await.unwrap();
        }
    })
    .await
    .unwrap();
    assert_eq!(snapshots.borrow().max_current, 0);
    assert!(!snapshots.borrow().charging_allowed);

    tx.send(ControllerCommand::Shutdown).unwrap();
    let controller = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(controller.state(), ControllerState::ShuttingDown);
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let hub = household("5000");
    let mut config = wired_config(&dir);
    config.sources.voltage_l1 = None;
    let (_tx, rx) = mpsc::unbounded_channel();
    assert!(ChargingController::new(config, hub.clone(), hub, rx).is_err());
}

use anyhow::{Context, Result};
use chargectl::config::Config;
use chargectl::controller::{ChargingController, ControllerCommand};
use chargectl::hub::EntityHub;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

fn load_config() -> Result<Config> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path))?,
        None => Config::load().context("Failed to load configuration")?,
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    chargectl::logging::init_logging(&config.logging)?;

    info!(
        "chargectl {} starting up (controller {})",
        env!("APP_VERSION"),
        config.controller_id
    );

    let hub = Arc::new(EntityHub::new());
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ControllerCommand>();
    let mut controller = ChargingController::new(config.clone(), hub.clone(), hub.clone(), cmd_rx)
        .map_err(|e| anyhow::anyhow!("Failed to create controller: {}", e))?;

    #[cfg(feature = "web")]
    let web_task = config.web.enabled.then(|| {
        let state = chargectl::web::AppState {
            commands_tx: cmd_tx.clone(),
            snapshot_rx: controller.subscribe_snapshot(),
            status_tx: controller.status_sender(),
            hub: hub.clone(),
            config: Arc::new(config.clone()),
        };
        let (host, port) = (config.web.host.clone(), config.web.port);
        tokio::spawn(async move {
            if let Err(e) = chargectl::web::serve(state, &host, port).await {
                error!("Web server error: {}", e);
            }
        })
    });

    // Ctrl-C becomes a regular shutdown command
    let shutdown_tx = cmd_tx.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                let _ = shutdown_tx.send(ControllerCommand::Shutdown);
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let result = controller.run(hub.subscribe()).await;

    #[cfg(feature = "web")]
    {
        if let Some(task) = web_task {
            task.abort();
        }
    }

    match result {
        Ok(()) => {
            info!("Controller shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!("Controller failed with error: {}", e);
            Err(anyhow::anyhow!("Controller error: {}", e))
        }
    }
}

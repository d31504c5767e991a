//! Persistence of the user controls
//!
//! The enable switch and current cap are written to a small JSON file so they
//! survive restarts. Power windows are never persisted.

use crate::controls::{ChargingControls, DEFAULT_CURRENT_CAP, validate_current_cap};
use crate::error::Result;
use crate::logging::get_logger;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistent state structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentState {
    pub enabled: bool,
    pub current_cap: u32,
}

impl Default for PersistentState {
    fn default() -> Self {
        let controls = ChargingControls::default();
        Self {
            enabled: controls.enabled,
            current_cap: controls.current_cap,
        }
    }
}

impl From<ChargingControls> for PersistentState {
    fn from(c: ChargingControls) -> Self {
        Self {
            enabled: c.enabled,
            current_cap: c.current_cap,
        }
    }
}

/// Persistence manager
pub struct PersistenceManager {
    file_path: PathBuf,
    state: PersistentState,
    logger: crate::logging::StructuredLogger,
}

impl PersistenceManager {
    pub fn new(file_path: impl AsRef<Path>) -> Self {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
            state: PersistentState::default(),
            logger: get_logger("persistence"),
        }
    }

    /// Start from the given state instead of the built-in defaults
    pub fn with_state(mut self, state: PersistentState) -> Self {
        self.state = state;
        self
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Load state from disk. A missing file keeps the current state; a cap
    /// outside the accepted range is replaced by the default cap.
    pub fn load(&mut self) -> Result<()> {
        if !self.file_path.exists() {
            self.logger
                .info("No persistent state file found, using defaults");
            return Ok(());
        }

        let contents = std::fs::read_to_string(&self.file_path)?;
        let mut state: PersistentState = serde_json::from_str(&contents)?;
        if let Err(e) = validate_current_cap(state.current_cap) {
            self.logger.warn(&format!(
                "Restored current cap rejected ({}), using {} A",
                e, DEFAULT_CURRENT_CAP
            ));
            state.current_cap = DEFAULT_CURRENT_CAP;
        }
        self.state = state;
        self.logger.info(&format!(
            "Loaded persistent state: enabled={}, current_cap={} A",
            state.enabled, state.current_cap
        ));
        Ok(())
    }

    /// Save state to disk, creating the parent directory when needed
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.file_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(&self.file_path, contents)?;
        self.logger.debug("Saved persistent state to disk");
        Ok(())
    }

    pub fn state(&self) -> PersistentState {
        self.state
    }

    pub fn controls(&self) -> ChargingControls {
        ChargingControls {
            enabled: self.state.enabled,
            current_cap: self.state.current_cap,
        }
    }

    pub fn update(&mut self, controls: ChargingControls) {
        self.state = controls.into();
    }
}

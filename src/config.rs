//! Configuration management for chargectl
//!
//! This module handles loading, validation, and management of the controller
//! configuration from YAML files.

use crate::error::{ChargeCtlError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

mod defaults;

/// Allowed range for the polling interval in seconds
pub const UPDATE_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 5..=60;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct Config {
    /// Identifier of this controller instance, used in logs and status
    pub controller_id: String,

    /// Polling interval in seconds (5..=60)
    pub update_interval_seconds: u64,

    /// Entity ids of the numeric readings
    pub sources: SourcesConfig,

    /// Entity ids of the charger actuators (both optional)
    pub actuators: ActuatorsConfig,

    /// Substitutes for missing readings and initial user controls
    pub defaults: DefaultsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Web server binding configuration
    pub web: WebConfig,

    /// Where user controls are persisted
    pub persistence: PersistenceConfig,
}

/// Entity ids for every reading the engine consumes.
///
/// `None` means the reading is not wired and its default applies.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct SourcesConfig {
    /// Maximum allowed import power (W)
    pub max_import_power: Option<String>,

    /// 15-minute average import power (W), metered externally
    pub avg_import_power_15min: Option<String>,

    /// Grid currents L1..L3 (A)
    pub current_l1: Option<String>,
    pub current_l2: Option<String>,
    pub current_l3: Option<String>,

    /// Grid voltages L1..L3 (V)
    pub voltage_l1: Option<String>,
    pub voltage_l2: Option<String>,
    pub voltage_l3: Option<String>,

    /// Charger's own currents L1..L3 (A)
    pub charger_current_l1: Option<String>,
    pub charger_current_l2: Option<String>,
    pub charger_current_l3: Option<String>,
}

/// Charger actuators
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct ActuatorsConfig {
    /// On/off switch that starts and stops charging
    pub charger_switch: Option<String>,

    /// Discrete current-level selector
    pub charger_current_select: Option<String>,
}

/// Default values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct DefaultsConfig {
    /// Substitute for missing power and current readings
    pub reading: f64,

    /// Substitute for missing voltage readings
    pub voltage: f64,

    /// Initial state of the enable toggle when nothing is persisted
    pub enabled: bool,

    /// Initial current cap when nothing is persisted
    pub current_cap: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional override for the console layer
    pub console_level: Option<String>,

    /// Optional override for the file layer
    pub file_level: Option<String>,

    /// Optional override for the web log stream
    pub web_level: Option<String>,

    /// Path to log file
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct WebConfig {
    /// Whether to start the HTTP API
    pub enabled: bool,

    /// Bind address
    pub host: String,

    /// TCP port
    pub port: u16,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(schemars::JsonSchema))]
#[serde(default)]
pub struct PersistenceConfig {
    /// JSON file holding the enable toggle and current cap
    pub state_file: String,
}

impl SourcesConfig {
    /// Every configured source id
    pub fn tracked_ids(&self) -> Vec<String> {
        [
            &self.max_import_power,
            &self.avg_import_power_15min,
            &self.current_l1,
            &self.current_l2,
            &self.current_l3,
            &self.voltage_l1,
            &self.voltage_l2,
            &self.voltage_l3,
            &self.charger_current_l1,
            &self.charger_current_l2,
            &self.charger_current_l3,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect()
    }
}

impl ActuatorsConfig {
    /// Whether any actuator is wired
    pub fn any(&self) -> bool {
        self.charger_switch.is_some() || self.charger_current_select.is_some()
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "chargectl.yaml",
            "/data/chargectl.yaml",
            "/etc/chargectl/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Polling interval as a `Duration`
    pub fn update_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.update_interval_seconds)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.controller_id.trim().is_empty() {
            return Err(ChargeCtlError::validation(
                "controller_id",
                "Must not be empty",
            ));
        }

        let required = [
            ("sources.max_import_power", &self.sources.max_import_power),
            (
                "sources.avg_import_power_15min",
                &self.sources.avg_import_power_15min,
            ),
            ("sources.current_l1", &self.sources.current_l1),
            ("sources.voltage_l1", &self.sources.voltage_l1),
        ];
        for (field, value) in required {
            if value.as_deref().is_none_or(|id| id.trim().is_empty()) {
                return Err(ChargeCtlError::validation(field, "Required source is missing"));
            }
        }

        if !UPDATE_INTERVAL_RANGE.contains(&self.update_interval_seconds) {
            return Err(ChargeCtlError::validation(
                "update_interval_seconds",
                "Must be between 5 and 60",
            ));
        }

        if !crate::controls::CURRENT_CAP_RANGE.contains(&self.defaults.current_cap) {
            return Err(ChargeCtlError::validation(
                "defaults.current_cap",
                "Must be between 6 and 32",
            ));
        }

        if !(self.defaults.voltage.is_finite() && self.defaults.voltage > 0.0) {
            return Err(ChargeCtlError::validation(
                "defaults.voltage",
                "Must be positive",
            ));
        }

        if self.web.enabled && self.web.port == 0 {
            return Err(ChargeCtlError::validation(
                "web.port",
                "Port must be greater than 0",
            ));
        }

        Ok(())
    }
}

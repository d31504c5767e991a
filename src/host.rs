//! Seams between the decision core and whatever hosts the charger entities
//!
//! The core only ever reads numeric states, reads actuator states and issues
//! commands. `crate::hub::EntityHub` is the in-process implementation; other
//! hosts implement the same traits.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Outcome of reading one numeric source
#[derive(Debug, Clone, PartialEq)]
pub enum NumericReading {
    /// A finite number
    Value(f64),
    /// Entity missing, `unknown` or `unavailable`
    Unavailable,
    /// Entity present but its state is not a finite number
    Invalid(String),
}

impl NumericReading {
    /// Classify a raw state string the way the host reports it
    pub fn from_state(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("unknown")
            || trimmed.eq_ignore_ascii_case("unavailable")
        {
            return NumericReading::Unavailable;
        }
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() => NumericReading::Value(v),
            _ => NumericReading::Invalid(raw.to_string()),
        }
    }
}

/// Reported state of an on/off actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    On,
    Off,
    Unavailable,
}

impl SwitchState {
    pub fn from_state(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "on" => SwitchState::On,
            "off" => SwitchState::Off,
            _ => SwitchState::Unavailable,
        }
    }
}

/// Reported state of a discrete selector: the current option and every
/// option it accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorState {
    pub current: String,
    pub options: Vec<String>,
}

/// Read access to numeric sensor states
pub trait SensorReader: Send + Sync {
    fn read_numeric(&self, entity_id: &str) -> NumericReading;
}

/// Read and command access to the charger actuators.
///
/// State reads are synchronous snapshots; commands may wait for the host to
/// acknowledge.
#[async_trait::async_trait]
pub trait ActuatorPort: Send + Sync {
    fn switch_state(&self, entity_id: &str) -> SwitchState;

    async fn command_switch(&self, entity_id: &str, on: bool) -> Result<()>;

    fn selector_state(&self, entity_id: &str) -> Option<SelectorState>;

    async fn command_selector(&self, entity_id: &str, option: &str) -> Result<()>;
}

//! Charging decision engine
//!
//! Two independent outputs are recomputed from scratch on every evaluation:
//!
//! - `allowed`: the externally metered 15-minute average import must stay
//!   strictly below the import budget. A budget of zero or less never allows
//!   charging.
//! - `max_current`: headroom from the 30-second average, with the charger's
//!   own draw removed, spread evenly over three phases. Any positive headroom
//!   requests at least the charging floor; the user cap bounds it from above.
//!
//! Arithmetic faults never escape: the affected output falls back to its
//! conservative value and the fault is logged.

use crate::controls::MIN_CHARGING_CURRENT;
use crate::error::{ChargeCtlError, Result};
use crate::logging::{StructuredLogger, get_logger};
use crate::power::{ReadingSet, average_voltage, charger_power, total_power};
use serde::{Deserialize, Serialize};

/// Output of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeDecision {
    pub allowed: bool,
    pub max_current: u32,
}

impl ChargeDecision {
    pub const CONSERVATIVE: ChargeDecision = ChargeDecision {
        allowed: false,
        max_current: 0,
    };

    /// The decision as the user-facing outputs report it: a disabled
    /// controller never allows charging and reports no current.
    pub fn gated(self, enabled: bool) -> ChargeDecision {
        if enabled {
            self
        } else {
            ChargeDecision::CONSERVATIVE
        }
    }

    /// Whether the charger should be running
    pub fn should_charge(&self, enabled: bool) -> bool {
        enabled && self.allowed
    }
}

/// Intermediate values of the current computation, reported in status
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionBreakdown {
    /// Power average actually used (window or instantaneous fallback)
    pub avg_power_30s: f64,
    /// True when the short window had no samples yet
    pub used_instantaneous_power: bool,
    pub charger_power: f64,
    /// Household power without the charger
    pub base_power: f64,
    pub available_power: f64,
    pub average_voltage: f64,
}

/// Decision together with how the current was derived
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: ChargeDecision,
    pub breakdown: DecisionBreakdown,
}

pub struct DecisionEngine {
    logger: StructuredLogger,
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self {
            logger: get_logger("engine"),
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Evaluate both outputs. `avg_power_30s` is the short window's average,
    /// `None` while the window is empty.
    pub fn evaluate(
        &self,
        readings: &ReadingSet,
        avg_power_30s: Option<f64>,
        current_cap: u32,
    ) -> Evaluation {
        let allowed = self.charging_allowed(readings);
        let (max_current, breakdown) =
            match self.try_max_current(readings, avg_power_30s, current_cap) {
                Ok(result) => result,
                Err(e) => {
                    self.logger
                        .error(&format!("Error calculating max charging current: {}", e));
                    (0, DecisionBreakdown::default())
                }
            };
        Evaluation {
            decision: ChargeDecision {
                allowed,
                max_current,
            },
            breakdown,
        }
    }

    /// Budget compliance over the 15-minute average
    pub fn charging_allowed(&self, readings: &ReadingSet) -> bool {
        match Self::try_charging_allowed(readings) {
            Ok(allowed) => allowed,
            Err(e) => {
                self.logger
                    .error(&format!("Error calculating charging allowed: {}", e));
                false
            }
        }
    }

    /// Headroom current only
    pub fn max_current(
        &self,
        readings: &ReadingSet,
        avg_power_30s: Option<f64>,
        current_cap: u32,
    ) -> u32 {
        self.evaluate(readings, avg_power_30s, current_cap)
            .decision
            .max_current
    }

    fn try_charging_allowed(readings: &ReadingSet) -> Result<bool> {
        let max_import = finite("max_import_power", readings.max_import_power)?;
        let avg_import = finite("avg_import_power_15min", readings.avg_import_power_15min)?;
        if max_import <= 0.0 {
            return Ok(false);
        }
        Ok(avg_import < max_import)
    }

    fn try_max_current(
        &self,
        readings: &ReadingSet,
        avg_power_30s: Option<f64>,
        current_cap: u32,
    ) -> Result<(u32, DecisionBreakdown)> {
        let max_import = finite("max_import_power", readings.max_import_power)?;
        let (avg_power, used_instantaneous_power) = match avg_power_30s {
            Some(avg) => (finite("avg_power_30s", avg)?, false),
            None => (finite("total_power", total_power(readings))?, true),
        };
        let charger = finite("charger_power", charger_power(readings))?;
        let base_power = avg_power - charger;
        let available_power = max_import - base_power;

        let mut breakdown = DecisionBreakdown {
            avg_power_30s: avg_power,
            used_instantaneous_power,
            charger_power: charger,
            base_power,
            available_power,
            average_voltage: 0.0,
        };

        if available_power <= 0.0 {
            return Ok((0, breakdown));
        }

        let avg_voltage = average_voltage(readings);
        if !(avg_voltage.is_finite() && avg_voltage > 0.0) {
            return Err(ChargeCtlError::computation(format!(
                "average voltage {} cannot carry current",
                avg_voltage
            )));
        }
        breakdown.average_voltage = avg_voltage;

        // Balanced three-phase approximation: P = 3 * U * I
        let per_phase = finite("current_per_phase", available_power / (3.0 * avg_voltage))?;
        Ok((Self::clamp_current(per_phase, current_cap), breakdown))
    }

    /// Floor to whole amperes, raise to the charging floor, cap from above
    fn clamp_current(per_phase: f64, current_cap: u32) -> u32 {
        // `as` saturates, anything beyond u32 ends up capped anyway
        let floored = per_phase.floor().max(0.0) as u32;
        if floored < MIN_CHARGING_CURRENT {
            MIN_CHARGING_CURRENT
        } else if floored > current_cap {
            current_cap
        } else {
            floored
        }
    }
}

fn finite(what: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ChargeCtlError::computation(format!(
            "{} is not finite ({})",
            what, value
        )))
    }
}

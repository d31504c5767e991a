//! User-adjustable charging controls
//!
//! Two controls exist: the enable switch and the user current cap. Both are
//! persisted and survive restarts.

use crate::error::{ChargeCtlError, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Accepted user current caps in amperes
pub const CURRENT_CAP_RANGE: RangeInclusive<u32> = 6..=32;

/// Practical charging floor: any positive headroom requests at least this
pub const MIN_CHARGING_CURRENT: u32 = 6;

/// Cap applied on first start and when a restored cap is out of range
pub const DEFAULT_CURRENT_CAP: u32 = 16;

/// Enable switch plus current cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ChargingControls {
    pub enabled: bool,
    pub current_cap: u32,
}

impl Default for ChargingControls {
    fn default() -> Self {
        Self {
            enabled: true,
            current_cap: DEFAULT_CURRENT_CAP,
        }
    }
}

impl ChargingControls {
    pub fn new(enabled: bool, current_cap: u32) -> Result<Self> {
        let mut controls = Self {
            enabled,
            ..Self::default()
        };
        controls.set_current_cap(current_cap)?;
        Ok(controls)
    }

    /// Returns true when the value changed
    pub fn set_enabled(&mut self, enabled: bool) -> bool {
        let changed = self.enabled != enabled;
        self.enabled = enabled;
        changed
    }

    /// Set the cap; values outside [`CURRENT_CAP_RANGE`] are rejected and
    /// leave the cap untouched.
    pub fn set_current_cap(&mut self, amps: u32) -> Result<bool> {
        validate_current_cap(amps)?;
        let changed = self.current_cap != amps;
        self.current_cap = amps;
        Ok(changed)
    }
}

pub fn validate_current_cap(amps: u32) -> Result<()> {
    if CURRENT_CAP_RANGE.contains(&amps) {
        Ok(())
    } else {
        Err(ChargeCtlError::validation(
            "current_cap".to_string(),
            format!(
                "{} A is outside {}..={} A",
                amps,
                CURRENT_CAP_RANGE.start(),
                CURRENT_CAP_RANGE.end()
            ),
        ))
    }
}

/// Selectable cap options as the host presents them ("6" .. "32")
pub fn cap_options() -> Vec<String> {
    CURRENT_CAP_RANGE.map(|a| a.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ChargingControls::default();
        assert!(c.enabled);
        assert_eq!(c.current_cap, 16);
    }

    #[test]
    fn cap_bounds_are_inclusive() {
        let mut c = ChargingControls::default();
        assert!(c.set_current_cap(6).is_ok());
        assert!(c.set_current_cap(32).is_ok());
        assert_eq!(c.current_cap, 32);
    }

    #[test]
    fn out_of_range_cap_is_rejected_and_ignored() {
        let mut c = ChargingControls::default();
        assert!(c.set_current_cap(5).is_err());
        assert!(c.set_current_cap(33).is_err());
        assert_eq!(c.current_cap, 16);
        assert!(ChargingControls::new(true, 0).is_err());
    }

    #[test]
    fn rejected_cap_names_field_and_range() {
        let err = validate_current_cap(40).unwrap_err();
        assert!(matches!(err, ChargeCtlError::Validation { ref field, .. } if field == "current_cap"));
        assert_eq!(
            err.to_string(),
            "Validation error: current_cap - 40 A is outside 6..=32 A"
        );
    }

    #[test]
    fn change_detection() {
        let mut c = ChargingControls::default();
        assert!(!c.set_enabled(true));
        assert!(c.set_enabled(false));
        assert!(!c.set_current_cap(16).unwrap_or(true));
        assert!(c.set_current_cap(20).unwrap_or(false));
    }

    #[test]
    fn options_cover_range() {
        let opts = cap_options();
        assert_eq!(opts.len(), 27);
        assert_eq!(opts.first().map(String::as_str), Some("6"));
        assert_eq!(opts.last().map(String::as_str), Some("32"));
    }
}

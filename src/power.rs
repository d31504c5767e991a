//! Per-phase power model
//!
//! Readings are collected once per evaluation into a [`ReadingSet`]; every
//! missing or malformed source has already been replaced by its default, so
//! the power functions are total.

use crate::config::{DefaultsConfig, SourcesConfig};
use crate::host::{NumericReading, SensorReader};
use crate::logging::StructuredLogger;
use serde::{Deserialize, Serialize};

/// One value per phase
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseTriplet {
    pub l1: f64,
    pub l2: f64,
    pub l3: f64,
}

impl PhaseTriplet {
    pub const fn new(l1: f64, l2: f64, l3: f64) -> Self {
        Self { l1, l2, l3 }
    }

    pub const fn splat(v: f64) -> Self {
        Self::new(v, v, v)
    }

    pub fn sum(&self) -> f64 {
        self.l1 + self.l2 + self.l3
    }

    pub fn mean(&self) -> f64 {
        self.sum() / 3.0
    }

    /// Phase-wise product
    pub fn dot(&self, other: &PhaseTriplet) -> f64 {
        self.l1 * other.l1 + self.l2 * other.l2 + self.l3 * other.l3
    }
}

/// Snapshot of every sensor value used by one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadingSet {
    /// Import budget (W)
    pub max_import_power: f64,
    /// Externally metered 15-minute average import (W)
    pub avg_import_power_15min: f64,
    /// Grid currents (A, signed; negative = export)
    pub currents: PhaseTriplet,
    /// Grid voltages (V)
    pub voltages: PhaseTriplet,
    /// Charger's own currents (A)
    pub charger_currents: PhaseTriplet,
}

impl Default for ReadingSet {
    fn default() -> Self {
        Self {
            max_import_power: 0.0,
            avg_import_power_15min: 0.0,
            currents: PhaseTriplet::default(),
            voltages: PhaseTriplet::splat(230.0),
            charger_currents: PhaseTriplet::default(),
        }
    }
}

impl ReadingSet {
    /// Read every configured source, substituting defaults for anything
    /// unwired, unavailable or non-numeric.
    pub fn collect(
        reader: &dyn SensorReader,
        sources: &SourcesConfig,
        defaults: &DefaultsConfig,
        logger: &StructuredLogger,
    ) -> Self {
        let read = |id: &Option<String>, default: f64| read_or_default(reader, id, default, logger);
        let r = defaults.reading;
        let v = defaults.voltage;

        Self {
            max_import_power: read(&sources.max_import_power, r),
            avg_import_power_15min: read(&sources.avg_import_power_15min, r),
            currents: PhaseTriplet::new(
                read(&sources.current_l1, r),
                read(&sources.current_l2, r),
                read(&sources.current_l3, r),
            ),
            voltages: PhaseTriplet::new(
                read(&sources.voltage_l1, v),
                read(&sources.voltage_l2, v),
                read(&sources.voltage_l3, v),
            ),
            charger_currents: PhaseTriplet::new(
                read(&sources.charger_current_l1, r),
                read(&sources.charger_current_l2, r),
                read(&sources.charger_current_l3, r),
            ),
        }
    }
}

fn read_or_default(
    reader: &dyn SensorReader,
    entity_id: &Option<String>,
    default: f64,
    logger: &StructuredLogger,
) -> f64 {
    let Some(id) = entity_id.as_deref() else {
        return default;
    };
    match reader.read_numeric(id) {
        NumericReading::Value(v) => v,
        NumericReading::Unavailable => default,
        NumericReading::Invalid(raw) => {
            logger.warn(&format!(
                "Could not convert state of {} to a number: {:?}",
                id, raw
            ));
            default
        }
    }
}

/// Net household power in watts (positive = import, negative = export)
pub fn total_power(readings: &ReadingSet) -> f64 {
    readings.voltages.dot(&readings.currents)
}

/// Power already drawn by the charger itself
pub fn charger_power(readings: &ReadingSet) -> f64 {
    readings.voltages.dot(&readings.charger_currents)
}

pub fn average_voltage(readings: &ReadingSet) -> f64 {
    readings.voltages.mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::get_logger;
    use std::collections::HashMap;

    struct MapReader(HashMap<&'static str, &'static str>);

    impl SensorReader for MapReader {
        fn read_numeric(&self, entity_id: &str) -> NumericReading {
            self.0
                .get(entity_id)
                .map_or(NumericReading::Unavailable, |s| NumericReading::from_state(s))
        }
    }

    #[test]
    fn total_power_sums_phases() {
        let r = ReadingSet {
            currents: PhaseTriplet::new(10.0, 5.0, -2.0),
            voltages: PhaseTriplet::new(230.0, 231.0, 229.0),
            ..Default::default()
        };
        let expected = 230.0 * 10.0 + 231.0 * 5.0 - 229.0 * 2.0;
        assert!((total_power(&r) - expected).abs() < 1e-9);
    }

    #[test]
    fn export_is_negative() {
        let r = ReadingSet {
            currents: PhaseTriplet::splat(-4.0),
            ..Default::default()
        };
        assert!((total_power(&r) + 3.0 * 230.0 * 4.0).abs() < 1e-9);
    }

    #[test]
    fn charger_power_uses_charger_currents() {
        let r = ReadingSet {
            currents: PhaseTriplet::splat(20.0),
            charger_currents: PhaseTriplet::new(16.0, 16.0, 0.0),
            ..Default::default()
        };
        assert!((charger_power(&r) - 2.0 * 230.0 * 16.0).abs() < 1e-9);
    }

    #[test]
    fn collect_applies_defaults() {
        let reader = MapReader(HashMap::from([
            ("sensor.max", "5000"),
            ("sensor.avg", "unavailable"),
            ("sensor.l1", "12.5"),
            ("sensor.v1", "garbage"),
            ("sensor.v2", "232"),
        ]));
        let sources = SourcesConfig {
            max_import_power: Some("sensor.max".into()),
            avg_import_power_15min: Some("sensor.avg".into()),
            current_l1: Some("sensor.l1".into()),
            voltage_l1: Some("sensor.v1".into()),
            voltage_l2: Some("sensor.v2".into()),
            charger_current_l1: Some("sensor.missing".into()),
            ..Default::default()
        };
        let r = ReadingSet::collect(
            &reader,
            &sources,
            &DefaultsConfig::default(),
            &get_logger("test"),
        );
        assert_eq!(r.max_import_power, 5000.0);
        assert_eq!(r.avg_import_power_15min, 0.0);
        assert_eq!(r.currents, PhaseTriplet::new(12.5, 0.0, 0.0));
        assert_eq!(r.voltages, PhaseTriplet::new(230.0, 232.0, 230.0));
        assert_eq!(r.charger_currents, PhaseTriplet::default());
    }
}

use crate::controls::ChargingControls;
use crate::window::{BUDGET_WINDOW_SECS, PowerWindow, SHORT_WINDOW_SECS};
use chrono::{DateTime, Utc};

/// Mutable state owned by one controller: user controls, both power windows
/// and the time of the last recompute.
#[derive(Debug, Clone)]
pub struct ControlState {
    pub controls: ChargingControls,
    pub window_short: PowerWindow,
    pub window_budget: PowerWindow,
    pub last_update: Option<DateTime<Utc>>,
}

impl ControlState {
    pub fn new(controls: ChargingControls) -> Self {
        Self {
            controls,
            window_short: PowerWindow::from_secs(SHORT_WINDOW_SECS),
            window_budget: PowerWindow::from_secs(BUDGET_WINDOW_SECS),
            last_update: None,
        }
    }

    /// Feed one total-power sample into both windows
    pub fn record_sample(&mut self, power: f64, timestamp: DateTime<Utc>) {
        self.window_short.add(power, timestamp);
        self.window_budget.add(power, timestamp);
    }

    /// Debounce for change notifications: true when nothing was computed yet
    /// or at least `min_gap` has passed since the last recompute.
    pub fn due(&self, now: DateTime<Utc>, min_gap: chrono::Duration) -> bool {
        match self.last_update {
            None => true,
            Some(last) => now.signed_duration_since(last) >= min_gap,
        }
    }

    pub fn clear_windows(&mut self) {
        self.window_short.clear();
        self.window_budget.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn samples_reach_both_windows() {
        let mut s = ControlState::new(ChargingControls::default());
        s.record_sample(1000.0, t(0));
        s.record_sample(3000.0, t(60));
        assert_eq!(s.window_short.average(t(60)), Some(3000.0));
        assert_eq!(s.window_budget.average(t(60)), Some(2000.0));
        s.clear_windows();
        assert!(s.window_short.is_empty() && s.window_budget.is_empty());
    }

    #[test]
    fn debounce() {
        let mut s = ControlState::new(ChargingControls::default());
        let gap = Duration::seconds(10);
        assert!(s.due(t(0), gap));
        s.last_update = Some(t(0));
        assert!(!s.due(t(9), gap));
        assert!(s.due(t(10), gap));
    }
}

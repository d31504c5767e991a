use crate::engine::{ChargeDecision, DecisionBreakdown, Evaluation};
use crate::reconcile::ReconcileReport;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

/// Lifecycle of a controller instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Initializing,
    Running,
    ShuttingDown,
}

/// Commands accepted by the controller from external components (web, etc.)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerCommand {
    SetEnabled(bool),
    SetCurrentCap(u32),
    /// Evaluate and reconcile right away, outside the timer
    UpdateCharger,
    Shutdown,
}

/// Everything the status endpoints report
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ControllerSnapshot {
    pub timestamp: String,
    pub controller_id: String,
    pub controller_state: String,
    /// Budget compliance, false while disabled
    pub charging_allowed: bool,
    /// Headroom current in amperes, 0 while disabled
    pub max_current: u32,
    /// Engine output before the enable switch is applied
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub decision: ChargeDecision,
    pub enabled: bool,
    pub current_cap: u32,
    /// Short window average, `None` while the window is empty
    pub avg_power_30s: Option<f64>,
    /// Internally tracked budget window average
    pub avg_power_15min: Option<f64>,
    /// Externally metered 15-minute average used for the budget check
    pub avg_import_power_15min: f64,
    pub max_import_power: f64,
    pub current_power: f64,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub breakdown: DecisionBreakdown,
    pub charger_switch_configured: bool,
    pub charger_current_select_configured: bool,
    pub last_update: Option<String>,
    pub total_ticks: u64,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub last_reconcile: Option<ReconcileReport>,
}

/// Result of one timer tick
pub struct TickOutcome {
    pub evaluation: Evaluation,
    /// Pending reconciliation, `None` when no actuator is configured
    pub reconcile: Option<JoinHandle<ReconcileReport>>,
}

//! # chargectl - import-budget aware EV charging controller
//!
//! Decides every polling interval whether an EV charger may run and at what
//! per-phase current, so that household grid import stays inside a power
//! budget, then drives the charger's on/off switch and current selector to
//! match.
//!
//! ## Architecture
//!
//! Data flows one way: readings, power model, rolling windows, decision,
//! actuator commands.
//!
//! - `window`: sliding time windows over power samples
//! - `power`: per-phase power model and reading collection
//! - `engine`: budget check and headroom current computation
//! - `reconcile`: idempotent actuator commands
//! - `controller`: the task that owns windows and controls and drives it all
//! - `host`: traits the core uses to read sensors and command actuators
//! - `hub`: in-process entity store implementing those traits
//! - `controls` / `persistence`: user controls and their storage
//! - `config`, `logging`, `error`: ambient plumbing
//! - `web`: HTTP API (feature `web`)

pub mod config;
pub mod controller;
pub mod controls;
pub mod engine;
pub mod error;
pub mod host;
pub mod hub;
pub mod logging;
pub mod persistence;
pub mod power;
pub mod reconcile;
#[cfg(feature = "web")]
pub mod web;
pub mod window;


// Re-export commonly used types
pub use config::Config;
pub use controller::{ChargingController, ControllerCommand};
pub use error::{ChargeCtlError, Result};

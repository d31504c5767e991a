//! In-process entity store
//!
//! Holds the last published state of every entity the controller reads or
//! commands. External bridges push sensor values in (HTTP `PUT
//! /api/entities/{id}`), the controller reads them through [`SensorReader`]
//! and commands actuators through [`ActuatorPort`]. Every change is
//! announced on a broadcast channel carrying the entity id.

use crate::error::{ChargeCtlError, Result};
use crate::host::{ActuatorPort, NumericReading, SelectorState, SensorReader, SwitchState};
use crate::logging::{StructuredLogger, get_logger};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Last known state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EntityState {
    pub state: String,
    /// Valid options for selector entities, empty otherwise
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub last_changed: DateTime<Utc>,
}

pub struct EntityHub {
    entities: RwLock<HashMap<String, EntityState>>,
    changes_tx: broadcast::Sender<String>,
    logger: StructuredLogger,
}

impl Default for EntityHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityHub {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            entities: RwLock::new(HashMap::new()),
            changes_tx,
            logger: get_logger("hub"),
        }
    }

    /// Receive the id of every entity whose state changes from now on
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes_tx.subscribe()
    }

    /// Set an entity's state, keeping its options. Returns true when the
    /// state actually changed.
    pub fn set_state(&self, entity_id: &str, state: impl Into<String>) -> bool {
        self.write_entity(entity_id, state.into(), None)
    }

    /// Set an entity's state and replace its option list
    pub fn upsert(&self, entity_id: &str, state: impl Into<String>, options: Vec<String>) -> bool {
        self.write_entity(entity_id, state.into(), Some(options))
    }

    pub fn get(&self, entity_id: &str) -> Option<EntityState> {
        self.entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(entity_id)
            .cloned()
    }

    /// Copy of all entities, sorted by id
    pub fn snapshot(&self) -> Vec<(String, EntityState)> {
        let mut all: Vec<_> = self
            .entities
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, state)| (id.clone(), state.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn remove(&self, entity_id: &str) -> bool {
        let removed = self
            .entities
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(entity_id)
            .is_some();
        if removed {
            self.notify(entity_id);
        }
        removed
    }

    fn write_entity(&self, entity_id: &str, state: String, options: Option<Vec<String>>) -> bool {
        let changed = {
            let mut entities = self
                .entities
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            match entities.get_mut(entity_id) {
                Some(existing) => {
                    let options_changed = options
                        .as_ref()
                        .is_some_and(|o| *o != existing.options);
                    let changed = existing.state != state || options_changed;
                    if changed {
                        existing.state = state;
                        if let Some(o) = options {
                            existing.options = o;
                        }
                        existing.last_changed = Utc::now();
                    }
                    changed
                }
                None => {
                    entities.insert(
                        entity_id.to_string(),
                        EntityState {
                            state,
                            options: options.unwrap_or_default(),
                            last_changed: Utc::now(),
                        },
                    );
                    true
                }
            }
        };
        if changed {
            self.notify(entity_id);
        }
        changed
    }

    fn notify(&self, entity_id: &str) {
        // No receivers is fine
        let _ = self.changes_tx.send(entity_id.to_string());
    }
}

impl SensorReader for EntityHub {
    fn read_numeric(&self, entity_id: &str) -> NumericReading {
        match self.get(entity_id) {
            Some(entity) => NumericReading::from_state(&entity.state),
            None => NumericReading::Unavailable,
        }
    }
}

#[async_trait::async_trait]
impl ActuatorPort for EntityHub {
    fn switch_state(&self, entity_id: &str) -> SwitchState {
        self.get(entity_id)
            .map_or(SwitchState::Unavailable, |e| SwitchState::from_state(&e.state))
    }

    async fn command_switch(&self, entity_id: &str, on: bool) -> Result<()> {
        if self.get(entity_id).is_none() {
            return Err(ChargeCtlError::actuator(entity_id, "entity not found"));
        }
        let target = if on { "on" } else { "off" };
        self.set_state(entity_id, target);
        self.logger
            .debug(&format!("switch {} -> {}", entity_id, target));
        Ok(())
    }

    fn selector_state(&self, entity_id: &str) -> Option<SelectorState> {
        let entity = self.get(entity_id)?;
        if entity.state.eq_ignore_ascii_case("unavailable") {
            return None;
        }
        Some(SelectorState {
            current: entity.state,
            options: entity.options,
        })
    }

    async fn command_selector(&self, entity_id: &str, option: &str) -> Result<()> {
        let Some(entity) = self.get(entity_id) else {
            return Err(ChargeCtlError::actuator(entity_id, "entity not found"));
        };
        if !entity.options.iter().any(|o| o == option) {
            return Err(ChargeCtlError::actuator(
                entity_id,
                format!("option {:?} is not one of {:?}", option, entity.options),
            ));
        }
        self.set_state(entity_id, option);
        self.logger
            .debug(&format!("select {} -> {}", entity_id, option));
        Ok(())
    }
}

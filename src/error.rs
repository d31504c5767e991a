//! Error types and handling for chargectl
//!
//! Only the outer layers (configuration, persistence, actuator commands, web)
//! surface these errors. The decision core degrades instead of failing.

use thiserror::Error;

/// Result type alias for chargectl operations
pub type Result<T> = std::result::Result<T, ChargeCtlError>;

/// Main error type for chargectl
#[derive(Debug, Error)]
pub enum ChargeCtlError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// An actuator rejected a command or could not be reached
    #[error("Actuator error: {entity_id} - {message}")]
    Actuator { entity_id: String, message: String },

    /// A source or actuator has no usable state
    #[error("Unavailable: {entity_id}")]
    Unavailable { entity_id: String },

    /// Arithmetic fault inside the decision engine
    #[error("Computation error: {message}")]
    Computation { message: String },

    /// HTTP/Web server errors
    #[error("Web server error: {message}")]
    Web { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl ChargeCtlError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ChargeCtlError::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ChargeCtlError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ChargeCtlError::Io {
            message: message.into(),
        }
    }

    /// Create a new actuator error
    pub fn actuator<S: Into<String>, M: Into<String>>(entity_id: S, message: M) -> Self {
        ChargeCtlError::Actuator {
            entity_id: entity_id.into(),
            message: message.into(),
        }
    }

    /// Create a new unavailable error
    pub fn unavailable<S: Into<String>>(entity_id: S) -> Self {
        ChargeCtlError::Unavailable {
            entity_id: entity_id.into(),
        }
    }

    /// Create a new computation error
    pub fn computation<S: Into<String>>(message: S) -> Self {
        ChargeCtlError::Computation {
            message: message.into(),
        }
    }

    /// Create a new web error
    pub fn web<S: Into<String>>(message: S) -> Self {
        ChargeCtlError::Web {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        ChargeCtlError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ChargeCtlError {
    fn from(err: std::io::Error) -> Self {
        ChargeCtlError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ChargeCtlError {
    fn from(err: serde_yaml::Error) -> Self {
        ChargeCtlError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ChargeCtlError {
    fn from(err: serde_json::Error) -> Self {
        ChargeCtlError::Serialization {
            message: err.to_string(),
        }
    }
}

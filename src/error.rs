//! Error types for shipment tracking and anomaly detection

use thiserror::Error;

/// Errors surfaced by the store, configuration and outlier model layers.
///
/// The detector core itself never fails: malformed deltas are dropped and
/// small populations produce a no-signal outcome.
#[derive(Error, Debug)]
pub enum ShipwatchError {
    #[error("Unknown shipment: {0}")]
    UnknownShipment(String),

    #[error("Invalid shipment state: {0}")]
    InvalidState(String),

    #[error("Invalid transition key '{0}' (expected FROM->TO)")]
    InvalidTransitionKey(String),

    #[error("Shipment {shipment_id} is already in state {state}")]
    InvalidTransition { shipment_id: String, state: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Outlier model failed: {0}")]
    OutlierModel(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ShipwatchError>;

//! Shipwatch - transition-time anomaly detection for tracked shipments
//!
//! Every time a shipment changes status, the elapsed time since it entered
//! its previous status is compared against the same transition across all
//! other shipments. The comparison is an adaptive z-score with a per
//! transition baseline floor; slow or suspiciously fast transitions are
//! recorded as anomalies, and the worst ones are handed to an Isolation
//! Forest for a second opinion.

pub mod baseline;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod isolation_forest;
pub mod monitor;
pub mod record;
pub mod report;
pub mod shipment;
pub mod stats;
pub mod store;
pub mod zscore;

pub use error::{Result, ShipwatchError};

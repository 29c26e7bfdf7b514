//! Anomaly audit records
//!
//! One record is written per qualifying detection and never mutated
//! afterwards. The JSON layout keeps the field names of the audit log
//! consumed by the alert feed (`shipmentId`, `engine`, `zScore`, ...).

use crate::shipment::TransitionKey;
use crate::zscore::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detection engine that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Engine {
    #[serde(rename = "Z_SCORE")]
    ZScore,
    #[serde(rename = "ISOLATION_FOREST")]
    IsolationForest,
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::ZScore => f.write_str("Z_SCORE"),
            Engine::IsolationForest => f.write_str("ISOLATION_FOREST"),
        }
    }
}

/// Engine-specific payload of an [`AnomalyRecord`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "engine")]
pub enum Finding {
    #[serde(rename = "Z_SCORE", rename_all = "camelCase")]
    ZScore {
        transition: TransitionKey,
        z_score: f64,
        latest_delta: f64,
        sample_mean: f64,
        sample_std: f64,
        sample_count: usize,
        ratio: f64,
        level: Severity,
    },
    #[serde(rename = "ISOLATION_FOREST", rename_all = "camelCase")]
    IsolationForest {
        transition: TransitionKey,
        score: f64,
        is_anomaly: bool,
        sample_count: usize,
    },
}

/// Immutable audit entry for one detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyRecord {
    pub shipment_id: String,
    pub detected_at: DateTime<Utc>,
    #[serde(flatten)]
    pub finding: Finding,
}

impl AnomalyRecord {
    pub fn engine(&self) -> Engine {
        match self.finding {
            Finding::ZScore { .. } => Engine::ZScore,
            Finding::IsolationForest { .. } => Engine::IsolationForest,
        }
    }

    pub fn transition(&self) -> TransitionKey {
        match self.finding {
            Finding::ZScore { transition, .. } | Finding::IsolationForest { transition, .. } => {
                transition
            }
        }
    }

    /// Severity for Z-score records, `None` for secondary-model verdicts
    pub fn level(&self) -> Option<Severity> {
        match self.finding {
            Finding::ZScore { level, .. } => Some(level),
            Finding::IsolationForest { .. } => None,
        }
    }
}

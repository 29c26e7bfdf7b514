//! Detector configuration
//!
//! Everything the detector treats as a constant lives here so it can be
//! swapped in tests and deployments: the baseline floors, the severity
//! trigger levels, the escalation model parameters and the alert feed size.
//!
//! # Example
//! ```
//! use shipwatch::config::DetectorConfig;
//!
//! let config = DetectorConfig::from_toml_str(r#"
//!     alert_feed_limit = 10
//!
//!     [baselines]
//!     "CREATED->SHIPPED" = 900000
//! "#).unwrap();
//!
//! assert_eq!(config.alert_feed_limit, 10);
//! assert_eq!(config.thresholds.min_samples, 3);
//! ```

use crate::baseline::BaselineTable;
use crate::error::{Result, ShipwatchError};
use crate::isolation_forest::ForestParams;
use crate::zscore::{SeverityThresholds, ZScoreClassifier};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Secondary model dispatch settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Run the secondary model for qualifying HIGH results
    pub enabled: bool,
    /// Upper bound on one secondary model call
    pub timeout_ms: u64,
    pub forest: ForestParams,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: 5_000,
            forest: ForestParams::default(),
        }
    }
}

impl EscalationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Top-level detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub baselines: BaselineTable,
    pub thresholds: SeverityThresholds,
    pub escalation: EscalationConfig,
    /// Number of records returned by the alert feed
    pub alert_feed_limit: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            baselines: BaselineTable::default(),
            thresholds: SeverityThresholds::default(),
            escalation: EscalationConfig::default(),
            alert_feed_limit: 5,
        }
    }
}

impl DetectorConfig {
    /// Fewer alerts: wider bands and a larger population before scoring
    pub fn strict() -> Self {
        Self {
            thresholds: SeverityThresholds {
                min_samples: 10,
                high_z: 3.0,
                high_ratio_below: 0.1,
                high_ratio_above: 4.0,
                medium_z: 1.5,
                medium_ratio_below: 0.33,
                medium_ratio_above: 2.5,
                escalation_min_samples: 20,
            },
            ..Self::default()
        }
    }

    /// More alerts: narrower bands, scoring starts as soon as possible
    pub fn permissive() -> Self {
        Self {
            thresholds: SeverityThresholds {
                min_samples: 3,
                high_z: 2.0,
                high_ratio_below: 0.25,
                high_ratio_above: 2.5,
                medium_z: 0.5,
                medium_ratio_below: 0.67,
                medium_ratio_above: 1.5,
                escalation_min_samples: 3,
            },
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: DetectorConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.thresholds.validate().map_err(ShipwatchError::InvalidConfig)?;
        self.escalation
            .forest
            .validate()
            .map_err(ShipwatchError::InvalidConfig)?;

        for (key, floor) in self.baselines.iter() {
            if !floor.is_finite() || *floor < 0.0 {
                return Err(ShipwatchError::InvalidConfig(format!(
                    "baseline for {} must be finite and non-negative, got {}",
                    key, floor
                )));
            }
        }

        if self.alert_feed_limit == 0 {
            return Err(ShipwatchError::InvalidConfig(
                "alert_feed_limit must be >= 1".to_string(),
            ));
        }

        Ok(())
    }

    pub fn classifier(&self) -> ZScoreClassifier {
        ZScoreClassifier::new(self.baselines.clone(), self.thresholds.clone())
    }
}

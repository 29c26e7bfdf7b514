//! Adaptive Z-score classification of transition durations
//!
//! Given the historical population of deltas for one transition type and
//! the delta that just occurred, computes a baseline-adjusted mean, the
//! spread around it, a Z-score and a ratio-to-mean, then maps both onto a
//! three-level severity.
//!
//! Two triggers are evaluated side by side. The Z-score is unstable when a
//! very regular process has near-zero spread, and can be muted when the
//! baseline floor inflates the spread. The ratio is dimensionless and
//! independent of the spread, so an obvious magnitude anomaly still
//! surfaces.
//!
//! The classifier is stateless: every call recomputes its statistics from
//! the supplied population.

use crate::baseline::BaselineTable;
use crate::record::{AnomalyRecord, Finding};
use crate::shipment::TransitionKey;
use crate::stats;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a single observed delta
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Within normal variation, never recorded
    Low,
    /// |z| >= 0.8 or ratio outside [0.5, 1.8]
    Medium,
    /// |z| >= 2.5 or ratio outside [0.2, 3.0]
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => f.write_str("LOW"),
            Severity::Medium => f.write_str("MEDIUM"),
            Severity::High => f.write_str("HIGH"),
        }
    }
}

/// Trigger levels for severity classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    /// Minimum population size before any classification happens
    pub min_samples: usize,
    pub high_z: f64,
    pub high_ratio_below: f64,
    pub high_ratio_above: f64,
    pub medium_z: f64,
    pub medium_ratio_below: f64,
    pub medium_ratio_above: f64,
    /// Minimum population size for a HIGH result to escalate
    pub escalation_min_samples: usize,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            min_samples: 3,
            high_z: 2.5,
            high_ratio_below: 0.2,
            high_ratio_above: 3.0,
            medium_z: 0.8,
            medium_ratio_below: 0.5,
            medium_ratio_above: 1.8,
            escalation_min_samples: 5,
        }
    }
}

impl SeverityThresholds {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_samples == 0 {
            return Err("min_samples must be >= 1".to_string());
        }

        let values = [
            ("high_z", self.high_z),
            ("high_ratio_below", self.high_ratio_below),
            ("high_ratio_above", self.high_ratio_above),
            ("medium_z", self.medium_z),
            ("medium_ratio_below", self.medium_ratio_below),
            ("medium_ratio_above", self.medium_ratio_above),
        ];
        for (name, value) in values {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be finite and non-negative, got {}", name, value));
            }
        }

        if self.medium_z > self.high_z {
            return Err(format!(
                "medium_z ({}) must not exceed high_z ({})",
                self.medium_z, self.high_z
            ));
        }

        if !(self.high_ratio_below <= self.medium_ratio_below
            && self.medium_ratio_below <= 1.0
            && 1.0 <= self.medium_ratio_above
            && self.medium_ratio_above <= self.high_ratio_above)
        {
            return Err(format!(
                "ratio bands must nest around 1.0: {} <= {} <= 1 <= {} <= {}",
                self.high_ratio_below,
                self.medium_ratio_below,
                self.medium_ratio_above,
                self.high_ratio_above
            ));
        }

        Ok(())
    }
}

/// Statistics computed for one classified delta
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZScoreStats {
    pub transition: TransitionKey,
    pub sample_count: usize,
    pub raw_mean: f64,
    pub baseline: f64,
    /// `max(raw_mean, baseline)`
    pub mean: f64,
    /// Spread around the adjusted `mean`, not around `raw_mean`
    pub variance: f64,
    pub std: f64,
    pub z_score: f64,
    pub ratio: f64,
    pub latest_delta: f64,
    pub level: Severity,
}

/// Result of one classifier invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZScoreOutcome {
    /// Population too small to say anything
    NoSignal {
        transition: TransitionKey,
        sample_count: usize,
        latest_delta: f64,
    },
    Scored(ZScoreStats),
}

impl ZScoreOutcome {
    /// Severity, LOW for no-signal outcomes
    pub fn level(&self) -> Severity {
        match self {
            ZScoreOutcome::NoSignal { .. } => Severity::Low,
            ZScoreOutcome::Scored(stats) => stats.level,
        }
    }

    /// Z-score, `None` when no classification happened
    pub fn z_score(&self) -> Option<f64> {
        match self {
            ZScoreOutcome::NoSignal { .. } => None,
            ZScoreOutcome::Scored(stats) => Some(stats.z_score),
        }
    }

    pub fn sample_count(&self) -> usize {
        match self {
            ZScoreOutcome::NoSignal { sample_count, .. } => *sample_count,
            ZScoreOutcome::Scored(stats) => stats.sample_count,
        }
    }

    pub fn stats(&self) -> Option<&ZScoreStats> {
        match self {
            ZScoreOutcome::NoSignal { .. } => None,
            ZScoreOutcome::Scored(stats) => Some(stats),
        }
    }

    /// Build the audit record for MEDIUM/HIGH outcomes
    ///
    /// LOW and no-signal outcomes produce no record so the audit log stays
    /// signal-dense.
    pub fn to_record(&self, shipment_id: &str, detected_at: DateTime<Utc>) -> Option<AnomalyRecord> {
        let stats = self.stats()?;
        if stats.level == Severity::Low {
            return None;
        }

        Some(AnomalyRecord {
            shipment_id: shipment_id.to_string(),
            detected_at,
            finding: Finding::ZScore {
                transition: stats.transition,
                z_score: stats.z_score,
                latest_delta: stats.latest_delta,
                sample_mean: stats.mean,
                sample_std: stats.std,
                sample_count: stats.sample_count,
                ratio: stats.ratio,
                level: stats.level,
            },
        })
    }
}

/// Z-score classifier with an injected baseline table
#[derive(Debug, Clone, Default)]
pub struct ZScoreClassifier {
    baselines: BaselineTable,
    thresholds: SeverityThresholds,
}

impl ZScoreClassifier {
    pub fn new(baselines: BaselineTable, thresholds: SeverityThresholds) -> Self {
        Self {
            baselines,
            thresholds,
        }
    }

    pub fn baselines(&self) -> &BaselineTable {
        &self.baselines
    }

    pub fn thresholds(&self) -> &SeverityThresholds {
        &self.thresholds
    }

    /// Classify `latest_delta` against the historical population `deltas`
    pub fn classify(&self, deltas: &[f64], latest_delta: f64, transition: TransitionKey) -> ZScoreOutcome {
        if deltas.len() < self.thresholds.min_samples {
            tracing::debug!(
                transition = %transition,
                samples = deltas.len(),
                "population too small, no signal"
            );
            return ZScoreOutcome::NoSignal {
                transition,
                sample_count: deltas.len(),
                latest_delta,
            };
        }

        // min_samples >= 1 and the guard above make these infallible
        let raw_mean = stats::mean(deltas).unwrap_or(0.0);
        let baseline = self.baselines.floor_for(transition);
        let mean = raw_mean.max(baseline);
        let variance = stats::variance_about(deltas, mean).unwrap_or(0.0);
        let std = variance.sqrt();

        let z_score = if std == 0.0 {
            0.0
        } else {
            (latest_delta - mean) / std
        };
        let ratio = if mean > 0.0 { latest_delta / mean } else { 1.0 };

        let level = classify_severity(z_score, ratio, &self.thresholds);

        tracing::debug!(
            transition = %transition,
            samples = deltas.len(),
            mean,
            std,
            z_score,
            ratio,
            level = %level,
            "classified transition delta"
        );

        ZScoreOutcome::Scored(ZScoreStats {
            transition,
            sample_count: deltas.len(),
            raw_mean,
            baseline,
            mean,
            variance,
            std,
            z_score,
            ratio,
            latest_delta,
            level,
        })
    }

    /// HIGH outcomes over a large enough population go to the secondary model
    pub fn should_escalate(&self, outcome: &ZScoreOutcome) -> bool {
        outcome.level() == Severity::High
            && outcome.sample_count() >= self.thresholds.escalation_min_samples
    }
}

/// Map a Z-score and ratio onto a severity, HIGH checked first
pub fn classify_severity(z_score: f64, ratio: f64, thresholds: &SeverityThresholds) -> Severity {
    let abs_z = z_score.abs();

    if abs_z >= thresholds.high_z
        || ratio < thresholds.high_ratio_below
        || ratio > thresholds.high_ratio_above
    {
        Severity::High
    } else if abs_z >= thresholds.medium_z
        || ratio < thresholds.medium_ratio_below
        || ratio > thresholds.medium_ratio_above
    {
        Severity::Medium
    } else {
        Severity::Low
    }
}

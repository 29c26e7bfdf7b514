//! Isolation Forest secondary outlier model
//!
//! Runs only for HIGH Z-score results over a large enough population. It
//! looks at the population's shape instead of a single delta: the verdict
//! says whether the population of transition times contains points that are
//! unusually easy to isolate.
//!
//! # Algorithm Overview
//!
//! Isolation Forest isolates anomalies by randomly partitioning the value
//! range. Anomalies are easier to isolate (shorter paths in trees) than
//! normal points.
//!
//! ```text
//! raw(x)      = -2^(-E[h(x)] / c(psi))
//! offset      = percentile(raw(X), 100 * contamination)
//! decision(x) = raw(x) - offset
//! score       = min over X of decision(x)
//! ```
//!
//! `score < anomaly_cutoff` (default -0.1) flags the population.
//!
//! # References
//!
//! Liu, F. T., Ting, K. M., & Zhou, Z. H. (2008). Isolation forest.
//! In 2008 Eighth IEEE International Conference on Data Mining (pp. 413-422).

use crate::error::{Result, ShipwatchError};
use crate::record::{AnomalyRecord, Finding};
use crate::shipment::TransitionKey;
use crate::stats;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Default sub-sampling size (Liu et al. 2008)
const DEFAULT_SUBSAMPLE_SIZE: usize = 256;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// A node in an Isolation Tree over scalar samples
#[derive(Debug, Clone)]
enum IsolationNode {
    Internal {
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf with sample count (for path length calculation)
    Leaf { size: usize },
}

impl IsolationNode {
    fn path_length(&self, value: f64, current_depth: usize) -> f64 {
        match self {
            IsolationNode::Internal {
                threshold,
                left,
                right,
            } => {
                if value < *threshold {
                    left.path_length(value, current_depth + 1)
                } else {
                    right.path_length(value, current_depth + 1)
                }
            }
            IsolationNode::Leaf { size } => {
                // Add average path length for unresolved instances
                current_depth as f64 + average_path_length(*size)
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n_minus_1 = (n - 1) as f64;
            2.0 * (n_minus_1.ln() + EULER_GAMMA) - 2.0 * n_minus_1 / n as f64
        }
    }
}

/// Single Isolation Tree
#[derive(Debug, Clone)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn build(samples: &[f64], max_depth: usize, rng: &mut StdRng) -> Self {
        IsolationTree {
            root: Self::build_node(samples, 0, max_depth, rng),
        }
    }

    fn build_node(samples: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> IsolationNode {
        if depth >= max_depth || samples.len() <= 1 {
            return IsolationNode::Leaf {
                size: samples.len(),
            };
        }

        let (min_val, max_val) = samples
            .iter()
            .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));

        // All values identical: nothing left to split
        if max_val <= min_val {
            return IsolationNode::Leaf {
                size: samples.len(),
            };
        }

        let threshold = rng.gen_range(min_val..max_val);
        let (left, right): (Vec<f64>, Vec<f64>) = samples.iter().copied().partition(|&v| v < threshold);

        if left.is_empty() || right.is_empty() {
            return IsolationNode::Leaf {
                size: samples.len(),
            };
        }

        IsolationNode::Internal {
            threshold,
            left: Box::new(Self::build_node(&left, depth + 1, max_depth, rng)),
            right: Box::new(Self::build_node(&right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, value: f64) -> f64 {
        self.root.path_length(value, 0)
    }
}

/// Isolation Forest parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub num_trees: usize,
    /// Expected share of outliers, sets the decision offset percentile
    pub contamination: f64,
    pub seed: u64,
    /// Populations whose minimum decision value falls below this are anomalous
    pub anomaly_cutoff: f64,
    /// Defaults to min(256, population size)
    pub subsample_size: Option<usize>,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            contamination: 0.2,
            seed: 42,
            anomaly_cutoff: -0.1,
            subsample_size: None,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.num_trees == 0 {
            return Err("num_trees must be >= 1".to_string());
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            ));
        }
        if !self.anomaly_cutoff.is_finite() {
            return Err("anomaly_cutoff must be finite".to_string());
        }
        if self.subsample_size == Some(0) {
            return Err("subsample_size must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Isolation Forest - ensemble of Isolation Trees
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    num_trees: usize,
    subsample_size: usize,
    rng: StdRng,
}

impl IsolationForest {
    pub fn new(num_trees: usize, subsample_size: Option<usize>, seed: u64) -> Self {
        IsolationForest {
            trees: Vec::new(),
            num_trees,
            subsample_size: subsample_size.unwrap_or(DEFAULT_SUBSAMPLE_SIZE),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fit the model on training data
    pub fn fit(&mut self, samples: &[f64]) {
        self.trees.clear();
        if samples.is_empty() {
            return;
        }

        self.subsample_size = self.subsample_size.min(samples.len()).max(1);
        let max_depth = (self.subsample_size as f64).log2().ceil().max(1.0) as usize;

        let mut indices: Vec<usize> = (0..samples.len()).collect();
        for _ in 0..self.num_trees {
            indices.shuffle(&mut self.rng);
            let subsample: Vec<f64> = indices[..self.subsample_size]
                .iter()
                .map(|&i| samples[i])
                .collect();

            let tree = IsolationTree::build(&subsample, max_depth, &mut self.rng);
            self.trees.push(tree);
        }
    }

    /// Normalized anomaly score in (0, 1], higher = more anomalous
    pub fn anomaly_score(&self, value: f64) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }

        let avg_path_length: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(value))
            .sum::<f64>()
            / self.trees.len() as f64;

        let c = average_path_length(self.subsample_size);
        if c == 0.0 {
            return 1.0;
        }
        2_f64.powf(-avg_path_length / c)
    }

    /// Decision values centred on the contamination percentile
    ///
    /// Negative values are more anomalous than the expected outlier share.
    pub fn decision_function(&self, samples: &[f64], contamination: f64) -> Vec<f64> {
        let raw: Vec<f64> = samples.iter().map(|&v| -self.anomaly_score(v)).collect();
        let offset = stats::percentile(&raw, contamination * 100.0).unwrap_or(0.0);
        raw.into_iter().map(|r| r - offset).collect()
    }
}

/// Verdict of a secondary outlier model over a delta population
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlierVerdict {
    pub anomaly_score: f64,
    pub is_anomaly: bool,
}

impl OutlierVerdict {
    pub fn to_record(
        &self,
        shipment_id: &str,
        transition: TransitionKey,
        sample_count: usize,
        detected_at: DateTime<Utc>,
    ) -> AnomalyRecord {
        AnomalyRecord {
            shipment_id: shipment_id.to_string(),
            detected_at,
            finding: Finding::IsolationForest {
                transition,
                score: self.anomaly_score,
                is_anomaly: self.is_anomaly,
                sample_count,
            },
        }
    }
}

/// A heavier-weight model consulted when the Z-score classifier escalates
pub trait OutlierModel: Send + Sync {
    fn classify(&self, deltas: &[f64]) -> Result<OutlierVerdict>;
}

/// [`OutlierModel`] backed by a freshly fitted [`IsolationForest`]
#[derive(Debug, Clone, Default)]
pub struct IsolationForestModel {
    params: ForestParams,
}

impl IsolationForestModel {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}

impl OutlierModel for IsolationForestModel {
    fn classify(&self, deltas: &[f64]) -> Result<OutlierVerdict> {
        if deltas.len() < 2 {
            return Err(ShipwatchError::InsufficientData {
                required: 2,
                actual: deltas.len(),
            });
        }
        if deltas.iter().any(|d| !d.is_finite()) {
            return Err(ShipwatchError::OutlierModel(
                "population contains non-finite deltas".to_string(),
            ));
        }

        let mut forest = IsolationForest::new(self.params.num_trees, self.params.subsample_size, self.params.seed);
        forest.fit(deltas);

        let anomaly_score = forest
            .decision_function(deltas, self.params.contamination)
            .into_iter()
            .fold(f64::INFINITY, f64::min);

        Ok(OutlierVerdict {
            anomaly_score,
            is_anomaly: anomaly_score < self.params.anomaly_cutoff,
        })
    }
}

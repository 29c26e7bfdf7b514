//! Transition monitor: runs the detector after every status change
//!
//! Order of operations for one transition:
//!
//! 1. Append the event to the shipment (serialized per shipment by the store)
//! 2. Load the population of shipments that share the transition type
//! 3. Extract historical deltas, excluding the event just appended
//! 4. Classify the new delta and persist a record for MEDIUM/HIGH
//! 5. For HIGH over a large enough population, dispatch the secondary model
//!
//! Step 5 runs as a separate tokio task after the primary record is stored.
//! Its failures (model error, panic, timeout) are logged and end there: they
//! never change the result returned for the transition itself.

use crate::config::DetectorConfig;
use crate::error::Result;
use crate::extract::{extract_deltas, latest_delta, Occurrence};
use crate::isolation_forest::{IsolationForestModel, OutlierModel};
use crate::record::AnomalyRecord;
use crate::shipment::{ShipmentRecord, ShipmentState, TransitionKey};
use crate::store::ShipmentStore;
use crate::zscore::{ZScoreClassifier, ZScoreOutcome};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A requested status change
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub shipment_id: String,
    pub to: ShipmentState,
    pub occurred_at: DateTime<Utc>,
    pub transaction_hash: Option<String>,
}

impl TransitionRequest {
    pub fn new(shipment_id: impl Into<String>, to: ShipmentState, occurred_at: DateTime<Utc>) -> Self {
        Self {
            shipment_id: shipment_id.into(),
            to,
            occurred_at,
            transaction_hash: None,
        }
    }

    pub fn with_transaction_hash(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }
}

/// Pending secondary-model result
///
/// Dropping the handle detaches the task; it still runs and persists its
/// record.
#[derive(Debug)]
pub struct EscalationHandle {
    inner: JoinHandle<Option<AnomalyRecord>>,
}

impl EscalationHandle {
    /// Wait for the secondary verdict, `None` if it failed
    pub async fn wait(self) -> Option<AnomalyRecord> {
        match self.inner.await {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(error = %err, "escalation task aborted");
                None
            }
        }
    }
}

/// Outcome of one monitored transition
#[derive(Debug)]
pub struct TransitionReport {
    /// Shipment right after the transition was committed
    pub shipment: ShipmentRecord,
    pub transition: TransitionKey,
    pub outcome: ZScoreOutcome,
    /// Persisted Z-score record, present for MEDIUM/HIGH
    pub record: Option<AnomalyRecord>,
    /// Present when the secondary model was dispatched
    pub escalation: Option<EscalationHandle>,
}

#[derive(Clone)]
struct Escalator {
    model: Arc<dyn OutlierModel>,
    runtime: Handle,
    timeout: Duration,
}

impl Escalator {
    fn dispatch(
        &self,
        store: Arc<dyn ShipmentStore>,
        deltas: Vec<f64>,
        shipment_id: String,
        transition: TransitionKey,
    ) -> EscalationHandle {
        let model = Arc::clone(&self.model);
        let timeout = self.timeout;

        let inner = self.runtime.spawn(async move {
            let sample_count = deltas.len();
            let work = tokio::task::spawn_blocking(move || model.classify(&deltas));

            let verdict = match tokio::time::timeout(timeout, work).await {
                Ok(Ok(Ok(verdict))) => verdict,
                Ok(Ok(Err(err))) => {
                    tracing::warn!(shipment = %shipment_id, transition = %transition, error = %err, "secondary outlier model failed");
                    return None;
                }
                Ok(Err(err)) => {
                    tracing::warn!(shipment = %shipment_id, transition = %transition, error = %err, "secondary outlier model panicked");
                    return None;
                }
                Err(_) => {
                    tracing::warn!(shipment = %shipment_id, transition = %transition, timeout_ms = timeout.as_millis() as u64, "secondary outlier model timed out");
                    return None;
                }
            };

            let record = verdict.to_record(&shipment_id, transition, sample_count, Utc::now());
            if let Err(err) = store.save_anomaly(record.clone()) {
                tracing::warn!(shipment = %shipment_id, error = %err, "failed to persist secondary verdict");
                return None;
            }

            tracing::info!(
                shipment = %shipment_id,
                transition = %transition,
                score = verdict.anomaly_score,
                is_anomaly = verdict.is_anomaly,
                "secondary outlier verdict recorded"
            );
            Some(record)
        });

        EscalationHandle { inner }
    }
}

/// Applies transitions and runs anomaly detection on each one
pub struct TransitionMonitor {
    store: Arc<dyn ShipmentStore>,
    classifier: ZScoreClassifier,
    escalator: Option<Escalator>,
}

impl TransitionMonitor {
    /// Monitor without a secondary model
    pub fn new(store: Arc<dyn ShipmentStore>, classifier: ZScoreClassifier) -> Self {
        Self {
            store,
            classifier,
            escalator: None,
        }
    }

    /// Monitor built from `config`; escalation needs a runtime `handle`
    pub fn from_config(store: Arc<dyn ShipmentStore>, config: &DetectorConfig, handle: Option<Handle>) -> Self {
        let monitor = Self::new(store, config.classifier());

        match handle {
            Some(handle) if config.escalation.enabled => monitor.with_escalation(
                Arc::new(IsolationForestModel::new(config.escalation.forest.clone())),
                handle,
                config.escalation.timeout(),
            ),
            _ => monitor,
        }
    }

    pub fn with_escalation(mut self, model: Arc<dyn OutlierModel>, runtime: Handle, timeout: Duration) -> Self {
        self.escalator = Some(Escalator {
            model,
            runtime,
            timeout,
        });
        self
    }

    pub fn classifier(&self) -> &ZScoreClassifier {
        &self.classifier
    }

    pub fn store(&self) -> &Arc<dyn ShipmentStore> {
        &self.store
    }

    /// Historical deltas for `key` across every shipment in the store
    pub fn population(&self, key: TransitionKey) -> Result<Vec<f64>> {
        let shipments = self.store.shipments_with_transition(key)?;
        Ok(extract_deltas(&shipments, key, None))
    }

    /// Commit a transition, then classify its elapsed time
    pub fn record_transition(&self, request: TransitionRequest) -> Result<TransitionReport> {
        let appended = self.store.append_transition(
            &request.shipment_id,
            request.to,
            request.occurred_at,
            request.transaction_hash,
        )?;
        let key = appended.key;
        let shipment_id = appended.shipment.id.clone();

        let population = self.store.shipments_with_transition(key)?;
        let exclude = Occurrence {
            shipment_id: &shipment_id,
            index: appended.index,
        };
        let deltas = extract_deltas(&population, key, Some(exclude));
        let latest = latest_delta(&appended.shipment).unwrap_or(0.0);

        let outcome = self.classifier.classify(&deltas, latest, key);

        let record = outcome.to_record(&shipment_id, Utc::now());
        if let Some(record) = &record {
            self.store.save_anomaly(record.clone())?;
            tracing::info!(
                shipment = %shipment_id,
                transition = %key,
                level = %outcome.level(),
                z_score = outcome.z_score().unwrap_or(0.0),
                latest_delta = latest,
                "transition anomaly recorded"
            );
        }

        let escalation = match &self.escalator {
            Some(escalator) if self.classifier.should_escalate(&outcome) => Some(escalator.dispatch(
                Arc::clone(&self.store),
                deltas,
                shipment_id,
                key,
            )),
            _ => None,
        };

        Ok(TransitionReport {
            shipment: appended.shipment,
            transition: key,
            outcome,
            record,
            escalation,
        })
    }

    /// Alert feed: most recent records across all engines
    pub fn recent_alerts(&self, limit: usize) -> Result<Vec<AnomalyRecord>> {
        self.store.recent_anomalies(limit)
    }
}

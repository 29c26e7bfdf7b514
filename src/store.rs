//! Shipment store and anomaly audit log
//!
//! The detector only needs to read a population of shipments; the store
//! also owns the write side of a transition so that two concurrent
//! transitions of the *same* shipment never interleave their
//! read-modify-write of `history` and `status`. Different shipments are
//! locked independently.
//!
//! Population reads clone a snapshot of each shipment. They are not a
//! consistent cut across shipments; the statistics tolerate that.

use crate::error::{Result, ShipwatchError};
use crate::record::AnomalyRecord;
use crate::shipment::{ShipmentRecord, ShipmentState, TransitionKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Result of appending a transition to a shipment
#[derive(Debug, Clone)]
pub struct AppendedTransition {
    /// Shipment state right after the append
    pub shipment: ShipmentRecord,
    /// Index of the new event in `shipment.history`
    pub index: usize,
    pub key: TransitionKey,
}

/// Persistence collaborator used by the transition monitor
pub trait ShipmentStore: Send + Sync {
    fn fetch_all_shipments(&self) -> Result<Vec<ShipmentRecord>>;

    /// Shipments whose history contains `key` at least once
    fn shipments_with_transition(&self, key: TransitionKey) -> Result<Vec<ShipmentRecord>> {
        Ok(self
            .fetch_all_shipments()?
            .into_iter()
            .filter(|s| s.has_transition(key))
            .collect())
    }

    fn shipment(&self, id: &str) -> Result<ShipmentRecord>;

    fn insert_shipment(&self, shipment: ShipmentRecord) -> Result<()>;

    /// Move a shipment from its current status to `to`, serialized per shipment
    fn append_transition(
        &self,
        id: &str,
        to: ShipmentState,
        occurred_at: DateTime<Utc>,
        transaction_hash: Option<String>,
    ) -> Result<AppendedTransition>;

    fn save_anomaly(&self, record: AnomalyRecord) -> Result<()>;

    /// Most recent records first, at most `limit`
    fn recent_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>>;
}

/// On-disk JSON layout of an [`InMemoryStore`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    #[serde(default)]
    pub shipments: Vec<ShipmentRecord>,
    #[serde(default)]
    pub anomalies: Vec<AnomalyRecord>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Process-local store with one lock per shipment
#[derive(Debug, Default)]
pub struct InMemoryStore {
    shipments: RwLock<BTreeMap<String, Arc<Mutex<ShipmentRecord>>>>,
    anomalies: Mutex<Vec<AnomalyRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let shipments = snapshot
            .shipments
            .into_iter()
            .map(|s| (s.id.clone(), Arc::new(Mutex::new(s))))
            .collect();

        Self {
            shipments: RwLock::new(shipments),
            anomalies: Mutex::new(snapshot.anomalies),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            shipments: self.all_cloned(),
            anomalies: lock(&self.anomalies).clone(),
        }
    }

    /// Load a JSON snapshot from `path`
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: StoreSnapshot = serde_json::from_reader(reader)?;
        tracing::debug!(
            path = %path.display(),
            shipments = snapshot.shipments.len(),
            anomalies = snapshot.anomalies.len(),
            "loaded store snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write a JSON snapshot to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, &self.snapshot())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    fn handle(&self, id: &str) -> Result<Arc<Mutex<ShipmentRecord>>> {
        self.shipments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| ShipwatchError::UnknownShipment(id.to_string()))
    }

    fn all_cloned(&self) -> Vec<ShipmentRecord> {
        let handles: Vec<_> = self
            .shipments
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        handles.iter().map(|h| lock(h).clone()).collect()
    }
}

impl ShipmentStore for InMemoryStore {
    fn fetch_all_shipments(&self) -> Result<Vec<ShipmentRecord>> {
        Ok(self.all_cloned())
    }

    fn shipment(&self, id: &str) -> Result<ShipmentRecord> {
        let handle = self.handle(id)?;
        let shipment = lock(&handle).clone();
        Ok(shipment)
    }

    fn insert_shipment(&self, shipment: ShipmentRecord) -> Result<()> {
        self.shipments
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(shipment.id.clone(), Arc::new(Mutex::new(shipment)));
        Ok(())
    }

    fn append_transition(
        &self,
        id: &str,
        to: ShipmentState,
        occurred_at: DateTime<Utc>,
        transaction_hash: Option<String>,
    ) -> Result<AppendedTransition> {
        let handle = self.handle(id)?;
        let mut shipment = lock(&handle);

        if shipment.status == to {
            return Err(ShipwatchError::InvalidTransition {
                shipment_id: id.to_string(),
                state: to.to_string(),
            });
        }

        let key = TransitionKey::new(shipment.status, to);
        let index = shipment.push_transition(to, occurred_at, transaction_hash);

        Ok(AppendedTransition {
            shipment: shipment.clone(),
            index,
            key,
        })
    }

    fn save_anomaly(&self, record: AnomalyRecord) -> Result<()> {
        lock(&self.anomalies).push(record);
        Ok(())
    }

    fn recent_anomalies(&self, limit: usize) -> Result<Vec<AnomalyRecord>> {
        let anomalies = lock(&self.anomalies);
        let mut ordered: Vec<(usize, &AnomalyRecord)> = anomalies.iter().enumerate().collect();
        // Newest first; equal timestamps fall back to later insertion first
        ordered.sort_by(|(ia, a), (ib, b)| b.detected_at.cmp(&a.detected_at).then(ib.cmp(ia)));

        Ok(ordered
            .into_iter()
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect())
    }
}

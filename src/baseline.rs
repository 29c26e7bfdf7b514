//! Expected-duration floors per transition type
//!
//! A population that has drifted slow as a whole would otherwise normalize
//! against its own drift. The classifier uses `max(raw_mean, baseline)` as
//! the centre, so the floor can only raise the mean, never lower it.

use crate::shipment::{ShipmentState, TransitionKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const MINUTE_MS: f64 = 60.0 * 1000.0;

/// Immutable `TransitionKey -> floor (ms)` mapping, passed to the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BaselineTable {
    floors: BTreeMap<TransitionKey, f64>,
}

impl Default for BaselineTable {
    fn default() -> Self {
        use ShipmentState::{Audited, Created, ForSale, Received, Shipped};

        Self::from_entries([
            (TransitionKey::new(Created, Shipped), 30.0 * MINUTE_MS),
            (TransitionKey::new(Shipped, Received), 60.0 * MINUTE_MS),
            (TransitionKey::new(Received, Audited), 60.0 * MINUTE_MS),
            (TransitionKey::new(Audited, ForSale), 30.0 * MINUTE_MS),
        ])
    }
}

impl BaselineTable {
    /// Table with no floors: every key resolves to 0
    pub fn empty() -> Self {
        Self {
            floors: BTreeMap::new(),
        }
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (TransitionKey, f64)>) -> Self {
        Self {
            floors: entries.into_iter().collect(),
        }
    }

    /// Floor for `key`, 0 when unlisted
    pub fn floor_for(&self, key: TransitionKey) -> f64 {
        self.floors.get(&key).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TransitionKey, &f64)> {
        self.floors.iter()
    }

    pub fn len(&self) -> usize {
        self.floors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.floors.is_empty()
    }
}

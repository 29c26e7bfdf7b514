//! Shipment records and their transition histories
//!
//! A shipment moves through a fixed lifecycle. Every move is appended to the
//! shipment's `history`, and the history's insertion order *is* its
//! chronological order: nothing in this crate re-sorts it, because the
//! entry-time scan in [`crate::extract`] walks it backward by index.

use crate::error::{Result, ShipwatchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a shipment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentState {
    Created,
    Shipped,
    Received,
    Audited,
    ForSale,
}

impl ShipmentState {
    pub const ALL: [ShipmentState; 5] = [
        ShipmentState::Created,
        ShipmentState::Shipped,
        ShipmentState::Received,
        ShipmentState::Audited,
        ShipmentState::ForSale,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentState::Created => "CREATED",
            ShipmentState::Shipped => "SHIPPED",
            ShipmentState::Received => "RECEIVED",
            ShipmentState::Audited => "AUDITED",
            ShipmentState::ForSale => "FOR_SALE",
        }
    }
}

impl fmt::Display for ShipmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentState {
    type Err = ShipwatchError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        ShipmentState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == upper)
            .ok_or_else(|| ShipwatchError::InvalidState(s.to_string()))
    }
}

/// Ordered `(from, to)` pair used to group transitions across shipments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransitionKey {
    pub from: ShipmentState,
    pub to: ShipmentState,
}

impl TransitionKey {
    pub fn new(from: ShipmentState, to: ShipmentState) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.from, self.to)
    }
}

impl FromStr for TransitionKey {
    type Err = ShipwatchError;

    fn from_str(s: &str) -> Result<Self> {
        let (from, to) = s
            .split_once("->")
            .ok_or_else(|| ShipwatchError::InvalidTransitionKey(s.to_string()))?;

        let parse = |part: &str| {
            part.parse::<ShipmentState>()
                .map_err(|_| ShipwatchError::InvalidTransitionKey(s.to_string()))
        };

        Ok(TransitionKey::new(parse(from)?, parse(to)?))
    }
}

// Rendered as "FROM->TO" so that config tables and JSON snapshots stay readable.
impl Serialize for TransitionKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TransitionKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionEvent {
    pub from_state: ShipmentState,
    pub to_state: ShipmentState,
    pub occurred_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
}

impl TransitionEvent {
    pub fn new(from_state: ShipmentState, to_state: ShipmentState, occurred_at: DateTime<Utc>) -> Self {
        Self {
            from_state,
            to_state,
            occurred_at,
            transaction_hash: None,
        }
    }

    pub fn key(&self) -> TransitionKey {
        TransitionKey::new(self.from_state, self.to_state)
    }

    pub fn matches(&self, key: TransitionKey) -> bool {
        self.from_state == key.from && self.to_state == key.to
    }
}

/// A tracked shipment with its append-only transition history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentRecord {
    pub id: String,
    /// Absent for records imported without a creation stamp
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    pub status: ShipmentState,
    #[serde(default)]
    pub history: Vec<TransitionEvent>,
}

impl ShipmentRecord {
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            created_at: Some(created_at),
            status: ShipmentState::Created,
            history: Vec::new(),
        }
    }

    /// Append a transition out of the current status and return its index
    pub fn push_transition(
        &mut self,
        to: ShipmentState,
        occurred_at: DateTime<Utc>,
        transaction_hash: Option<String>,
    ) -> usize {
        self.history.push(TransitionEvent {
            from_state: self.status,
            to_state: to,
            occurred_at,
            transaction_hash,
        });
        self.status = to;
        self.history.len() - 1
    }

    pub fn has_transition(&self, key: TransitionKey) -> bool {
        self.history.iter().any(|event| event.matches(key))
    }

    pub fn last_event(&self) -> Option<&TransitionEvent> {
        self.history.last()
    }
}

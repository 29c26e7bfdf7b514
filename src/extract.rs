//! Transition history extraction
//!
//! Builds the population of elapsed-time samples ("deltas") for one
//! transition type across every shipment. A delta is the time a shipment
//! spent in `from` before moving to `to`:
//!
//! ```text
//! delta = event[i].occurred_at - entered_from_at
//! ```
//!
//! where `entered_from_at` is the nearest earlier event with `to_state == from`,
//! falling back to the shipment's `created_at`, and finally to the event's own
//! timestamp (a zero delta).
//!
//! Negative or non-finite deltas come from malformed timestamps and are
//! dropped silently so that one corrupt record cannot poison the population.

use crate::shipment::{ShipmentRecord, TransitionKey};
use chrono::{DateTime, Utc};

/// A specific history entry: shipment id plus index into its `history`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Occurrence<'a> {
    pub shipment_id: &'a str,
    pub index: usize,
}

/// Find when the shipment entered the `from` state of the event at `index`
///
/// Scans backward from `index - 1` for the nearest event whose `to_state`
/// equals the event's `from_state`.
pub fn entered_state_at(shipment: &ShipmentRecord, index: usize) -> Option<DateTime<Utc>> {
    let event = shipment.history.get(index)?;

    let entered = shipment.history[..index]
        .iter()
        .rev()
        .find(|prior| prior.to_state == event.from_state)
        .map(|prior| prior.occurred_at);

    Some(
        entered
            .or(shipment.created_at)
            .unwrap_or(event.occurred_at),
    )
}

/// Elapsed milliseconds for the event at `index`, without validity filtering
pub fn raw_delta_ms(shipment: &ShipmentRecord, index: usize) -> Option<f64> {
    let event = shipment.history.get(index)?;
    let entered = entered_state_at(shipment, index)?;
    Some((event.occurred_at - entered).num_milliseconds() as f64)
}

fn is_valid_delta(delta: f64) -> bool {
    delta.is_finite() && delta >= 0.0
}

/// Collect every historical delta for `key` across `shipments`
///
/// Every event of every shipment is examined; one shipment may contribute
/// several samples when the same transition recurs in its history.
/// `exclude` names the occurrence that triggered the computation so it is
/// not counted as part of its own population.
pub fn extract_deltas(
    shipments: &[ShipmentRecord],
    key: TransitionKey,
    exclude: Option<Occurrence<'_>>,
) -> Vec<f64> {
    let mut deltas = Vec::new();
    let mut dropped = 0usize;

    for shipment in shipments {
        for (index, event) in shipment.history.iter().enumerate() {
            if !event.matches(key) {
                continue;
            }

            if let Some(skip) = exclude {
                if skip.shipment_id == shipment.id && skip.index == index {
                    continue;
                }
            }

            match raw_delta_ms(shipment, index) {
                Some(delta) if is_valid_delta(delta) => deltas.push(delta),
                _ => dropped += 1,
            }
        }
    }

    tracing::debug!(
        transition = %key,
        samples = deltas.len(),
        dropped,
        "extracted transition population"
    );

    deltas
}

/// Delta of the most recent transition in `shipment`'s history
///
/// Returns `None` for an empty history. A negative value (back-dated event)
/// is clamped to zero so the new sample is always a valid duration.
pub fn latest_delta(shipment: &ShipmentRecord) -> Option<f64> {
    let index = shipment.history.len().checked_sub(1)?;
    let delta = raw_delta_ms(shipment, index)?;

    if is_valid_delta(delta) {
        Some(delta)
    } else {
        tracing::warn!(
            shipment = %shipment.id,
            delta,
            "latest transition has negative elapsed time, using 0"
        );
        Some(0.0)
    }
}

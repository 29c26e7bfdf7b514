#![no_main]

use libfuzzer_sys::fuzz_target;
use shipwatch::extract::{extract_deltas, latest_delta};
use shipwatch::shipment::{ShipmentState, TransitionKey};
use shipwatch::store::StoreSnapshot;
use shipwatch::zscore::ZScoreClassifier;

fuzz_target!(|data: &[u8]| {
    let Ok(snapshot) = serde_json::from_slice::<StoreSnapshot>(data) else {
        return;
    };

    // Any imported history, however inconsistent, must extract and classify
    let classifier = ZScoreClassifier::default();
    for from in ShipmentState::ALL {
        for to in ShipmentState::ALL {
            if from == to {
                continue;
            }
            let key = TransitionKey::new(from, to);
            let deltas = extract_deltas(&snapshot.shipments, key, None);
            assert!(deltas.iter().all(|d| d.is_finite() && *d >= 0.0));

            for shipment in &snapshot.shipments {
                if let Some(latest) = latest_delta(shipment) {
                    let _ = classifier.classify(&deltas, latest, key);
                }
            }
        }
    }
});

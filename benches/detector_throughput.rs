//! Detector throughput benchmark
//!
//! Every status change scans the full population of shipments that share
//! the transition type, so extraction cost grows with fleet size. This
//! benchmark tracks the three stages on that path:
//!
//! 1. `extract_deltas` over N shipments
//! 2. `ZScoreClassifier::classify` over N deltas
//! 3. `IsolationForestModel::classify` (escalation path, off the hot path)
//!
//! # Run Instructions
//!
//! ```bash
//! cargo bench --bench detector_throughput
//! ```

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shipwatch::extract::extract_deltas;
use shipwatch::isolation_forest::{IsolationForestModel, OutlierModel};
use shipwatch::shipment::{ShipmentRecord, ShipmentState, TransitionKey};
use shipwatch::zscore::ZScoreClassifier;

/// Fleet of `n` shipments, each with a full lifecycle history
fn create_fleet(n: usize) -> Vec<ShipmentRecord> {
    let t0 = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| {
            let jitter = (i % 17) as i64;
            let mut s = ShipmentRecord::new(format!("LOT-{}", i), t0);
            s.push_transition(ShipmentState::Shipped, t0 + Duration::minutes(30 + jitter), None);
            s.push_transition(ShipmentState::Received, t0 + Duration::minutes(120 + 2 * jitter), None);
            s.push_transition(ShipmentState::Audited, t0 + Duration::minutes(180 + 3 * jitter), None);
            s.push_transition(ShipmentState::ForSale, t0 + Duration::minutes(200 + jitter), None);
            s
        })
        .collect()
}

fn bench_extract(c: &mut Criterion) {
    let key = TransitionKey::new(ShipmentState::Shipped, ShipmentState::Received);
    let mut group = c.benchmark_group("extract_deltas");

    for size in [100, 1_000, 10_000] {
        let fleet = create_fleet(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &fleet, |b, fleet| {
            b.iter(|| extract_deltas(black_box(fleet), key, None));
        });
    }

    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let key = TransitionKey::new(ShipmentState::Shipped, ShipmentState::Received);
    let classifier = ZScoreClassifier::default();
    let mut group = c.benchmark_group("zscore_classify");

    for size in [100, 1_000, 10_000] {
        let deltas = extract_deltas(&create_fleet(size), key, None);
        group.bench_with_input(BenchmarkId::from_parameter(size), &deltas, |b, deltas| {
            b.iter(|| classifier.classify(black_box(deltas), black_box(21_600_000.0), key));
        });
    }

    group.finish();
}

fn bench_isolation_forest(c: &mut Criterion) {
    let key = TransitionKey::new(ShipmentState::Created, ShipmentState::Shipped);
    let model = IsolationForestModel::default();
    let mut group = c.benchmark_group("isolation_forest_classify");
    group.sample_size(20);

    for size in [16, 256, 1_000] {
        let deltas = extract_deltas(&create_fleet(size), key, None);
        group.bench_with_input(BenchmarkId::from_parameter(size), &deltas, |b, deltas| {
            b.iter(|| model.classify(black_box(deltas)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract, bench_classify, bench_isolation_forest);
criterion_main!(benches);

//! Text and JSON rendering for transition outcomes, alert feeds and
//! population summaries

use crate::record::{AnomalyRecord, Finding};
use crate::shipment::TransitionKey;
use crate::stats::PopulationSummary;
use crate::zscore::{Severity, ZScoreOutcome};
use serde::Serialize;
use std::fmt::Write;

/// Human-friendly duration: `1h 05m 00s`, `42.0s`, `350ms`
pub fn format_duration_ms(ms: f64) -> String {
    if !ms.is_finite() {
        return format!("{}", ms);
    }
    let sign = if ms < 0.0 { "-" } else { "" };
    let ms = ms.abs();

    if ms < 1_000.0 {
        return format!("{}{:.0}ms", sign, ms);
    }
    if ms < 60_000.0 {
        return format!("{}{:.1}s", sign, ms / 1_000.0);
    }

    let total_secs = (ms / 1_000.0).round() as u64;
    let hours = total_secs / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}{}h {:02}m {:02}s", sign, hours, minutes, seconds)
    } else {
        format!("{}{}m {:02}s", sign, minutes, seconds)
    }
}

fn severity_icon(level: Severity) -> &'static str {
    match level {
        Severity::Low => "🟢",
        Severity::Medium => "🟡",
        Severity::High => "🔴",
    }
}

/// JSON shape of a transition result
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSummary<'a> {
    pub shipment_id: &'a str,
    pub transition: TransitionKey,
    pub level: Severity,
    pub z_score: Option<f64>,
    pub outcome: &'a ZScoreOutcome,
    pub records: Vec<&'a AnomalyRecord>,
}

pub fn transition_text(shipment_id: &str, outcome: &ZScoreOutcome, records: &[&AnomalyRecord]) -> String {
    let mut out = String::new();

    match outcome {
        ZScoreOutcome::NoSignal {
            transition,
            sample_count,
            latest_delta,
        } => {
            let _ = writeln!(out, "=== Transition {} ({}) ===", transition, shipment_id);
            let _ = writeln!(out, "Elapsed: {}", format_duration_ms(*latest_delta));
            let _ = writeln!(
                out,
                "No signal: {} historical sample(s), need more to classify",
                sample_count
            );
        }
        ZScoreOutcome::Scored(stats) => {
            let _ = writeln!(out, "=== Transition {} ({}) ===", stats.transition, shipment_id);
            let _ = writeln!(out, "Elapsed:   {}", format_duration_ms(stats.latest_delta));
            let _ = writeln!(
                out,
                "Baseline:  {} ± {} over {} samples (floor {})",
                format_duration_ms(stats.mean),
                format_duration_ms(stats.std),
                stats.sample_count,
                format_duration_ms(stats.baseline)
            );
            let _ = writeln!(out, "Z-score:   {:.2}", stats.z_score);
            let _ = writeln!(out, "Ratio:     {:.2}x", stats.ratio);
            let _ = writeln!(out, "Severity:  {} {}", severity_icon(stats.level), stats.level);
        }
    }

    for record in records {
        let _ = writeln!(out, "Recorded:  {}", record_line(record));
    }

    out
}

pub fn record_line(record: &AnomalyRecord) -> String {
    match &record.finding {
        Finding::ZScore {
            transition,
            z_score,
            latest_delta,
            level,
            ..
        } => format!(
            "{} {} {} {} {} z={:.2} elapsed={}",
            record.detected_at.to_rfc3339(),
            record.engine(),
            record.shipment_id,
            transition,
            level,
            z_score,
            format_duration_ms(*latest_delta)
        ),
        Finding::IsolationForest {
            transition,
            score,
            is_anomaly,
            sample_count,
        } => format!(
            "{} {} {} {} score={:.4} anomaly={} samples={}",
            record.detected_at.to_rfc3339(),
            record.engine(),
            record.shipment_id,
            transition,
            score,
            is_anomaly,
            sample_count
        ),
    }
}

pub fn alerts_text(records: &[AnomalyRecord]) -> String {
    if records.is_empty() {
        return "No anomalies recorded\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(out, "=== Recent Anomalies ({}) ===", records.len());
    for (i, record) in records.iter().enumerate() {
        let icon = record.level().map(severity_icon).unwrap_or("🌲");
        let _ = writeln!(out, "  {}. {} {}", i + 1, icon, record_line(record));
    }
    out
}

pub fn population_text(key: TransitionKey, baseline: f64, summary: Option<&PopulationSummary>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Population {} ===", key);
    let _ = writeln!(out, "Baseline floor: {}", format_duration_ms(baseline));

    match summary {
        None => {
            let _ = writeln!(out, "No samples");
        }
        Some(s) => {
            let _ = writeln!(out, "Samples: {}", s.count);
            let _ = writeln!(out, "Mean:    {}", format_duration_ms(s.mean));
            let _ = writeln!(out, "Stddev:  {}", format_duration_ms(s.stddev));
            let _ = writeln!(out, "Min:     {}", format_duration_ms(s.min));
            let _ = writeln!(out, "Median:  {}", format_duration_ms(s.median));
            let _ = writeln!(out, "P90:     {}", format_duration_ms(s.p90));
            let _ = writeln!(out, "Max:     {}", format_duration_ms(s.max));
        }
    }
    out
}

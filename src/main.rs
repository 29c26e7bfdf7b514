use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use shipwatch::cli::{Cli, Command, OutputFormat};
use shipwatch::config::DetectorConfig;
use shipwatch::monitor::{TransitionMonitor, TransitionRequest};
use shipwatch::report;
use shipwatch::shipment::{ShipmentState, TransitionKey};
use shipwatch::stats::PopulationSummary;
use shipwatch::store::InMemoryStore;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<DetectorConfig> {
    match path {
        Some(path) => DetectorConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(DetectorConfig::default()),
    }
}

fn load_store(path: &Path) -> Result<InMemoryStore> {
    InMemoryStore::load(path).with_context(|| format!("failed to load store {}", path.display()))
}

fn parse_timestamp(text: Option<&str>) -> Result<DateTime<Utc>> {
    match text {
        Some(text) => Ok(DateTime::parse_from_rfc3339(text)
            .with_context(|| format!("invalid --at timestamp: {}", text))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_transition(
    config: &DetectorConfig,
    format: OutputFormat,
    store_path: &Path,
    shipment_id: String,
    to: &str,
    at: Option<&str>,
    transaction_hash: Option<String>,
    no_escalation: bool,
) -> Result<()> {
    let to: ShipmentState = to.parse()?;
    let occurred_at = parse_timestamp(at)?;
    let store = Arc::new(load_store(store_path)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let handle = (!no_escalation).then(|| runtime.handle().clone());
    let monitor = TransitionMonitor::from_config(store.clone(), config, handle);

    let mut request = TransitionRequest::new(shipment_id, to, occurred_at);
    if let Some(hash) = transaction_hash {
        request = request.with_transaction_hash(hash);
    }

    let report = monitor
        .record_transition(request)
        .with_context(|| format!("transition to {} rejected", to))?;

    let secondary = match report.escalation {
        Some(pending) => runtime.block_on(pending.wait()),
        None => None,
    };

    store
        .save(store_path)
        .with_context(|| format!("failed to write store {}", store_path.display()))?;

    let records: Vec<_> = report.record.iter().chain(secondary.iter()).collect();

    match format {
        OutputFormat::Text => {
            print!(
                "{}",
                report::transition_text(&report.shipment.id, &report.outcome, &records)
            );
        }
        OutputFormat::Json => {
            let summary = report::TransitionSummary {
                shipment_id: &report.shipment.id,
                transition: report.transition,
                level: report.outcome.level(),
                z_score: report.outcome.z_score(),
                outcome: &report.outcome,
                records,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn run_alerts(config: &DetectorConfig, format: OutputFormat, store_path: &Path, limit: Option<usize>) -> Result<()> {
    let store = Arc::new(load_store(store_path)?);
    let monitor = TransitionMonitor::from_config(store, config, None);
    let alerts = monitor.recent_alerts(limit.unwrap_or(config.alert_feed_limit))?;

    match format {
        OutputFormat::Text => print!("{}", report::alerts_text(&alerts)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&alerts)?),
    }
    Ok(())
}

fn run_population(config: &DetectorConfig, format: OutputFormat, store_path: &Path, transition: &str) -> Result<()> {
    let key: TransitionKey = transition.parse()?;
    let store = Arc::new(load_store(store_path)?);
    let monitor = TransitionMonitor::from_config(store, config, None);

    let deltas = monitor.population(key)?;
    let summary = PopulationSummary::from_samples(&deltas);
    let baseline = config.baselines.floor_for(key);

    match format {
        OutputFormat::Text => print!("{}", report::population_text(key, baseline, summary.as_ref())),
        OutputFormat::Json => {
            let value = serde_json::json!({
                "transition": key,
                "baseline": baseline,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Transition {
            store,
            shipment_id,
            to,
            at,
            transaction_hash,
            no_escalation,
        } => run_transition(
            &config,
            args.format,
            &store,
            shipment_id,
            &to,
            at.as_deref(),
            transaction_hash,
            no_escalation,
        ),
        Command::Alerts { store, limit } => run_alerts(&config, args.format, &store, limit),
        Command::Population { store, transition } => {
            run_population(&config, args.format, &store, &transition)
        }
    }
}

//! CLI argument parsing for shipwatch

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "shipwatch")]
#[command(version)]
#[command(about = "Transition-time anomaly detection for tracked shipments", long_about = None)]
pub struct Cli {
    /// Enable debug tracing output on stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Detector configuration file (TOML)
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long = "format", value_enum, default_value = "text", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply a status transition and classify its elapsed time
    Transition {
        /// JSON store snapshot (read and written back)
        #[arg(long, value_name = "FILE")]
        store: PathBuf,

        /// Shipment to move
        #[arg(long = "shipment", value_name = "ID")]
        shipment_id: String,

        /// Target state (CREATED, SHIPPED, RECEIVED, AUDITED, FOR_SALE)
        #[arg(long = "to", value_name = "STATE")]
        to: String,

        /// Transition time as RFC 3339 (default: now)
        #[arg(long = "at", value_name = "TIMESTAMP")]
        at: Option<String>,

        /// Transaction hash to attach to the history entry
        #[arg(long = "tx", value_name = "HASH")]
        transaction_hash: Option<String>,

        /// Do not run the secondary outlier model
        #[arg(long = "no-escalation")]
        no_escalation: bool,
    },

    /// Show the most recent anomaly records
    Alerts {
        #[arg(long, value_name = "FILE")]
        store: PathBuf,

        /// Number of records (default: alert_feed_limit from config)
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Summarize the historical population of one transition type
    Population {
        #[arg(long, value_name = "FILE")]
        store: PathBuf,

        /// Transition key, e.g. SHIPPED->RECEIVED
        #[arg(long = "transition", value_name = "FROM->TO")]
        transition: String,
    },
}

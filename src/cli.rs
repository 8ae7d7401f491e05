use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::constants::{SUPPLIER_INTERVAL_MS, TRANSACTION_INTERVAL_MS};
use crate::simulator::SimulatorConfig;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Supplier-enriched transaction stream composer"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    pub fn command(self) -> Command {
        self.command.unwrap_or_default()
    }
}

#[derive(Debug, Subcommand, Default)]
pub enum Command {
    /// Run the simulated feed and print both derived pipelines
    #[default]
    Run,
    /// Print every transaction paired with a freshly generated supplier
    Pairs(StreamArgs),
    /// Print periodic supplier summaries zipped with the transaction feed
    Events(StreamArgs),
}

#[derive(Debug, Args, Clone)]
pub struct StreamArgs {
    /// Stop after printing this many records
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Milliseconds between simulated transactions
    #[arg(long, default_value_t = TRANSACTION_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_interval_ms: u64,

    /// Milliseconds between supplier refreshes
    #[arg(long, default_value_t = SUPPLIER_INTERVAL_MS, value_parser = clap::value_parser!(u64).range(1..))]
    pub supplier_interval_ms: u64,

    /// Seed the price walk for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,
}

impl StreamArgs {
    pub fn config(&self) -> SimulatorConfig {
        SimulatorConfig {
            transaction_interval: Duration::from_millis(self.tick_interval_ms),
            supplier_interval: Duration::from_millis(self.supplier_interval_ms),
            seed: self.seed,
            ..SimulatorConfig::default()
        }
    }
}

use anyhow::Result;
use clap::Parser;
use supplier_stream::cli::{Cli, Command};
use supplier_stream::simulator::{self, OutputOptions};

#[tokio::main]
async fn main() -> Result<()> {
    match Cli::parse().command() {
        Command::Run => simulator::run().await,
        Command::Pairs(args) => {
            simulator::run_with_config(args.config(), OutputOptions::pairs(args.limit)).await
        }
        Command::Events(args) => {
            simulator::run_with_config(args.config(), OutputOptions::events(args.limit)).await
        }
    }
}

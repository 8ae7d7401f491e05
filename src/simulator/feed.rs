use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::error::SourceError;
use crate::logging;
use crate::model::TransactionEvent;

use super::{ShutdownSignal, SimulatorConfig};

pub type FeedItem = Result<TransactionEvent, SourceError>;

/// Geometric random walk used to price simulated transactions.
#[derive(Debug)]
pub struct PriceWalk {
    price: f64,
    volatility: f64,
    rng: StdRng,
}

impl PriceWalk {
    pub fn new(initial_price: f64, volatility: f64, rng: StdRng) -> Self {
        Self {
            price: initial_price.max(0.01),
            volatility,
            rng,
        }
    }

    pub fn from_config(config: &SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(config.initial_price, config.volatility, rng)
    }

    pub fn next_price(&mut self) -> f64 {
        let shock: f64 = self.rng.sample(StandardNormal);
        self.price = (self.price * (1.0 + shock * self.volatility)).max(0.01);
        self.price
    }
}

/// Starts the transaction generator. The returned receiver is the only
/// consumer of the feed; wrap it in a multicast before sharing it.
pub fn spawn(
    config: Arc<SimulatorConfig>,
    shutdown: watch::Receiver<ShutdownSignal>,
) -> (mpsc::Receiver<FeedItem>, JoinHandle<Result<()>>) {
    let (sender, receiver) = mpsc::channel(config.channel_capacity.max(1));
    let walk = PriceWalk::from_config(&config);
    let handle = tokio::spawn(run_transaction_generator(config, walk, sender, shutdown));
    (receiver, handle)
}

async fn run_transaction_generator(
    config: Arc<SimulatorConfig>,
    mut walk: PriceWalk,
    sender: mpsc::Sender<FeedItem>,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<()> {
    let mut ticker = time::interval(config.transaction_interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    logging::info(
        "feed.start",
        "Transaction feed started",
        json!({
            "interval_ms": config.transaction_interval.as_millis() as u64,
            "max_transactions": config.max_transactions,
        }),
    );

    let mut ticker_number: u64 = 0;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || !matches!(*shutdown.borrow(), ShutdownSignal::None) {
                    break;
                }
                continue;
            }
        }

        ticker_number += 1;
        let event = TransactionEvent::new(ticker_number, walk.next_price());
        if sender.send(Ok(event)).await.is_err() {
            logging::info_simple("feed.closed", "Transaction consumer went away");
            break;
        }

        if let Some(max) = config.max_transactions {
            if ticker_number >= max {
                logging::info(
                    "feed.limit",
                    "Transaction feed reached its budget",
                    json!({ "max_transactions": max }),
                );
                break;
            }
        }
    }

    logging::info(
        "feed.stop",
        "Transaction feed stopped",
        json!({ "emitted": ticker_number }),
    );
    Ok(())
}

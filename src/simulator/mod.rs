pub mod feed;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::stream::{BoxStream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio_stream::wrappers::ReceiverStream;

use crate::composer::SupplierTransactionService;
use crate::constants::{
    INITIAL_PRICE, PRICE_VOLATILITY, SUPPLIER_INTERVAL_MS, TRANSACTION_CHANNEL_CAPACITY,
    TRANSACTION_INTERVAL_MS,
};
use crate::error::SourceError;
use crate::logging;
use crate::model::TransactionEvent;
use crate::stream::Multicast;
use crate::ticker::SharedSupplierTicker;

#[derive(Clone, Debug)]
pub struct SimulatorConfig {
    pub transaction_interval: Duration,
    pub supplier_interval: Duration,
    pub initial_price: f64,
    pub volatility: f64,
    pub max_transactions: Option<u64>,
    pub channel_capacity: usize,
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            transaction_interval: Duration::from_millis(TRANSACTION_INTERVAL_MS),
            supplier_interval: Duration::from_millis(SUPPLIER_INTERVAL_MS),
            initial_price: INITIAL_PRICE,
            volatility: PRICE_VOLATILITY,
            max_transactions: None,
            channel_capacity: TRANSACTION_CHANNEL_CAPACITY,
            seed: None,
        }
    }
}

/// Which derived pipelines the runner prints, and how many records each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputOptions {
    pub pairs: bool,
    pub events: bool,
    pub limit: Option<usize>,
}

impl OutputOptions {
    pub fn both() -> Self {
        Self {
            pairs: true,
            events: true,
            limit: None,
        }
    }

    pub fn pairs(limit: Option<usize>) -> Self {
        Self {
            pairs: true,
            events: false,
            limit,
        }
    }

    pub fn events(limit: Option<usize>) -> Self {
        Self {
            pairs: false,
            events: true,
            limit,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownSignal {
    None,
    Graceful,
    Immediate,
}

#[derive(Serialize)]
struct OutputLine<'a, T> {
    pipeline: &'a str,
    data: &'a T,
}

pub async fn run() -> Result<()> {
    run_with_config(SimulatorConfig::default(), OutputOptions::both()).await
}

pub async fn run_with_config(config: SimulatorConfig, output: OutputOptions) -> Result<()> {
    let config = Arc::new(config);
    let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
    let signals_task = tokio::spawn(handle_signals(shutdown_tx.clone()));

    let (receiver, generator) = feed::spawn(Arc::clone(&config), shutdown_rx.clone());
    let source = Arc::new(Multicast::new(
        ReceiverStream::new(receiver),
        config.channel_capacity,
    ));
    let service = SupplierTransactionService::with_ticker(
        Arc::clone(&source),
        SharedSupplierTicker::new(config.supplier_interval),
    );

    // Subscribe both pipelines before the upstream starts flowing.
    let pairs = output.pairs.then(|| service.transaction_supplier_stream());
    let events = output.events.then(|| service.transaction_supplier_event_stream());
    let pump = source
        .connect()
        .context("transaction source was already connected")?;

    let printed = tokio::try_join!(
        print_pipeline("transaction_supplier", pairs, output.limit, shutdown_rx.clone()),
        print_pipeline("transaction_supplier_event", events, output.limit, shutdown_rx),
    );

    let _ = shutdown_tx.send(ShutdownSignal::Graceful);
    let generator_result = generator.await.context("transaction feed task panicked")?;

    signals_task.abort();
    let _ = signals_task.await;
    pump.abort();
    let _ = pump.await;

    let (pairs_printed, events_printed) = printed?;
    generator_result?;
    logging::info(
        "runner.stop",
        "Supplier stream runner finished",
        json!({ "pairs": pairs_printed, "events": events_printed }),
    );
    Ok(())
}

async fn handle_signals(shutdown_tx: watch::Sender<ShutdownSignal>) -> Result<()> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("failed to register SIGTERM handler")?;
    let mut sigint =
        signal(SignalKind::interrupt()).context("failed to register SIGINT handler")?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                logging::info(
                    "signal.received",
                    "SIGTERM received, draining pipelines",
                    json!({ "signal": "SIGTERM" })
                );
                if shutdown_tx.send(ShutdownSignal::Graceful).is_err() {
                    break;
                }
            }
            _ = sigint.recv() => {
                logging::warn(
                    "signal.received",
                    "SIGINT received, stopping immediately",
                    json!({ "signal": "SIGINT" })
                );
                let _ = shutdown_tx.send(ShutdownSignal::Immediate);
                break;
            }
        }
    }

    Ok(())
}

async fn print_pipeline<T: Serialize>(
    name: &'static str,
    stream: Option<BoxStream<'static, Result<T, SourceError>>>,
    limit: Option<usize>,
    mut shutdown: watch::Receiver<ShutdownSignal>,
) -> Result<usize> {
    let Some(mut stream) = stream else {
        return Ok(0);
    };

    let mut printed = 0usize;
    while limit.map_or(true, |limit| printed < limit) {
        tokio::select! {
            next = stream.next() => match next {
                Some(Ok(item)) => {
                    let line = serde_json::to_string(&OutputLine { pipeline: name, data: &item })
                        .context("serialize pipeline record")?;
                    println!("{line}");
                    printed += 1;
                }
                Some(Err(err)) => {
                    logging::error(
                        "pipeline.error",
                        "Pipeline terminated by upstream failure",
                        json!({ "pipeline": name, "error": err.to_string() }),
                    );
                    return Err(err).with_context(|| format!("{name} pipeline failed"));
                }
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || matches!(*shutdown.borrow(), ShutdownSignal::Immediate) {
                    break;
                }
            }
        }
    }

    logging::info(
        "pipeline.stop",
        "Pipeline output finished",
        json!({ "pipeline": name, "printed": printed }),
    );
    Ok(printed)
}

pub mod testkit {
    use super::*;

    /// Runs the simulated feed alone and collects its first `count` events.
    pub async fn collect_transactions(
        config: SimulatorConfig,
        count: usize,
    ) -> Result<Vec<TransactionEvent>> {
        let config = Arc::new(SimulatorConfig {
            max_transactions: None,
            ..config
        });
        let (shutdown_tx, shutdown_rx) = watch::channel(ShutdownSignal::None);
        let (mut receiver, generator) = feed::spawn(config, shutdown_rx);

        let mut collected = Vec::with_capacity(count);
        while collected.len() < count {
            match receiver.recv().await {
                Some(event) => collected.push(event?),
                None => break,
            }
        }

        let _ = shutdown_tx.send(ShutdownSignal::Graceful);
        drop(receiver);
        generator.await??;

        Ok(collected)
    }
}

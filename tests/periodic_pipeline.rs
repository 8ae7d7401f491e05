use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{StreamExt, TryStreamExt};
use supplier_stream::constants::SUPPLIER_USERNAMES;
use supplier_stream::model::{SupplierTransaction, SupplierTransactionEvent};
use supplier_stream::simulator::{feed, ShutdownSignal, SimulatorConfig};
use supplier_stream::stream::Multicast;
use supplier_stream::{SharedSupplierTicker, SupplierTransactionService, TransactionEvent};
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;

struct Harness {
    service: SupplierTransactionService<Arc<Multicast<TransactionEvent>>>,
    source: Arc<Multicast<TransactionEvent>>,
    shutdown: watch::Sender<ShutdownSignal>,
}

fn harness(transaction_interval: Duration, supplier_interval: Duration) -> Harness {
    harness_with(SimulatorConfig {
        transaction_interval,
        supplier_interval,
        seed: Some(0xBADF00D),
        ..SimulatorConfig::default()
    })
}

fn harness_with(config: SimulatorConfig) -> Harness {
    let config = Arc::new(config);
    let (shutdown, shutdown_rx) = watch::channel(ShutdownSignal::None);
    let (receiver, _generator) = feed::spawn(Arc::clone(&config), shutdown_rx);
    let source = Arc::new(Multicast::new(ReceiverStream::new(receiver), config.channel_capacity));
    let service = SupplierTransactionService::with_ticker(
        Arc::clone(&source),
        SharedSupplierTicker::new(config.supplier_interval),
    );

    Harness {
        service,
        source,
        shutdown,
    }
}

#[tokio::test(start_paused = true)]
async fn fast_transactions_are_gated_by_the_supplier_ticker() {
    let harness = harness(Duration::from_millis(100), Duration::from_millis(1_000));
    let summaries = harness.service.transaction_supplier_event_stream();
    let _pump = harness.source.connect().expect("connect");

    let started = Instant::now();
    let summaries: Vec<SupplierTransactionEvent> =
        summaries.take(3).try_collect().await.expect("summaries");
    let elapsed = started.elapsed();

    let counters: Vec<u64> = summaries.iter().map(|event| event.supplier_counter).collect();
    assert_eq!(counters, vec![1, 2, 3], "pairs follow arrival index, not recency");
    assert!(
        elapsed >= Duration::from_millis(3_000),
        "expected at most one summary per second, took {elapsed:?}"
    );
    assert!(elapsed < Duration::from_millis(3_500), "took {elapsed:?}");
    assert!(summaries
        .iter()
        .all(|event| SUPPLIER_USERNAMES.contains(&event.username.as_str())));

    let _ = harness.shutdown.send(ShutdownSignal::Graceful);
}

#[tokio::test(start_paused = true)]
async fn slow_transactions_hold_back_ticker_emissions() {
    let harness = harness(Duration::from_millis(1_000), Duration::from_millis(100));
    let summaries = harness.service.transaction_supplier_event_stream();
    let _pump = harness.source.connect().expect("connect");

    let started = Instant::now();
    let summaries: Vec<SupplierTransactionEvent> =
        summaries.take(3).try_collect().await.expect("summaries");

    // The feed emits at t=0, 1s and 2s; the third ticker value waited for it.
    assert_eq!(
        summaries.iter().map(|event| event.supplier_counter).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(2_000), "took {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2_500), "took {elapsed:?}");

    let _ = harness.shutdown.send(ShutdownSignal::Graceful);
}

#[tokio::test(start_paused = true)]
async fn concurrent_summary_pipelines_share_the_ticker() {
    let harness = harness(Duration::from_millis(100), Duration::from_millis(500));
    let first = harness.service.transaction_supplier_event_stream();
    let second = harness.service.transaction_supplier_event_stream();
    assert_eq!(harness.service.supplier_ticker().subscriber_count(), 2);
    let _pump = harness.source.connect().expect("connect");

    let (first, second) = tokio::join!(
        first.take(4).try_collect::<Vec<SupplierTransactionEvent>>(),
        second.take(4).try_collect::<Vec<SupplierTransactionEvent>>()
    );
    let view = |events: Vec<SupplierTransactionEvent>| {
        events
            .into_iter()
            .map(|event| (event.supplier_counter, event.username, event.price))
            .collect::<Vec<_>>()
    };

    assert_eq!(view(first.expect("first")), view(second.expect("second")));
    assert!(!harness.service.supplier_ticker().is_active());

    let _ = harness.shutdown.send(ShutdownSignal::Graceful);
}

#[tokio::test(start_paused = true)]
async fn graceful_feed_shutdown_ends_the_pipelines() {
    let harness = harness(Duration::from_millis(100), Duration::from_millis(100));
    let pairs = harness.service.transaction_supplier_stream();
    let _pump = harness.source.connect().expect("connect");

    let shutdown = harness.shutdown;
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(450)).await;
        let _ = shutdown.send(ShutdownSignal::Graceful);
    });

    let pairs: Vec<_> = pairs.collect().await;
    assert_eq!(pairs.len(), 5, "feed emits at 0, 100, 200, 300 and 400 ms");
    assert!(pairs.iter().all(Result::is_ok));
}

#[tokio::test(start_paused = true)]
async fn summaries_stay_index_aligned_past_every_buffer() {
    // Default cadence: ten transactions per supplier tick. By 600 summaries the
    // backlog is far larger than the feed, multicast and zip buffers combined.
    let harness = harness_with(SimulatorConfig {
        seed: Some(7),
        ..SimulatorConfig::default()
    });
    let summaries = harness.service.transaction_supplier_event_stream();
    let _pump = harness.source.connect().expect("connect");

    let started = Instant::now();
    let summaries: Vec<SupplierTransactionEvent> =
        summaries.take(600).try_collect().await.expect("summaries");

    let counters: Vec<u64> = summaries.iter().map(|event| event.supplier_counter).collect();
    assert_eq!(counters, (1..=600).collect::<Vec<_>>());
    assert!(started.elapsed() >= Duration::from_secs(600));

    let _ = harness.shutdown.send(ShutdownSignal::Graceful);
}

#[tokio::test(start_paused = true)]
async fn both_pipelines_see_every_transaction_while_the_ticker_paces_the_feed() {
    let harness = harness_with(SimulatorConfig {
        seed: Some(11),
        ..SimulatorConfig::default()
    });
    let pairs = harness.service.transaction_supplier_stream();
    let summaries = harness.service.transaction_supplier_event_stream();
    let _pump = harness.source.connect().expect("connect");

    let (pairs, summaries) = tokio::join!(
        pairs.take(1_500).try_collect::<Vec<SupplierTransaction>>(),
        summaries.take(500).try_collect::<Vec<SupplierTransactionEvent>>()
    );

    let tickers: Vec<u64> = pairs
        .expect("pairs")
        .iter()
        .map(|pair| pair.transaction_event.ticker_number)
        .collect();
    assert_eq!(tickers, (1..=1_500).collect::<Vec<_>>());

    let counters: Vec<u64> = summaries
        .expect("summaries")
        .iter()
        .map(|event| event.supplier_counter)
        .collect();
    assert_eq!(counters, (1..=500).collect::<Vec<_>>());

    let _ = harness.shutdown.send(ShutdownSignal::Graceful);
}

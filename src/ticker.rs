use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::wrappers::ReceiverStream;

use crate::constants::SUPPLIER_CHANNEL_CAPACITY;
use crate::logging;
use crate::model::Supplier;
use crate::supplier::random_supplier;

pub type SupplierTickStream = BoxStream<'static, Supplier>;

/// A source of periodically emitted suppliers shared between subscribers.
pub trait SupplierTicks: Send + Sync {
    fn supplier_ticks(&self) -> SupplierTickStream;
}

/// Periodic supplier sequence backed by a single timer task.
///
/// The first subscriber activates the ticker: one task generates a supplier
/// every `interval` (the first one a full interval after activation) and
/// hands it to every subscriber, so all subscribers see the same supplier for
/// a given tick. Each subscriber has a bounded queue; when one is full the
/// timer waits for it instead of dropping ticks. When the last subscription
/// is dropped the task is aborted; a later subscription activates a fresh,
/// independent ticker.
///
/// Must be subscribed from within a Tokio runtime.
#[derive(Clone)]
pub struct SharedSupplierTicker {
    shared: Arc<TickerShared>,
}

struct TickerShared {
    interval: Duration,
    capacity: usize,
    activation: Mutex<Option<Activation>>,
}

type Senders = Arc<Mutex<Vec<mpsc::Sender<Supplier>>>>;

struct Activation {
    senders: Senders,
    task: JoinHandle<()>,
    subscribers: usize,
}

impl SharedSupplierTicker {
    pub fn new(interval: Duration) -> Self {
        Self::with_capacity(interval, SUPPLIER_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(interval: Duration, capacity: usize) -> Self {
        Self {
            shared: Arc::new(TickerShared {
                interval: interval.max(Duration::from_millis(1)),
                capacity: capacity.max(1),
                activation: Mutex::new(None),
            }),
        }
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    pub fn subscribe(&self) -> TickerSubscription {
        let (sender, receiver) = mpsc::channel(self.shared.capacity);

        let mut guard = self.shared.activation.lock();
        let activation = guard.get_or_insert_with(|| self.shared.activate());
        activation.subscribers += 1;
        activation.senders.lock().push(sender);

        TickerSubscription {
            inner: ReceiverStream::new(receiver),
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .activation
            .lock()
            .as_ref()
            .map_or(0, |activation| activation.subscribers)
    }

    pub fn is_active(&self) -> bool {
        self.shared.activation.lock().is_some()
    }
}

impl SupplierTicks for SharedSupplierTicker {
    fn supplier_ticks(&self) -> SupplierTickStream {
        self.subscribe().boxed()
    }
}

impl TickerShared {
    fn activate(&self) -> Activation {
        let senders: Senders = Arc::new(Mutex::new(Vec::new()));
        let task = tokio::spawn(run_ticker(self.interval, Arc::clone(&senders)));
        Activation {
            senders,
            task,
            subscribers: 0,
        }
    }
}

async fn run_ticker(period: Duration, senders: Senders) {
    logging::info(
        "ticker.start",
        "Supplier ticker activated",
        json!({ "interval_ms": period.as_millis() as u64 }),
    );

    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let supplier = random_supplier();
        let current = senders.lock().clone();

        let mut closed = false;
        for sender in &current {
            closed |= sender.send(supplier.clone()).await.is_err();
        }
        if closed {
            senders.lock().retain(|sender| !sender.is_closed());
        }
    }
}

/// A live subscription to a [`SharedSupplierTicker`].
#[must_use = "streams do nothing unless polled"]
pub struct TickerSubscription {
    inner: ReceiverStream<Supplier>,
    shared: Arc<TickerShared>,
}

impl Stream for TickerSubscription {
    type Item = Supplier;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for TickerSubscription {
    fn drop(&mut self) {
        let mut guard = self.shared.activation.lock();
        let Some(activation) = guard.as_mut() else {
            return;
        };

        activation.subscribers = activation.subscribers.saturating_sub(1);
        if activation.subscribers == 0 {
            if let Some(activation) = guard.take() {
                activation.task.abort();
                logging::info_simple("ticker.stop", "Last subscriber left, supplier ticker stopped");
            }
        }
    }
}

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::ready;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::SourceError;
use crate::logging;

type Item<T> = Result<T, SourceError>;

/// Hot fan-out over a single-consumer upstream.
///
/// Subscribers receive every item published after they subscribed. Nothing is
/// pulled from the upstream until [`Multicast::connect`] is called, so
/// subscribers registered first observe the full sequence. Each subscriber has
/// its own bounded queue and the pump waits for room in every live queue, so
/// the upstream advances at the pace of the slowest subscriber and no item is
/// skipped. The first upstream error is delivered to every subscriber and ends
/// the multicast.
pub struct Multicast<T> {
    capacity: usize,
    subscribers: Arc<Mutex<Subscribers<T>>>,
    pending: Mutex<Option<BoxStream<'static, Item<T>>>>,
}

struct Subscribers<T> {
    senders: Vec<mpsc::Sender<Item<T>>>,
    finished: bool,
}

impl<T> Subscribers<T> {
    fn finish(&mut self) {
        self.finished = true;
        self.senders.clear();
    }
}

impl<T> Multicast<T>
where
    T: Clone + Send + 'static,
{
    pub fn new<S>(upstream: S, capacity: usize) -> Self
    where
        S: Stream<Item = Item<T>> + Send + 'static,
    {
        Self {
            capacity: capacity.max(1),
            subscribers: Arc::new(Mutex::new(Subscribers {
                senders: Vec::new(),
                finished: false,
            })),
            pending: Mutex::new(Some(upstream.boxed())),
        }
    }

    /// A subscription taken after the upstream finished ends immediately.
    pub fn subscribe(&self) -> MulticastStream<T> {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let mut subscribers = self.subscribers.lock();
        if !subscribers.finished {
            subscribers.senders.push(sender);
        }

        MulticastStream {
            inner: ReceiverStream::new(receiver),
            done: false,
        }
    }

    /// Starts pulling from the upstream. Returns `None` when already connected.
    pub fn connect(&self) -> Option<JoinHandle<()>> {
        let upstream = self.pending.lock().take()?;
        let subscribers = FinishOnDrop(Arc::clone(&self.subscribers));
        Some(tokio::spawn(pump(upstream, subscribers)))
    }

    pub fn is_connected(&self) -> bool {
        self.pending.lock().is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().senders.len()
    }
}

/// Closes every subscription when the pump ends, including on abort.
struct FinishOnDrop<T>(Arc<Mutex<Subscribers<T>>>);

impl<T> Drop for FinishOnDrop<T> {
    fn drop(&mut self) {
        self.0.lock().finish();
    }
}

async fn pump<T>(mut upstream: BoxStream<'static, Item<T>>, subscribers: FinishOnDrop<T>)
where
    T: Clone + Send + 'static,
{
    logging::info_simple("multicast.connect", "Upstream connected to multicast");

    let mut forwarded: u64 = 0;
    while let Some(item) = upstream.next().await {
        let failed = match &item {
            Ok(_) => false,
            Err(err) => {
                logging::error(
                    "multicast.upstream_error",
                    "Upstream failed, closing multicast",
                    json!({ "error": err.to_string() }),
                );
                true
            }
        };

        publish(&subscribers.0, item).await;
        if failed {
            break;
        }
        forwarded = forwarded.saturating_add(1);
    }

    logging::info(
        "multicast.complete",
        "Upstream finished",
        json!({ "forwarded": forwarded }),
    );
}

async fn publish<T: Clone>(subscribers: &Mutex<Subscribers<T>>, item: Item<T>) {
    let senders = subscribers.lock().senders.clone();

    let mut closed = 0usize;
    for sender in &senders {
        if sender.send(item.clone()).await.is_err() {
            closed += 1;
        }
    }

    if closed > 0 {
        let mut subscribers = subscribers.lock();
        subscribers.senders.retain(|sender| !sender.is_closed());
        logging::info(
            "multicast.unsubscribe",
            "Subscribers left the multicast",
            json!({ "closed": closed, "remaining": subscribers.senders.len() }),
        );
    }
}

/// One subscriber's view of a [`Multicast`].
#[must_use = "streams do nothing unless polled"]
pub struct MulticastStream<T> {
    inner: ReceiverStream<Item<T>>,
    done: bool,
}

impl<T> Stream for MulticastStream<T> {
    type Item = Item<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        match ready!(self.inner.poll_next_unpin(cx)) {
            Some(Ok(value)) => Poll::Ready(Some(Ok(value))),
            Some(Err(err)) => {
                self.done = true;
                Poll::Ready(Some(Err(err)))
            }
            None => {
                self.done = true;
                Poll::Ready(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_the_full_upstream() {
        let multicast = Multicast::new(stream::iter((1..=5).map(Ok)), 16);
        let first = multicast.subscribe();
        let second = multicast.subscribe();

        let pump = multicast.connect().expect("first connect");
        let (first, second): (Vec<Item<u32>>, Vec<Item<u32>>) =
            tokio::join!(first.collect(), second.collect());
        pump.await.unwrap();

        let expected: Vec<Item<u32>> = (1..=5).map(Ok).collect();
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }

    #[tokio::test]
    async fn connect_happens_once() {
        let multicast = Multicast::<u32>::new(stream::empty(), 4);
        assert!(!multicast.is_connected());
        assert!(multicast.connect().is_some());
        assert!(multicast.is_connected());
        assert!(multicast.connect().is_none());
    }

    #[tokio::test]
    async fn upstream_error_reaches_all_subscribers_then_ends() {
        let upstream = stream::iter(vec![
            Ok(1),
            Err(SourceError::upstream("feed crashed")),
            Ok(2),
        ]);
        let multicast = Multicast::new(upstream, 8);
        let mut first = multicast.subscribe();
        let mut second = multicast.subscribe();
        let _pump = multicast.connect().expect("connect");

        for subscriber in [&mut first, &mut second] {
            assert_eq!(subscriber.next().await, Some(Ok(1)));
            assert_eq!(
                subscriber.next().await,
                Some(Err(SourceError::upstream("feed crashed")))
            );
            assert_eq!(subscriber.next().await, None);
        }
    }

    #[tokio::test]
    async fn dropping_one_subscriber_leaves_the_other_running() {
        let (tx, rx) = mpsc::channel(8);
        let multicast = Multicast::new(ReceiverStream::new(rx), 8);
        let mut kept = multicast.subscribe();
        let dropped = multicast.subscribe();
        let _pump = multicast.connect().expect("connect");

        tx.send(Ok(10u32)).await.unwrap();
        drop(dropped);
        tx.send(Ok(11)).await.unwrap();
        drop(tx);

        assert_eq!(kept.next().await, Some(Ok(10)));
        assert_eq!(kept.next().await, Some(Ok(11)));
        assert_eq!(kept.next().await, None);
    }

    #[tokio::test]
    async fn slow_subscriber_paces_the_upstream_without_losing_items() {
        let multicast = Multicast::new(stream::iter((1..=10).map(Ok)), 2);
        let slow = multicast.subscribe();
        let pump = multicast.connect().expect("connect");

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!pump.is_finished(), "pump must wait for the slow subscriber");

        let received: Vec<Item<u32>> = slow.collect().await;
        assert_eq!(received, (1..=10).map(Ok).collect::<Vec<_>>());
        pump.await.unwrap();
    }

    #[tokio::test]
    async fn dropping_a_stalled_subscriber_releases_the_pump() {
        let multicast = Multicast::new(stream::iter((1..=5).map(Ok)), 1);
        let mut kept = multicast.subscribe();
        let stalled = multicast.subscribe();
        let pump = multicast.connect().expect("connect");

        assert_eq!(kept.next().await, Some(Ok(1)));
        drop(stalled);

        let rest: Vec<Item<u32>> = kept.collect().await;
        assert_eq!(rest, (2..=5).map(Ok).collect::<Vec<_>>());
        pump.await.unwrap();
        assert_eq!(multicast.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn subscribing_after_completion_ends_immediately() {
        let multicast = Multicast::new(stream::iter((1..=3).map(Ok)), 4);
        multicast.connect().expect("connect").await.unwrap();

        let mut late = multicast.subscribe();
        assert_eq!(late.next().await, None::<Item<u32>>);
    }

    #[tokio::test]
    async fn aborting_the_pump_ends_subscriptions() {
        let (_tx, rx) = mpsc::channel::<Item<u32>>(1);
        let multicast = Multicast::new(ReceiverStream::new(rx), 4);
        let mut subscriber = multicast.subscribe();
        let pump = multicast.connect().expect("connect");

        pump.abort();
        let _ = pump.await;
        assert_eq!(subscriber.next().await, None);
    }
}

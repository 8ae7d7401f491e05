use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use serde_json::json;

use crate::constants::{SUPPLIER_INTERVAL_MS, ZIP_BUFFER_CAPACITY};
use crate::error::SourceError;
use crate::logging;
use crate::model::{SupplierTransaction, SupplierTransactionEvent, TransactionEvent};
use crate::stream::{fail_fast, AlignedZipExt, Multicast};
use crate::supplier::random_supplier;
use crate::ticker::{SharedSupplierTicker, SupplierTicks};

pub type TransactionStream = BoxStream<'static, Result<TransactionEvent, SourceError>>;
pub type SupplierTransactionStream = BoxStream<'static, Result<SupplierTransaction, SourceError>>;
pub type SupplierTransactionEventStream =
    BoxStream<'static, Result<SupplierTransactionEvent, SourceError>>;

/// Upstream of transaction events. Each call must return an independent
/// subscription to the same sequence.
pub trait TransactionSource: Send + Sync {
    fn transaction_stream(&self) -> TransactionStream;
}

impl<S: TransactionSource + ?Sized> TransactionSource for Arc<S> {
    fn transaction_stream(&self) -> TransactionStream {
        (**self).transaction_stream()
    }
}

impl TransactionSource for Multicast<TransactionEvent> {
    fn transaction_stream(&self) -> TransactionStream {
        self.subscribe().boxed()
    }
}

/// Derives the supplier-enriched pipelines from a transaction source.
pub struct SupplierTransactionService<S, P = SharedSupplierTicker> {
    transactions: S,
    supplier_ticker: P,
    zip_capacity: usize,
}

impl<S: TransactionSource> SupplierTransactionService<S> {
    /// Uses a shared ticker refreshing the supplier every second.
    pub fn new(transactions: S) -> Self {
        Self::with_ticker(
            transactions,
            SharedSupplierTicker::new(Duration::from_millis(SUPPLIER_INTERVAL_MS)),
        )
    }
}

impl<S, P> SupplierTransactionService<S, P>
where
    S: TransactionSource,
    P: SupplierTicks,
{
    pub fn with_ticker(transactions: S, supplier_ticker: P) -> Self {
        Self {
            transactions,
            supplier_ticker,
            zip_capacity: ZIP_BUFFER_CAPACITY,
        }
    }

    /// Bounds how many unmatched items the periodic pipeline buffers per side.
    pub fn with_zip_capacity(mut self, capacity: usize) -> Self {
        self.zip_capacity = capacity.max(1);
        self
    }

    pub fn supplier_ticker(&self) -> &P {
        &self.supplier_ticker
    }

    /// Every transaction paired with a freshly generated supplier, in
    /// upstream order.
    pub fn transaction_supplier_stream(&self) -> SupplierTransactionStream {
        logging::info(
            "composer.subscribe",
            "Transaction supplier pipeline subscribed",
            json!({ "pipeline": "transaction_supplier" }),
        );

        fail_fast(self.transactions.transaction_stream())
            .map_ok(|event| SupplierTransaction::new(random_supplier(), event))
            .boxed()
    }

    /// The Nth transaction zipped with the Nth periodic supplier. Emits no
    /// faster than the slower of the two inputs.
    pub fn transaction_supplier_event_stream(&self) -> SupplierTransactionEventStream {
        logging::info(
            "composer.subscribe",
            "Transaction supplier event pipeline subscribed",
            json!({ "pipeline": "transaction_supplier_event", "zip_capacity": self.zip_capacity }),
        );

        let transactions = fail_fast(self.transactions.transaction_stream());
        let suppliers = self.supplier_ticker.supplier_ticks();

        transactions
            .zip_aligned_with_capacity(suppliers, self.zip_capacity)
            .map_ok(|(event, supplier)| SupplierTransactionEvent::from_pair(&event, &supplier))
            .boxed()
    }
}

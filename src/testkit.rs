//! Scripted collaborators for driving the composer deterministically.

use futures_util::stream::{self, StreamExt};

use crate::composer::{TransactionSource, TransactionStream};
use crate::error::SourceError;
use crate::model::{Supplier, TransactionEvent};
use crate::ticker::{SupplierTickStream, SupplierTicks};

/// Replays the same transaction items to every subscriber.
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    items: Vec<Result<TransactionEvent, SourceError>>,
}

impl ReplaySource {
    pub fn new(events: impl IntoIterator<Item = TransactionEvent>) -> Self {
        Self {
            items: events.into_iter().map(Ok).collect(),
        }
    }

    /// Appends a failure after the scripted events.
    pub fn failing_with(mut self, error: SourceError) -> Self {
        self.items.push(Err(error));
        self
    }
}

impl TransactionSource for ReplaySource {
    fn transaction_stream(&self) -> TransactionStream {
        stream::iter(self.items.clone()).boxed()
    }
}

/// Ticker that emits a fixed list of suppliers immediately, identical for
/// every subscriber.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTicker {
    suppliers: Vec<Supplier>,
}

impl ScriptedTicker {
    pub fn new(suppliers: impl IntoIterator<Item = Supplier>) -> Self {
        Self {
            suppliers: suppliers.into_iter().collect(),
        }
    }
}

impl SupplierTicks for ScriptedTicker {
    fn supplier_ticks(&self) -> SupplierTickStream {
        stream::iter(self.suppliers.clone()).boxed()
    }
}

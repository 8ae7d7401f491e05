use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::PRICE_DECIMALS;
use crate::format::round_price;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: Uuid,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub price: f64,
}

/// A trade published by the upstream source. `ticker_number` increases by one
/// per event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub ticker_number: u64,
    pub transaction: Transaction,
}

impl TransactionEvent {
    pub fn new(ticker_number: u64, price: f64) -> Self {
        Self {
            ticker_number,
            transaction: Transaction { price },
        }
    }

    pub fn price(&self) -> f64 {
        self.transaction.price
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierTransaction {
    pub supplier: Supplier,
    pub transaction_event: TransactionEvent,
}

impl SupplierTransaction {
    pub fn new(supplier: Supplier, transaction_event: TransactionEvent) -> Self {
        Self {
            supplier,
            transaction_event,
        }
    }
}

/// Summary record built when a transaction is zipped with a ticker supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierTransactionEvent {
    pub supplier_counter: u64,
    pub username: String,
    pub price: f64,
    pub timestamp: DateTime<Utc>,
}

impl SupplierTransactionEvent {
    /// Pairs `event` with `supplier`, stamping the current wall-clock time.
    pub fn from_pair(event: &TransactionEvent, supplier: &Supplier) -> Self {
        Self {
            supplier_counter: event.ticker_number,
            username: supplier.username.clone(),
            price: round_price(event.price(), PRICE_DECIMALS),
            timestamp: Utc::now(),
        }
    }
}

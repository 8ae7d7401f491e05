pub mod cli;
pub mod composer;
pub mod constants;
pub mod error;
pub mod format;
pub mod logging;
pub mod model;
pub mod simulator;
pub mod stream;
pub mod supplier;
pub mod testkit;
pub mod ticker;

pub use composer::{SupplierTransactionService, TransactionSource};
pub use error::SourceError;
pub use model::{Supplier, SupplierTransaction, SupplierTransactionEvent, TransactionEvent};
pub use ticker::{SharedSupplierTicker, SupplierTicks};

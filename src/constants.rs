pub const TRANSACTION_INTERVAL_MS: u64 = 100;
pub const SUPPLIER_INTERVAL_MS: u64 = 1_000;
pub const PRICE_DECIMALS: u32 = 4;
pub const INITIAL_PRICE: f64 = 100.0;
pub const PRICE_VOLATILITY: f64 = 0.002;
pub const TRANSACTION_CHANNEL_CAPACITY: usize = 1_024;
pub const SUPPLIER_CHANNEL_CAPACITY: usize = 64;
pub const ZIP_BUFFER_CAPACITY: usize = 256;
pub const SUPPLIER_USERNAMES: [&str; 5] = ["Lindsay", "Flo", "Ludo", "Nico", "Samy"];

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds `value` to at most `decimals` fractional digits, half away from zero.
///
/// Rounding happens on the shortest decimal string that round-trips `value`,
/// and the rounded string is parsed back into an `f64`. A value such as
/// `1.00005`, stored in binary as `1.0000499999...`, still rounds up to
/// `1.0001`. Values the decimal type cannot hold are returned unchanged.
pub fn round_price(value: f64, decimals: u32) -> f64 {
    let Ok(decimal) = Decimal::from_str(&value.to_string()) else {
        return value;
    };

    decimal
        .round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero)
        .to_string()
        .parse()
        .unwrap_or(value)
}

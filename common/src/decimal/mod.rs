//! Decimal type utilities for precise financial calculations

use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;

/// Price type with high precision
pub type Price = Decimal;

/// Quantity type with high precision
pub type Quantity = Decimal;

/// Amount type with high precision (typically Price * Quantity)
pub type Amount = Decimal;

/// Tolerance for the staleness check between a caller-quoted price and the
/// authoritative current price. Quotes drifting further than this are
/// rejected with `PriceStale`.
pub fn price_epsilon() -> Price {
    // 1e-8
    Decimal::new(1, 8)
}

/// Returns true when two prices agree within [`price_epsilon`].
pub fn prices_agree(current: Price, quoted: Price) -> bool {
    (current - quoted).abs() <= price_epsilon()
}

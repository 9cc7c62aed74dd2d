//! Fixed-point helpers
//!
//! Every quantity or price that gates a trade, or that is shown to a
//! human, is scaled to 8 fractional digits with banker's rounding.

use rust_decimal::{Decimal, RoundingStrategy};

/// Fractional digits used for trade quantities and prices
pub const SCALE: u32 = 8;

/// Round to 8 fractional digits, half-even
pub fn round8(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Round to 2 fractional digits, half-even (percentages)
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// `numerator / denominator` at 8 fractional digits, `None` on a zero denominator
pub fn div8(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    numerator.checked_div(denominator).map(round8)
}

/// Percentage `part / whole * 100`, rounded to 2 digits
pub fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    div8(part, whole).map(|ratio| round2(ratio * Decimal::ONE_HUNDRED))
}

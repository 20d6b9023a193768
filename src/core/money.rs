//! Fixed-point arithmetic for hours and money.
//!
//! All quantities are `Decimal` at scale 2. Every helper takes or applies an explicit
//! scale and rounding strategy; nothing in the retainer path touches floating point.

use rust_decimal::{Decimal, RoundingStrategy};

/// Scale of every stored hour and money amount.
pub const SCALE: u32 = 2;

/// Half-up rounding: midpoints round away from zero.
pub const HALF_UP: RoundingStrategy = RoundingStrategy::MidpointAwayFromZero;

const MINUTES_PER_HOUR: Decimal = Decimal::from_parts(60, 0, 0, false, 0);

/// Rounds `value` to `scale` places with `strategy`, padding so the result always
/// carries exactly `scale` fractional digits.
#[must_use]
pub fn round(value: Decimal, scale: u32, strategy: RoundingStrategy) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(scale, strategy);
    rounded.rescale(scale);
    rounded
}

/// Rounds to the stored scale, half-up.
#[must_use]
pub fn round2(value: Decimal) -> Decimal {
    round(value, SCALE, HALF_UP)
}

/// Converts a minute total into hours at scale 2, half-up.
#[must_use]
pub fn minutes_to_hours(minutes: i64) -> Decimal {
    round(Decimal::from(minutes) / MINUTES_PER_HOUR, SCALE, HALF_UP)
}

/// `part / whole * 100` at scale 2, half-up. `None` when `whole` is not positive.
#[must_use]
pub fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    if whole <= Decimal::ZERO {
        return None;
    }
    Some(round(
        part * Decimal::ONE_HUNDRED / whole,
        SCALE,
        HALF_UP,
    ))
}

/// `max(0, a - b)` at scale 2.
#[must_use]
pub fn positive_difference(a: Decimal, b: Decimal) -> Decimal {
    round2((a - b).max(Decimal::ZERO))
}

/// Hours left in a period: `max(0, allocated - consumed)`, or zero when there is no
/// allocation (fixed fee).
#[must_use]
pub fn remaining_hours(allocated: Option<Decimal>, consumed: Decimal) -> Decimal {
    allocated.map_or_else(
        || round2(Decimal::ZERO),
        |allocated| positive_difference(allocated, consumed),
    )
}

/// `quantity * unit_price` at scale 2, half-up.
#[must_use]
pub fn line_amount(quantity: Decimal, unit_price: Decimal) -> Decimal {
    round2(quantity * unit_price)
}

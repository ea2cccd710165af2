use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a percentage to two decimal places, half away from zero (84.005 -> 84.01).
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Converts an intermediate floating point percentage into a decimal.
///
/// Uses the shortest decimal representation of the float, so 84.005_f64 becomes 84.005
/// and not 84.00499999.... Non-finite values become zero.
pub fn decimal_from_f64(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Ceiling of `minutes * factor` as whole minutes.
pub fn ceil_minutes(minutes: i64, factor: Decimal) -> i64 {
    (Decimal::from(minutes) * factor)
        .ceil()
        .to_i64()
        .unwrap_or(i64::MAX)
}

/// Arithmetic mean rounded as a percentage. Zero for an empty input.
pub fn mean_percent<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    let mut sum = Decimal::ZERO;
    let mut count: u32 = 0;
    for v in values {
        sum += v;
        count += 1;
    }
    if count == 0 {
        return Decimal::ZERO;
    }
    round_percent(sum / Decimal::from(count))
}

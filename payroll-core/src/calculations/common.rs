//! Shared arithmetic helpers for the withholding and benefit calculations.

use rust_decimal::Decimal;

/// Months per year; every monthly input is annualised with this factor.
pub const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Rounds a decimal value to exactly two decimal places using half-up rounding.
///
/// Values at exactly 0.005 are rounded away from zero. The statutory
/// calculations never round internally; this is only applied to reported
/// figures.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::round_half_up;
///
/// assert_eq!(round_half_up(dec!(4744.6547905524224)), dec!(4744.65));
/// assert_eq!(round_half_up(dec!(123.455)), dec!(123.46));
/// ```
pub fn round_half_up(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Clamps a value to be at least zero.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use payroll_core::calculations::common::floor_at_zero;
///
/// assert_eq!(floor_at_zero(dec!(-12.50)), dec!(0));
/// assert_eq!(floor_at_zero(dec!(12.50)), dec!(12.50));
/// ```
pub fn floor_at_zero(value: Decimal) -> Decimal {
    if value > Decimal::ZERO { value } else { Decimal::ZERO }
}

/// Converts a monthly amount into an annual one.
pub fn annualize(monthly: Decimal) -> Decimal {
    monthly * MONTHS_PER_YEAR
}

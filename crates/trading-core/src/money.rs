//! Conversions between indicator-space `f64` and ledger-space `Decimal`.

use num_traits::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places quantities are floored to.
pub const LOT_PRECISION: u32 = 3;

/// Convert an `f64` into a `Decimal`, mapping NaN/Inf and out-of-range values to zero.
pub fn to_decimal(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

/// Convert a `Decimal` into an `f64`.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Floor a quantity to the lot precision.
pub fn floor_lot(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(LOT_PRECISION, RoundingStrategy::ToZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_to_decimal_guards_non_finite() {
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
        assert_eq!(to_decimal(f64::INFINITY), Decimal::ZERO);
        assert_eq!(to_decimal(1.5), dec!(1.5));
    }

    #[test]
    fn test_floor_lot() {
        assert_eq!(floor_lot(dec!(1.23456)), dec!(1.234));
        assert_eq!(floor_lot(dec!(0.0009)), dec!(0));
        assert_eq!(floor_lot(dec!(20)), dec!(20));
    }

    #[test]
    fn test_to_f64() {
        assert!((to_f64(dec!(101.25)) - 101.25).abs() < 1e-12);
    }
}

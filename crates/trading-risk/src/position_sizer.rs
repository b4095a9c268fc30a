//! Position sizing.

use rust_decimal::Decimal;
use trading_core::money::floor_lot;

/// Sizes positions so that a stop-out loses a fixed fraction of the balance.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionSizer {
    /// Fraction of the balance risked per trade
    risk_per_trade: Decimal,
    /// Largest fraction of the balance a single position may cost
    max_position_fraction: Decimal,
}

impl PositionSizer {
    pub fn new(risk_per_trade: Decimal, max_position_fraction: Decimal) -> Self {
        Self {
            risk_per_trade,
            max_position_fraction,
        }
    }

    /// Quantity to trade, floored to the lot precision.
    ///
    /// Returns zero when the entry is not positive or the stop sits at the
    /// entry; callers treat zero as "do not trade".
    pub fn calculate(&self, balance: Decimal, entry: Decimal, stop: Decimal) -> Decimal {
        if entry <= Decimal::ZERO || balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let price_risk = (entry - stop).abs();
        if price_risk.is_zero() {
            return Decimal::ZERO;
        }

        let by_risk = balance * self.risk_per_trade / price_risk;
        let by_cost = balance * self.max_position_fraction / entry;
        floor_lot(by_risk.min(by_cost)).max(Decimal::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> PositionSizer {
        PositionSizer::new(dec!(0.05), dec!(0.2))
    }

    #[test]
    fn test_cost_cap_applies() {
        // risk 500 / 2 = 250, capped at 2000 / 100 = 20
        assert_eq!(sizer().calculate(dec!(10000), dec!(100), dec!(98)), dec!(20));
    }

    #[test]
    fn test_risk_limited_size() {
        // risk 500 / 50 = 10, cap 20
        assert_eq!(sizer().calculate(dec!(10000), dec!(100), dec!(50)), dec!(10));
    }

    #[test]
    fn test_zero_price_risk() {
        assert_eq!(sizer().calculate(dec!(10000), dec!(100), dec!(100)), Decimal::ZERO);
        assert_eq!(sizer().calculate(dec!(10000), Decimal::ZERO, dec!(1)), Decimal::ZERO);
    }

    #[test]
    fn test_floored_to_lot() {
        // 500 / 3 = 166.666.. capped at 2000 / 7 = 285.7..
        assert_eq!(sizer().calculate(dec!(10000), dec!(7), dec!(10)), dec!(166.666));
    }
}

//! Portfolio-level risk limits.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of a limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum LimitCheck {
    /// Trade allowed
    Allowed,
    /// Trade blocked with reason
    Blocked { reason: String },
}

impl LimitCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, LimitCheck::Allowed)
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, LimitCheck::Blocked { .. })
    }
}

/// Exposure and daily-loss circuit breakers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioLimits {
    /// Largest fraction of the balance a single position may cost
    pub max_position_fraction: Decimal,
    /// Total exposure allowed, in multiples of the single-position cap
    pub exposure_multiple: Decimal,
    /// Daily loss, as a fraction of the balance, that halts new entries
    pub daily_loss_limit: Decimal,
}

impl PortfolioLimits {
    /// Largest total exposure allowed at `balance`.
    pub fn max_exposure(&self, balance: Decimal) -> Decimal {
        balance * self.max_position_fraction * self.exposure_multiple
    }

    /// Check if a new position may be opened.
    pub fn check_new_position(
        &self,
        balance: Decimal,
        exposure: Decimal,
        daily_pnl: Decimal,
    ) -> LimitCheck {
        let max_exposure = self.max_exposure(balance);
        if exposure >= max_exposure {
            return LimitCheck::Blocked {
                reason: format!(
                    "Exposure limit reached: {:.2} (limit: {:.2})",
                    exposure, max_exposure
                ),
            };
        }

        let loss_floor = -(balance * self.daily_loss_limit);
        if daily_pnl < loss_floor {
            return LimitCheck::Blocked {
                reason: format!(
                    "Daily loss limit reached: {:.2} (limit: {:.2})",
                    daily_pnl, loss_floor
                ),
            };
        }

        LimitCheck::Allowed
    }
}

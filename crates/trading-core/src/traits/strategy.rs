//! Strategy trait definitions.

use crate::error::StrategyError;
use crate::types::{Candle, Position, PositionSide};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// State of a strategy for monitoring and serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyState {
    /// Strategy name
    pub name: String,
    /// Whether the strategy has enough data to propose trades
    pub is_warmed_up: bool,
    /// Number of candles processed
    pub candles_processed: usize,
    /// Number of non-hold proposals made
    pub proposals_made: usize,
    /// Current indicator or model values
    pub indicators: HashMap<String, f64>,
    /// Custom strategy-specific state
    pub custom: serde_json::Value,
}

impl Default for StrategyState {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_warmed_up: false,
            candles_processed: 0,
            proposals_made: 0,
            indicators: HashMap::new(),
            custom: serde_json::Value::Null,
        }
    }
}

/// Account and market view handed to a strategy.
#[derive(Debug, Clone, Copy)]
pub struct StrategyContext<'a> {
    /// Symbol being traded
    pub symbol: &'a str,
    /// Latest known price
    pub price: f64,
    /// Free balance of the account
    pub balance: f64,
    /// Number of positions open across all symbols
    pub open_positions: usize,
    /// Open position on `symbol`, if any
    pub position: Option<&'a Position>,
}

/// What a strategy wants the engine to do.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeProposal {
    /// Open a new position.
    Open {
        side: PositionSide,
        quantity: f64,
        stop_loss: f64,
        take_profit: f64,
        reason: String,
    },
    /// Close the open position.
    Close { reason: String },
    /// Do nothing.
    Hold,
}

/// Core strategy trait.
///
/// A strategy proposes a trade given the current price and account state; the
/// engine decides whether and how to execute it.
pub trait Strategy: Send + Sync {
    /// Get the unique name of this strategy.
    fn name(&self) -> &str;

    /// Feed a final candle into the strategy's model.
    fn on_candle(&mut self, _candle: &Candle) {}

    /// Propose a trade for the current market state.
    ///
    /// # Arguments
    /// * `ctx` - Price, balance and position view for the traded symbol
    ///
    /// # Returns
    /// The proposed action; `TradeProposal::Hold` when no action is needed
    fn propose(&mut self, ctx: &StrategyContext<'_>) -> TradeProposal;

    /// Reset the strategy state.
    fn reset(&mut self);

    /// Get the current strategy state for monitoring.
    fn state(&self) -> StrategyState;

    /// Get a description of the strategy.
    fn description(&self) -> &str {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysBuy {
        proposals: usize,
    }

    impl Strategy for AlwaysBuy {
        fn name(&self) -> &str {
            "always-buy"
        }

        fn propose(&mut self, ctx: &StrategyContext<'_>) -> TradeProposal {
            if ctx.position.is_some() {
                return TradeProposal::Hold;
            }
            self.proposals += 1;
            TradeProposal::Open {
                side: PositionSide::Long,
                quantity: 1.0,
                stop_loss: ctx.price * 0.99,
                take_profit: ctx.price * 1.01,
                reason: "test".to_string(),
            }
        }

        fn reset(&mut self) {
            self.proposals = 0;
        }

        fn state(&self) -> StrategyState {
            StrategyState {
                name: self.name().to_string(),
                proposals_made: self.proposals,
                ..Default::default()
            }
        }
    }

    #[test]
    fn test_strategy_proposal() {
        let mut strategy = AlwaysBuy { proposals: 0 };
        let ctx = StrategyContext {
            symbol: "BTCUSDT",
            price: 100.0,
            balance: 1000.0,
            open_positions: 0,
            position: None,
        };

        match strategy.propose(&ctx) {
            TradeProposal::Open { quantity, .. } => assert_eq!(quantity, 1.0),
            other => panic!("unexpected proposal: {:?}", other),
        }
        assert_eq!(strategy.state().proposals_made, 1);
    }
}

//! Backtest statistics.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Distribution};
use trading_core::money::{to_decimal, to_f64};
use trading_core::types::Trade;

/// Backtest statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestStats {
    /// Starting balance
    pub initial_balance: Decimal,
    /// Equity after the last candle, open positions marked to market
    pub final_equity: Decimal,
    /// Realised profit over all closed trades
    pub total_profit: Decimal,
    /// Equity change in percent of the starting balance
    pub total_profit_pct: Decimal,
    /// `total_profit_pct` divided by the days simulated
    pub average_day_profit_pct: Decimal,
    /// Maximum drawdown percentage
    pub max_drawdown_pct: Decimal,
    /// Sharpe ratio (assuming risk-free rate of 0)
    pub sharpe_ratio: f64,
    /// Sortino ratio
    pub sortino_ratio: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: Decimal,
    /// Average profit per winning trade
    pub avg_win: Decimal,
    /// Average loss per losing trade
    pub avg_loss: Decimal,
    /// Gross profit / gross loss; zero when nothing was lost
    pub profit_factor: Decimal,
    pub candles_processed: usize,
    /// `(close_time, equity)` per simulated candle
    pub equity_curve: Vec<(i64, Decimal)>,
    pub trades: Vec<Trade>,
    peak_equity: Decimal,
    /// Per-candle equity returns
    returns: Vec<f64>,
}

impl BacktestStats {
    pub fn new(initial_balance: Decimal) -> Self {
        Self {
            initial_balance,
            final_equity: initial_balance,
            total_profit: Decimal::ZERO,
            total_profit_pct: Decimal::ZERO,
            average_day_profit_pct: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: Decimal::ZERO,
            avg_win: Decimal::ZERO,
            avg_loss: Decimal::ZERO,
            profit_factor: Decimal::ZERO,
            candles_processed: 0,
            equity_curve: Vec::new(),
            trades: Vec::new(),
            peak_equity: initial_balance,
            returns: Vec::new(),
        }
    }

    /// Record equity at a timestamp.
    pub fn record_equity(&mut self, timestamp: i64, equity: Decimal) {
        if let Some((_, prev)) = self.equity_curve.last() {
            if *prev > Decimal::ZERO {
                self.returns.push(to_f64((equity - *prev) / *prev));
            }
        }
        self.equity_curve.push((timestamp, equity));

        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > Decimal::ZERO {
            let drawdown = (self.peak_equity - equity) / self.peak_equity * dec!(100);
            if drawdown > self.max_drawdown_pct {
                self.max_drawdown_pct = drawdown;
            }
        }

        self.candles_processed += 1;
    }

    /// Add a closed trade.
    pub fn add_trade(&mut self, trade: Trade) {
        self.total_trades += 1;
        if trade.pnl > Decimal::ZERO {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }
        self.total_profit += trade.pnl;
        self.trades.push(trade);
    }

    /// Derive the summary figures.
    ///
    /// * `days` - Length of the simulated period
    /// * `periods_per_year` - Candles per year, for annualising the ratios
    pub fn finalize(&mut self, final_equity: Decimal, days: f64, periods_per_year: f64) {
        self.final_equity = final_equity;

        if self.initial_balance > Decimal::ZERO {
            self.total_profit_pct =
                (self.final_equity - self.initial_balance) / self.initial_balance * dec!(100);
        }
        if days > 0.0 {
            self.average_day_profit_pct = self.total_profit_pct / to_decimal(days);
        }

        let gross_profit: Decimal = self.trades.iter().map(|t| t.pnl).filter(|p| *p > Decimal::ZERO).sum();
        let gross_loss: Decimal = self
            .trades
            .iter()
            .map(|t| t.pnl)
            .filter(|p| *p <= Decimal::ZERO)
            .map(|p| p.abs())
            .sum();

        if self.total_trades > 0 {
            self.win_rate_pct =
                Decimal::from(self.winning_trades * 100) / Decimal::from(self.total_trades);
        }
        if self.winning_trades > 0 {
            self.avg_win = gross_profit / Decimal::from(self.winning_trades);
        }
        if self.losing_trades > 0 {
            self.avg_loss = gross_loss / Decimal::from(self.losing_trades);
        }
        if gross_loss > Decimal::ZERO {
            self.profit_factor = gross_profit / gross_loss;
        }

        self.sharpe_ratio = 0.0;
        self.sortino_ratio = 0.0;
        if self.returns.len() < 2 {
            return;
        }
        let scale = periods_per_year.max(1.0).sqrt();
        let data = Data::new(self.returns.clone());
        let mean = data.mean().unwrap_or(0.0);
        if let Some(std_dev) = data.std_dev().filter(|s| *s > 0.0) {
            self.sharpe_ratio = mean * scale / std_dev;
        }

        let downside: Vec<f64> = self.returns.iter().copied().filter(|r| *r < 0.0).collect();
        if !downside.is_empty() {
            let downside_dev = (downside.iter().map(|r| r * r).sum::<f64>() / downside.len() as f64).sqrt();
            if downside_dev > 0.0 {
                self.sortino_ratio = mean * scale / downside_dev;
            }
        }
    }
}

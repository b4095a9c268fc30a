//! Backtest report generation.

use serde::{Deserialize, Serialize};
use trading_core::types::Position;
use trading_strategies::{IntervalConfig, PriceInterval};

use crate::{BacktestConfig, BacktestStats};

/// Complete backtest report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: String,
    /// Simulation settings
    pub config: BacktestConfig,
    /// Strategy settings the interval was trained with
    pub interval_config: IntervalConfig,
    /// Band found on the training half
    pub interval: PriceInterval,
    pub train_candles: usize,
    pub test_candles: usize,
    /// Length of the simulated half in days
    pub days: f64,
    /// Position still open after the last candle
    pub open_position: Option<Position>,
    pub stats: BacktestStats,
}

impl BacktestReport {
    /// Generate a text summary.
    pub fn summary(&self) -> String {
        let mut s = String::new();

        s.push_str("═══════════════════════════════════════════════════════════\n");
        s.push_str("                     BACKTEST REPORT                        \n");
        s.push_str("═══════════════════════════════════════════════════════════\n\n");

        s.push_str("INTERVAL\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Symbol:              {}\n", self.symbol));
        s.push_str(&format!("  Method:              {:?}\n", self.interval_config.method));
        s.push_str(&format!(
            "  Band:                {:.2} - {:.2}\n",
            self.interval.lower, self.interval.upper
        ));
        s.push_str(&format!("  Width:               {:.2}%\n", self.interval.width_pct));
        s.push_str(&format!("  Crosses:             {}\n", self.interval.crosses));
        s.push('\n');

        s.push_str("PERFORMANCE\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!(
            "  Initial Balance:     ${:.2}\n",
            self.stats.initial_balance
        ));
        s.push_str(&format!("  Final Equity:        ${:.2}\n", self.stats.final_equity));
        s.push_str(&format!("  Total Profit:        ${:.2}\n", self.stats.total_profit));
        s.push_str(&format!(
            "  Total Return:        {:.2}%\n",
            self.stats.total_profit_pct
        ));
        s.push_str(&format!(
            "  Avg Day Profit:      {:.2}%\n",
            self.stats.average_day_profit_pct
        ));
        s.push_str(&format!(
            "  Max Drawdown:        {:.2}%\n",
            self.stats.max_drawdown_pct
        ));
        s.push('\n');

        s.push_str("RISK METRICS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Sharpe Ratio:        {:.2}\n", self.stats.sharpe_ratio));
        s.push_str(&format!("  Sortino Ratio:       {:.2}\n", self.stats.sortino_ratio));
        s.push_str(&format!("  Profit Factor:       {:.2}\n", self.stats.profit_factor));
        s.push('\n');

        s.push_str("TRADE STATISTICS\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Total Trades:        {}\n", self.stats.total_trades));
        s.push_str(&format!("  Winning Trades:      {}\n", self.stats.winning_trades));
        s.push_str(&format!("  Losing Trades:       {}\n", self.stats.losing_trades));
        s.push_str(&format!("  Win Rate:            {:.2}%\n", self.stats.win_rate_pct));
        s.push_str(&format!("  Avg Win:             ${:.2}\n", self.stats.avg_win));
        s.push_str(&format!("  Avg Loss:            ${:.2}\n", self.stats.avg_loss));
        if let Some(position) = &self.open_position {
            s.push_str(&format!(
                "  Open Position:       {} @ {:.2}\n",
                position.quantity, position.entry_price
            ));
        }
        s.push('\n');

        s.push_str("EXECUTION\n");
        s.push_str("───────────────────────────────────────────────────────────\n");
        s.push_str(&format!("  Training Candles:    {}\n", self.train_candles));
        s.push_str(&format!("  Tested Candles:      {}\n", self.test_candles));
        s.push_str(&format!("  Days Simulated:      {:.2}\n", self.days));
        s.push('\n');

        s.push_str("═══════════════════════════════════════════════════════════\n");

        s
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV (equity curve only).
    pub fn equity_to_csv(&self) -> String {
        let mut csv = String::from("timestamp,equity\n");
        for (ts, equity) in &self.stats.equity_curve {
            csv.push_str(&format!("{},{}\n", ts, equity));
        }
        csv
    }
}

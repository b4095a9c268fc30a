//! TUI Dashboard using ratatui.

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction as LayoutDirection, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use rust_decimal::Decimal;
use std::io;
use std::time::Duration;
use trading_core::types::{AggregatedSignal, Direction, Position, Trade};
use trading_engine::{Orchestrator, TradingStats};

/// Trades shown in the log pane.
const RECENT_TRADES: usize = 5;

/// Snapshot rendered by the dashboard.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub running: bool,
    pub initial_balance: Decimal,
    pub balance: Decimal,
    pub equity: Decimal,
    /// Per-symbol engine statistics
    pub stats: Vec<(String, TradingStats)>,
    pub positions: Vec<Position>,
    pub signals: Vec<AggregatedSignal>,
    /// Newest first
    pub recent_trades: Vec<Trade>,
}

impl DashboardState {
    /// Capture the current state of a running pipeline.
    pub fn capture(orchestrator: &Orchestrator) -> Self {
        let ledger = orchestrator.ledger();
        let stats = orchestrator
            .config()
            .symbols
            .iter()
            .filter_map(|symbol| orchestrator.stats(symbol).map(|s| (symbol.clone(), s)))
            .collect();
        let mut recent_trades = ledger.trades();
        recent_trades.reverse();
        recent_trades.truncate(RECENT_TRADES);

        Self {
            running: orchestrator.is_running(),
            initial_balance: ledger.initial_balance(),
            balance: ledger.balance(),
            equity: ledger.equity(),
            stats,
            positions: ledger.positions(),
            signals: orchestrator.signals(),
            recent_trades,
        }
    }

    /// Realised P&L summed over all engines.
    pub fn total_pnl(&self) -> Decimal {
        self.stats.iter().map(|(_, s)| s.total_pnl).sum()
    }

    pub fn trades_today(&self) -> u32 {
        self.stats.iter().map(|(_, s)| s.today_trades).sum()
    }

    /// Win rate over every engine's closed trades, in percent.
    pub fn win_rate(&self) -> f64 {
        let (wins, total) = self
            .stats
            .iter()
            .fold((0u32, 0u32), |(w, t), (_, s)| (w + s.winning_trades, t + s.total_trades));
        if total == 0 {
            0.0
        } else {
            f64::from(wins) / f64::from(total) * 100.0
        }
    }

    pub fn max_drawdown(&self) -> f64 {
        self.stats.iter().map(|(_, s)| s.max_drawdown).fold(0.0, f64::max)
    }
}

/// TUI Dashboard.
pub struct Dashboard {
    refresh_ms: u64,
}

impl Dashboard {
    /// Create a new dashboard.
    pub fn new(refresh_ms: u64) -> Self {
        Self { refresh_ms }
    }

    /// Run the dashboard until `q` or `Esc`.
    pub fn run<F>(&self, mut get_state: F) -> io::Result<()>
    where
        F: FnMut() -> DashboardState,
    {
        // Setup terminal
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let res = self.run_loop(&mut terminal, &mut get_state);

        // Restore terminal
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        res
    }

    fn run_loop<B, F>(&self, terminal: &mut Terminal<B>, get_state: &mut F) -> io::Result<()>
    where
        B: Backend,
        F: FnMut() -> DashboardState,
    {
        loop {
            let state = get_state();
            terminal.draw(|f| self.ui(f, &state))?;

            if event::poll(Duration::from_millis(self.refresh_ms))? {
                if let Event::Key(key) = event::read()? {
                    if key.code == KeyCode::Char('q') || key.code == KeyCode::Esc {
                        return Ok(());
                    }
                }
            }
        }
    }

    fn ui(&self, frame: &mut Frame, state: &DashboardState) {
        let chunks = Layout::default()
            .direction(LayoutDirection::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3), // Header
                Constraint::Length(4), // Stats
                Constraint::Min(6),    // Signals
                Constraint::Min(6),    // Positions
                Constraint::Length(RECENT_TRADES as u16 + 2),
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0], state);
        self.render_stats(frame, chunks[1], state);
        self.render_signals(frame, chunks[2], state);
        self.render_positions(frame, chunks[3], state);
        self.render_trades(frame, chunks[4], state);
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, state: &DashboardState) {
        let (status, color) = if state.running {
            ("RUNNING", Color::Green)
        } else {
            ("STOPPED", Color::Red)
        };
        let header = Paragraph::new(vec![Line::from(vec![
            Span::styled(
                "Paper Trading Dashboard",
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw(" | "),
            Span::styled(status, Style::default().fg(color)),
            Span::raw(" | Press 'q' to quit"),
        ])])
        .block(Block::default().borders(Borders::ALL).title("System"));
        frame.render_widget(header, area);
    }

    fn render_stats(&self, frame: &mut Frame, area: Rect, state: &DashboardState) {
        let pnl = state.total_pnl();
        let pnl_color = if pnl >= Decimal::ZERO {
            Color::Green
        } else {
            Color::Red
        };

        let stats = Paragraph::new(vec![
            Line::from(vec![
                Span::raw("Equity: "),
                Span::styled(
                    format!("${:.2}", state.equity),
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw("  |  Balance: "),
                Span::styled(format!("${:.2}", state.balance), Style::default()),
                Span::raw("  |  P&L: "),
                Span::styled(format!("${:.2}", pnl), Style::default().fg(pnl_color)),
            ]),
            Line::from(vec![
                Span::raw("Positions: "),
                Span::raw(format!("{}", state.positions.len())),
                Span::raw("  |  Trades today: "),
                Span::raw(format!("{}", state.trades_today())),
                Span::raw("  |  Win rate: "),
                Span::raw(format!("{:.1}%", state.win_rate())),
                Span::raw("  |  Max DD: "),
                Span::raw(format!("{:.2}%", state.max_drawdown())),
            ]),
        ])
        .block(Block::default().borders(Borders::ALL).title("Statistics"));
        frame.render_widget(stats, area);
    }

    fn render_signals(&self, frame: &mut Frame, area: Rect, state: &DashboardState) {
        let header_cells = ["Stream", "Direction", "Confidence", "Tech", "ML", "Sent", "Price"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells).height(1);

        let rows = state.signals.iter().map(|signal| {
            let color = match signal.direction {
                Direction::Long => Color::Green,
                Direction::Short => Color::Red,
                Direction::Hold => Color::Gray,
            };
            Row::new(vec![
                Cell::from(signal.key()),
                Cell::from(signal.direction.to_string()).style(Style::default().fg(color)),
                Cell::from(format!("{:.2}", signal.confidence)),
                Cell::from(format!("{:+.3}", signal.technical_score)),
                Cell::from(format!("{:+.3}", signal.ml_score)),
                Cell::from(format!("{:+.3}", signal.sentiment_score)),
                Cell::from(format!("{:.2}", signal.price)),
            ])
        });

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(20),
                Constraint::Percentage(12),
                Constraint::Percentage(14),
                Constraint::Percentage(12),
                Constraint::Percentage(12),
                Constraint::Percentage(12),
                Constraint::Percentage(18),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Signals"));

        frame.render_widget(table, area);
    }

    fn render_positions(&self, frame: &mut Frame, area: Rect, state: &DashboardState) {
        let header_cells = ["Symbol", "Side", "Qty", "Entry", "Current", "Stop", "P&L"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().add_modifier(Modifier::BOLD)));
        let header = Row::new(header_cells).height(1);

        let rows = state.positions.iter().map(|pos| {
            let pnl_color = if pos.unrealized_pnl >= Decimal::ZERO {
                Color::Green
            } else {
                Color::Red
            };

            Row::new(vec![
                Cell::from(pos.symbol.clone()),
                Cell::from(pos.side.to_string()),
                Cell::from(format!("{}", pos.quantity)),
                Cell::from(format!("${:.2}", pos.entry_price)),
                Cell::from(format!("${:.2}", pos.current_price)),
                Cell::from(format!("${:.2}", pos.stop_loss)),
                Cell::from(format!("${:.2}", pos.unrealized_pnl))
                    .style(Style::default().fg(pnl_color)),
            ])
        });

        let table = Table::new(
            rows,
            [
                Constraint::Percentage(16),
                Constraint::Percentage(10),
                Constraint::Percentage(12),
                Constraint::Percentage(16),
                Constraint::Percentage(16),
                Constraint::Percentage(15),
                Constraint::Percentage(15),
            ],
        )
        .header(header)
        .block(Block::default().borders(Borders::ALL).title("Positions"));

        frame.render_widget(table, area);
    }

    fn render_trades(&self, frame: &mut Frame, area: Rect, state: &DashboardState) {
        let lines: Vec<Line> = state
            .recent_trades
            .iter()
            .map(|t| {
                let color = if t.is_win() { Color::Green } else { Color::Red };
                Line::from(vec![
                    Span::raw(format!(
                        "{} {} {} {:.2} -> {:.2} ",
                        t.closed_at.format("%H:%M:%S"),
                        t.symbol,
                        t.side,
                        t.entry_price,
                        t.exit_price
                    )),
                    Span::styled(
                        format!("{:+.2} ({:+.2}%)", t.pnl, t.pnl_percent),
                        Style::default().fg(color),
                    ),
                    Span::raw(format!(" {}", t.reason)),
                ])
            })
            .collect();

        let paragraph =
            Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Trades"));
        frame.render_widget(paragraph, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ratatui::backend::TestBackend;
    use rust_decimal_macros::dec;
    use trading_core::types::{PositionSide, Timeframe};
    use uuid::Uuid;

    fn stats(wins: u32, total: u32, pnl: Decimal) -> TradingStats {
        let mut stats = TradingStats::new(dec!(10000));
        stats.winning_trades = wins;
        stats.losing_trades = total - wins;
        stats.total_trades = total;
        stats.total_pnl = pnl;
        stats.today_trades = total;
        stats
    }

    fn state() -> DashboardState {
        DashboardState {
            running: true,
            initial_balance: dec!(10000),
            balance: dec!(9000),
            equity: dec!(10050),
            stats: vec![
                ("BTCUSDT".to_string(), stats(3, 4, dec!(40))),
                ("ETHUSDT".to_string(), stats(0, 1, dec!(-10))),
            ],
            positions: vec![Position::new(
                "BTCUSDT",
                PositionSide::Long,
                dec!(100),
                dec!(10),
                dec!(98),
                dec!(103),
            )],
            signals: vec![AggregatedSignal {
                id: Uuid::new_v4(),
                symbol: "BTCUSDT".to_string(),
                timeframe: Timeframe::Minute1,
                direction: Direction::Long,
                confidence: 0.62,
                technical_score: 0.12,
                ml_score: 0.0,
                sentiment_score: -0.1,
                price: 100.0,
                volatility: 1.0,
                reasons: Vec::new(),
                timestamp: Utc::now(),
            }],
            recent_trades: Vec::new(),
        }
    }

    #[test]
    fn test_aggregates() {
        let state = state();
        assert_eq!(state.total_pnl(), dec!(30));
        assert_eq!(state.trades_today(), 5);
        assert!((state.win_rate() - 60.0).abs() < 1e-9);
        assert_eq!(DashboardState::default().win_rate(), 0.0);
    }

    #[test]
    fn test_renders_streams_and_positions() {
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        let dashboard = Dashboard::new(250);
        terminal.draw(|f| dashboard.ui(f, &state())).unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("RUNNING"));
        assert!(text.contains("BTCUSDT:1m"));
        assert!(text.contains("$10050.00"));
        assert!(text.contains("Positions"));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ExitReason;

/// One completed entry/exit pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundTrip {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Exit proceeds minus entry cost, commissions included
    pub pnl: f64,
    pub exit_reason: Option<ExitReason>,
}

impl RoundTrip {
    pub fn pnl_pct(&self) -> f64 {
        ((self.exit_price - self.entry_price) / self.entry_price) * 100.0
    }

    pub fn holding_period_minutes(&self) -> i64 {
        (self.exit_time - self.entry_time).num_minutes()
    }
}

/// Backtest performance summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub initial_portfolio_value: f64,
    pub final_portfolio_value: f64,
    pub total_return_pct: f64,

    pub buy_fills: usize,
    pub sell_fills: usize,
    pub round_trips: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    pub total_fees: f64,
    pub avg_holding_period_minutes: f64,

    /// BUYs refused by the session guard
    pub session_trips: usize,
    pub flash_crash_vetoes: usize,
    /// Base quantity held with no engine position after rejected exit fills
    pub stranded_quantity: f64,

    pub trades: Vec<RoundTrip>,
}

impl BacktestMetrics {
    /// Summarize a run from its round trips and mark-to-market equity curve
    pub fn calculate(
        initial_portfolio_value: f64,
        equity_curve: &[f64],
        trades: Vec<RoundTrip>,
        fills: (usize, usize),
        total_fees: f64,
    ) -> Self {
        let final_portfolio_value = equity_curve.last().copied().unwrap_or(initial_portfolio_value);
        let total_return_pct = if initial_portfolio_value > 0.0 {
            ((final_portfolio_value - initial_portfolio_value) / initial_portfolio_value) * 100.0
        } else {
            0.0
        };

        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = trades.len() - winning_trades;
        let win_rate = if trades.is_empty() {
            0.0
        } else {
            (winning_trades as f64 / trades.len() as f64) * 100.0
        };

        let avg_holding_period_minutes = if trades.is_empty() {
            0.0
        } else {
            trades.iter().map(|t| t.holding_period_minutes()).sum::<i64>() as f64 / trades.len() as f64
        };

        let (max_drawdown, max_drawdown_pct) = Self::calculate_drawdown(equity_curve, initial_portfolio_value);

        Self {
            initial_portfolio_value,
            final_portfolio_value,
            total_return_pct,
            buy_fills: fills.0,
            sell_fills: fills.1,
            round_trips: trades.len(),
            winning_trades,
            losing_trades,
            win_rate,
            max_drawdown,
            max_drawdown_pct,
            total_fees,
            avg_holding_period_minutes,
            session_trips: 0,
            flash_crash_vetoes: 0,
            stranded_quantity: 0.0,
            trades,
        }
    }

    /// Largest peak-to-trough fall of the equity curve, absolute and in percent of the peak
    fn calculate_drawdown(equity_curve: &[f64], initial_value: f64) -> (f64, f64) {
        let mut peak = initial_value;
        let mut max_dd = 0.0;
        let mut max_dd_pct = 0.0;

        for &value in equity_curve {
            if value > peak {
                peak = value;
            }

            let drawdown = peak - value;
            if drawdown > max_dd {
                max_dd = drawdown;
                max_dd_pct = if peak > 0.0 { (drawdown / peak) * 100.0 } else { 0.0 };
            }
        }

        (max_dd, max_dd_pct)
    }

    /// Print a formatted report to stdout
    pub fn print_report(&self) {
        println!("\n=== BACKTEST PERFORMANCE REPORT ===\n");

        println!("P&L SUMMARY");
        println!("  Initial Portfolio:     ${:.2}", self.initial_portfolio_value);
        println!("  Final Portfolio:       ${:.2}", self.final_portfolio_value);
        println!("  Total Return:          {:+.2}%", self.total_return_pct);
        println!("  Fees Paid:             ${:.2}", self.total_fees);

        println!("\nTRADE STATISTICS");
        println!("  Fills:                 {} buys / {} sells", self.buy_fills, self.sell_fills);
        println!("  Round Trips:           {}", self.round_trips);
        println!(
            "  Winning Trades:        {} ({:.1}%)",
            self.winning_trades, self.win_rate
        );
        println!("  Losing Trades:         {}", self.losing_trades);
        if self.round_trips > 0 {
            println!(
                "  Avg Holding Period:    {:.1} minutes ({:.1} hours)",
                self.avg_holding_period_minutes,
                self.avg_holding_period_minutes / 60.0
            );
        }

        println!("\nRISK");
        println!(
            "  Max Drawdown:          ${:.2} ({:.2}%)",
            self.max_drawdown, self.max_drawdown_pct
        );
        println!("  Session Guard Trips:   {}", self.session_trips);
        println!("  Flash-Crash Vetoes:    {}", self.flash_crash_vetoes);
        if self.stranded_quantity > 0.0 {
            println!("  Stranded Holdings:     {:.8}", self.stranded_quantity);
        }
        println!();
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Host-loop limits applied before acting on a BUY
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    pub daily_trade_limit: u32,
    pub max_concentration_pct: f64,
    pub drawdown_alert_pct: f64,
    pub consecutive_loss_alert: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            daily_trade_limit: 20,       // Max 20 fills per UTC day
            max_concentration_pct: 0.85, // Max 85% of portfolio in one asset
            drawdown_alert_pct: 0.10,    // Warn at -10% from peak
            consecutive_loss_alert: 3,   // Warn after 3 losing round trips
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionTrip {
    DailyTradeLimit { trades: u32 },
    Concentration { pct: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionAlert {
    Drawdown { pct: f64, peak: f64, current: f64 },
    ConsecutiveLosses(u32),
}

/// Tracks trading activity across one session of the host loop
#[derive(Debug, Clone)]
pub struct SessionGuard {
    limits: SessionLimits,
    daily_trades: u32,
    trade_date: Option<NaiveDate>,
    consecutive_losses: u32,
    peak_portfolio_value: f64,
}

impl SessionGuard {
    pub fn new(limits: SessionLimits, initial_portfolio_value: f64) -> Self {
        Self {
            limits,
            daily_trades: 0,
            trade_date: None,
            consecutive_losses: 0,
            peak_portfolio_value: initial_portfolio_value,
        }
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    pub fn daily_trades(&self) -> u32 {
        self.daily_trades
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses
    }

    fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.trade_date != Some(today) {
            self.daily_trades = 0;
            self.trade_date = Some(today);
        }
    }

    /// Check whether a BUY may be sent to the venue
    ///
    /// `asset_value` is the value already held in the traded asset,
    /// `portfolio_value` the total including cash.
    pub fn check_buy(
        &mut self,
        asset_value: f64,
        portfolio_value: f64,
        now: DateTime<Utc>,
    ) -> Result<(), SessionTrip> {
        self.roll_day(now);

        if self.daily_trades >= self.limits.daily_trade_limit {
            return Err(SessionTrip::DailyTradeLimit {
                trades: self.daily_trades,
            });
        }

        if portfolio_value > 0.0 {
            let pct = asset_value / portfolio_value;
            if pct > self.limits.max_concentration_pct {
                return Err(SessionTrip::Concentration { pct });
            }
        }

        Ok(())
    }

    /// Count a confirmed fill towards the daily limit
    pub fn record_fill(&mut self, now: DateTime<Utc>) {
        self.roll_day(now);
        self.daily_trades += 1;
    }

    /// Record a closed round trip's realized P&L
    pub fn record_round_trip(&mut self, pnl: f64) {
        if pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Update the peak and report anything worth a warning
    pub fn monitor(&mut self, portfolio_value: f64) -> Vec<SessionAlert> {
        let mut alerts = Vec::new();

        if portfolio_value > self.peak_portfolio_value {
            self.peak_portfolio_value = portfolio_value;
        }

        if self.peak_portfolio_value > 0.0 {
            let drawdown = (self.peak_portfolio_value - portfolio_value) / self.peak_portfolio_value;
            if drawdown >= self.limits.drawdown_alert_pct {
                tracing::warn!(
                    "Drawdown alert: {:.1}% from peak (peak ${:.2}, current ${:.2})",
                    drawdown * 100.0,
                    self.peak_portfolio_value,
                    portfolio_value
                );
                alerts.push(SessionAlert::Drawdown {
                    pct: drawdown,
                    peak: self.peak_portfolio_value,
                    current: portfolio_value,
                });
            }
        }

        if self.consecutive_losses >= self.limits.consecutive_loss_alert {
            tracing::warn!("Consecutive losses: {} round trips in a row", self.consecutive_losses);
            alerts.push(SessionAlert::ConsecutiveLosses(self.consecutive_losses));
        }

        alerts
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::ExitReason;
use crate::risk::RiskParameters;

/// Exit raised by the position's own risk levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskExit {
    StopLoss,
    TakeProfit,
    TimeStop,
}

impl From<RiskExit> for ExitReason {
    fn from(exit: RiskExit) -> Self {
        match exit {
            RiskExit::StopLoss => ExitReason::StopLoss,
            RiskExit::TakeProfit => ExitReason::TakeProfit,
            RiskExit::TimeStop => ExitReason::TimeStop,
        }
    }
}

/// The single position an engine instance may hold
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Position {
    #[default]
    Flat,
    Long(OpenPosition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// High-water mark since entry, drives the trailing stop
    pub highest_price: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        matches!(self, Position::Long(_))
    }

    pub fn as_open(&self) -> Option<&OpenPosition> {
        match self {
            Position::Long(open) => Some(open),
            Position::Flat => None,
        }
    }

    pub fn as_open_mut(&mut self) -> Option<&mut OpenPosition> {
        match self {
            Position::Long(open) => Some(open),
            Position::Flat => None,
        }
    }

    /// Flatten and hand back what was open
    pub fn close(&mut self) -> Option<OpenPosition> {
        match std::mem::take(self) {
            Position::Long(open) => Some(open),
            Position::Flat => None,
        }
    }
}

impl OpenPosition {
    /// Open at `entry_price`, fixing stop and target from `params`
    pub fn open(entry_price: f64, quantity: f64, entry_time: DateTime<Utc>, params: &RiskParameters) -> Self {
        Self {
            entry_price,
            entry_time,
            quantity,
            stop_loss: entry_price * (1.0 - params.stop_loss_pct),
            take_profit: entry_price * (1.0 + params.take_profit_pct),
            highest_price: entry_price,
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity
    }

    pub fn unrealized_pnl_pct(&self, price: f64) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        (price - self.entry_price) / self.entry_price
    }

    pub fn hours_open(&self, now: DateTime<Utc>) -> f64 {
        (now - self.entry_time).num_seconds() as f64 / 3600.0
    }

    /// Update the high-water mark and ratchet the stop
    ///
    /// The stop only moves up. Returns true when it was raised.
    pub fn update_trailing_stop(&mut self, price: f64, params: &RiskParameters) -> bool {
        if price > self.highest_price {
            self.highest_price = price;
        }

        if self.unrealized_pnl_pct(price) < params.trailing_activation_pct {
            return false;
        }

        let candidate = self.highest_price * (1.0 - params.trailing_stop_pct);
        if candidate > self.stop_loss {
            self.stop_loss = candidate;
            return true;
        }

        false
    }

    /// First matching risk exit: stop loss, take profit, then time stop
    pub fn exit_trigger(&self, price: f64, now: DateTime<Utc>, params: &RiskParameters) -> Option<RiskExit> {
        if price <= self.stop_loss {
            return Some(RiskExit::StopLoss);
        }

        if price >= self.take_profit {
            return Some(RiskExit::TakeProfit);
        }

        if self.hours_open(now) >= params.max_position_hours {
            return Some(RiskExit::TimeStop);
        }

        None
    }
}

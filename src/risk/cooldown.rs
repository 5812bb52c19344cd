use chrono::{DateTime, Utc};

use crate::models::Action;

/// Minimum spacing between two trades in the same direction
///
/// Only executed trades are recorded; HOLD never touches this state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CooldownGate {
    last_trade_time: Option<DateTime<Utc>>,
    last_trade_action: Option<Action>,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_trade_time(&self) -> Option<DateTime<Utc>> {
        self.last_trade_time
    }

    pub fn last_trade_action(&self) -> Option<Action> {
        self.last_trade_action
    }

    /// Record an executed BUY or SELL. HOLD is ignored.
    pub fn record(&mut self, action: Action, at: DateTime<Utc>) {
        if action == Action::Hold {
            return;
        }
        self.last_trade_time = Some(at);
        self.last_trade_action = Some(action);
    }

    /// Overwrite state directly (restart recovery)
    pub fn restore(&mut self, at: DateTime<Utc>, action: Action) {
        self.record(action, at);
    }

    /// Seconds left before `action` may repeat, 0 if allowed now
    pub fn remaining_seconds(&self, action: Action, min_interval_seconds: i64, now: DateTime<Utc>) -> i64 {
        match (self.last_trade_action, self.last_trade_time) {
            (Some(last), Some(at)) if last == action => {
                let elapsed = (now - at).num_seconds();
                (min_interval_seconds - elapsed).max(0)
            }
            _ => 0,
        }
    }

    /// Opposite-direction trades are never blocked
    pub fn allows(&self, action: Action, min_interval_seconds: i64, now: DateTime<Utc>) -> bool {
        self.remaining_seconds(action, min_interval_seconds, now) == 0
    }
}

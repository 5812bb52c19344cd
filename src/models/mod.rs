use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A single fixed-interval close from the market-data source
///
/// Histories are ordered oldest to newest. Gaps and duplicates are
/// passed through untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceSample {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PriceSample {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self { timestamp, price }
    }
}

/// Trading action emitted by the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        };
        f.write_str(label)
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TimeStop,
    DeathCross,
    BearishMomentum,
}

/// Which bullish pattern opened an entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EntrySignal {
    GoldenCross,
    BullishMomentum,
}

/// Why nothing happened this cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum HoldReason {
    InvalidInput,
    FlashCrash,
    InsufficientData,
    IncompleteIndicator,
    CooldownActive,
    AlreadyPositioned,
    BelowLongTermTrend,
    NoSignal,
    Holding,
}

/// Tagged cause of a decision, mirroring `action`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DecisionKind {
    Entry(EntrySignal),
    Exit(ExitReason),
    Hold(HoldReason),
}

/// One decision per `analyze` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingDecision {
    pub action: Action,
    pub confidence: f64,
    pub price: f64,
    /// Exact base quantity to sell when closing a position, otherwise 0
    pub quantity: f64,
    pub reason: String,
    pub kind: DecisionKind,
}

impl TradingDecision {
    pub fn hold(
        reason: HoldReason,
        confidence: f64,
        price: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action: Action::Hold,
            confidence,
            price,
            quantity: 0.0,
            reason: message.into(),
            kind: DecisionKind::Hold(reason),
        }
    }

    pub fn buy(signal: EntrySignal, confidence: f64, price: f64, message: impl Into<String>) -> Self {
        Self {
            action: Action::Buy,
            confidence,
            price,
            quantity: 0.0,
            reason: message.into(),
            kind: DecisionKind::Entry(signal),
        }
    }

    pub fn sell(
        exit: ExitReason,
        confidence: f64,
        price: f64,
        quantity: f64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            action: Action::Sell,
            confidence,
            price,
            quantity,
            reason: message.into(),
            kind: DecisionKind::Exit(exit),
        }
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }

    pub fn hold_reason(&self) -> Option<HoldReason> {
        match self.kind {
            DecisionKind::Hold(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Executed trade as written to the trade journal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: Action,
    pub quantity: f64,
    pub price: f64,
    /// Notional value (`quantity * price`) before commission
    pub total: f64,
    #[serde(default)]
    pub commission: f64,
    #[serde(default)]
    pub reason: String,
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Action, TradeRecord, TradingDecision};
use crate::risk::{position_size, SizingConfig};
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_cash: f64,
    pub commission_rate: f64,
    /// Smallest notional the venue accepts
    pub min_trade_value: f64,
    /// Fraction of holdings sold when a SELL carries no quantity
    pub sell_fraction: f64,
    pub sizing: SizingConfig,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_cash: 10000.0,
            commission_rate: 0.001, // 0.1% per fill
            min_trade_value: 10.0,
            sell_fraction: 0.1,
            sizing: SizingConfig::default(),
        }
    }
}

/// Simulated market-order venue with quote/base balances
#[derive(Debug, Clone)]
pub struct PaperAccount {
    config: PaperConfig,
    symbol: String,
    cash: f64,
    holdings: f64,
    fees_paid: f64,
}

impl PaperAccount {
    pub fn new(symbol: impl Into<String>, config: PaperConfig) -> Self {
        Self {
            cash: config.initial_cash,
            holdings: 0.0,
            fees_paid: 0.0,
            symbol: symbol.into(),
            config,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn holdings(&self) -> f64 {
        self.holdings
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn portfolio_value(&self, price: f64) -> f64 {
        self.cash + self.holdings * price
    }

    /// Execute `decision` as a market order at `decision.price`
    ///
    /// Balances change only when `Ok` is returned; the caller should touch
    /// engine state only after that.
    pub fn fill(&mut self, decision: &TradingDecision, now: DateTime<Utc>) -> Result<TradeRecord> {
        let price = decision.price;
        if price <= 0.0 || !price.is_finite() {
            return Err(Error::Fill(format!("invalid price {}", price)));
        }

        let (buying, quantity) = match decision.action {
            Action::Buy => (
                true,
                position_size(self.cash, price, decision.confidence, &self.config.sizing),
            ),
            Action::Sell if decision.quantity > 0.0 => (false, decision.quantity.min(self.holdings)),
            Action::Sell => (false, self.holdings * self.config.sell_fraction),
            Action::Hold => return Err(Error::Fill("nothing to fill for HOLD".to_string())),
        };

        if quantity <= 0.0 {
            return Err(Error::Fill(format!("no {} quantity available", decision.action)));
        }

        let total = quantity * price;
        let commission = total * self.config.commission_rate;

        if total < self.config.min_trade_value {
            return Err(Error::Fill(format!(
                "trade value ${:.2} below minimum ${:.2}",
                total, self.config.min_trade_value
            )));
        }

        if buying {
            if total + commission > self.cash {
                return Err(Error::Fill(format!(
                    "insufficient cash: need ${:.2}, have ${:.2}",
                    total + commission,
                    self.cash
                )));
            }
            self.cash -= total + commission;
            self.holdings += quantity;
        } else {
            self.holdings -= quantity;
            self.cash += total - commission;
        }
        self.fees_paid += commission;

        tracing::debug!(
            "Paper {} {:.8} {} @ ${:.2} (commission ${:.4})",
            decision.action,
            quantity,
            self.symbol,
            price,
            commission
        );

        Ok(TradeRecord {
            id: Uuid::new_v4(),
            timestamp: now,
            symbol: self.symbol.clone(),
            action: decision.action,
            quantity,
            price,
            total,
            commission,
            reason: decision.reason.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntrySignal, ExitReason, HoldReason};

    fn account() -> PaperAccount {
        PaperAccount::new("BTC/USD", PaperConfig::default())
    }

    #[test]
    fn test_buy_fill_sized_by_confidence() {
        let mut account = account();
        let decision = TradingDecision::buy(EntrySignal::GoldenCross, 0.8, 100.0, "golden cross");

        let record = account.fill(&decision, Utc::now()).unwrap();

        // 10000 * 10% * 0.8 = 800 -> 8 units
        assert!((record.quantity - 8.0).abs() < 1e-9);
        assert!((record.commission - 0.8).abs() < 1e-9);
        assert!((account.cash() - (10000.0 - 800.0 - 0.8)).abs() < 1e-9);
        assert!((account.holdings() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_sell_uses_decision_quantity() {
        let mut account = account();
        let buy = TradingDecision::buy(EntrySignal::GoldenCross, 1.0, 100.0, "golden cross");
        account.fill(&buy, Utc::now()).unwrap();

        let sell = TradingDecision::sell(ExitReason::TakeProfit, 1.0, 110.0, 10.0, "take profit");
        let record = account.fill(&sell, Utc::now()).unwrap();

        assert!((record.quantity - 10.0).abs() < 1e-9);
        assert!(account.holdings().abs() < 1e-9);
        assert!((account.fees_paid() - (1.0 + 1.1)).abs() < 1e-9);
    }

    #[test]
    fn test_sell_without_holdings_rejected() {
        let mut account = account();
        let sell = TradingDecision::sell(ExitReason::DeathCross, 0.8, 100.0, 1.0, "death cross");

        let result = account.fill(&sell, Utc::now());
        assert!(matches!(result, Err(Error::Fill(_))));
        assert_eq!(account.cash(), 10000.0);
    }

    #[test]
    fn test_min_trade_value_enforced() {
        let mut account = PaperAccount::new(
            "BTC/USD",
            PaperConfig {
                initial_cash: 50.0,
                ..Default::default()
            },
        );
        let buy = TradingDecision::buy(EntrySignal::BullishMomentum, 0.65, 100.0, "momentum");

        let result = account.fill(&buy, Utc::now());
        assert!(result.unwrap_err().to_string().contains("below minimum"));
        assert_eq!(account.holdings(), 0.0);
    }

    #[test]
    fn test_hold_is_not_fillable() {
        let mut account = account();
        let hold = TradingDecision::hold(HoldReason::NoSignal, 0.5, 100.0, "no clear signal");
        assert!(account.fill(&hold, Utc::now()).is_err());
    }
}

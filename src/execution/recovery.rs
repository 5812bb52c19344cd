use chrono::{DateTime, Utc};

use crate::models::{Action, TradeRecord};
use crate::{Error, Result};

/// Engine state rebuilt from the authoritative trade history
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredState {
    /// Weighted average buy price and net quantity, if still holding
    pub position: Option<RecoveredPosition>,
    /// Most recent trade of either direction
    pub last_trade: Option<(DateTime<Utc>, Action)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredPosition {
    pub entry_price: f64,
    pub quantity: f64,
    /// Time of the most recent BUY, for reporting only
    pub last_buy_time: DateTime<Utc>,
}

/// Rebuild position and cooldown state for `symbol`
///
/// Net quantity is total bought minus total sold. Anything at or below
/// `dust_quantity` counts as flat, but the cooldown is still restored.
pub fn recover(trades: &[TradeRecord], symbol: &str, dust_quantity: f64) -> Result<RecoveredState> {
    let pair_trades: Vec<&TradeRecord> = trades.iter().filter(|t| t.symbol == symbol).collect();

    let last_trade = pair_trades
        .iter()
        .filter(|t| t.action != Action::Hold)
        .max_by_key(|t| t.timestamp)
        .map(|t| (t.timestamp, t.action));

    let (bought_qty, bought_value, sold_qty) =
        pair_trades
            .iter()
            .fold((0.0, 0.0, 0.0), |(bq, bv, sq), t| match t.action {
                Action::Buy => (bq + t.quantity, bv + t.quantity * t.price, sq),
                Action::Sell => (bq, bv, sq + t.quantity),
                Action::Hold => (bq, bv, sq),
            });

    let net_quantity = bought_qty - sold_qty;

    if net_quantity <= dust_quantity {
        tracing::info!(
            "[{}] No significant position in {} trades - starting flat",
            symbol,
            pair_trades.len()
        );
        return Ok(RecoveredState {
            position: None,
            last_trade,
        });
    }

    let last_buy = pair_trades
        .iter()
        .filter(|t| t.action == Action::Buy)
        .max_by_key(|t| t.timestamp)
        .ok_or_else(|| Error::Recovery(format!("{} holds {} with no BUY trades", symbol, net_quantity)))?;

    let entry_price = bought_value / bought_qty;

    tracing::info!(
        "[{}] Recovered position: {:.8} @ ${:.2} (bought {:.8}, sold {:.8})",
        symbol,
        net_quantity,
        entry_price,
        bought_qty,
        sold_qty
    );

    Ok(RecoveredState {
        position: Some(RecoveredPosition {
            entry_price,
            quantity: net_quantity,
            last_buy_time: last_buy.timestamp,
        }),
        last_trade,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn trade(symbol: &str, action: Action, quantity: f64, price: f64, minutes: i64) -> TradeRecord {
        TradeRecord {
            id: Uuid::new_v4(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
            symbol: symbol.to_string(),
            action,
            quantity,
            price,
            total: quantity * price,
            commission: 0.0,
            reason: String::new(),
        }
    }

    #[test]
    fn test_recover_weighted_entry() {
        let trades = vec![
            trade("BTC/USD", Action::Buy, 1.0, 100.0, 0),
            trade("BTC/USD", Action::Buy, 3.0, 120.0, 30),
            trade("BTC/USD", Action::Sell, 1.5, 130.0, 60),
        ];

        let state = recover(&trades, "BTC/USD", 1e-4).unwrap();
        let position = state.position.unwrap();

        assert!((position.quantity - 2.5).abs() < 1e-9);
        // (100 + 360) / 4
        assert!((position.entry_price - 115.0).abs() < 1e-9);
        assert_eq!(position.last_buy_time, trades[1].timestamp);
        assert_eq!(state.last_trade, Some((trades[2].timestamp, Action::Sell)));
    }

    #[test]
    fn test_other_symbols_ignored() {
        let trades = vec![
            trade("BTC/USD", Action::Buy, 1.0, 100.0, 0),
            trade("ETH/USD", Action::Buy, 10.0, 5.0, 10),
        ];

        let state = recover(&trades, "BTC/USD", 1e-4).unwrap();
        assert_eq!(state.position.unwrap().quantity, 1.0);
        assert_eq!(state.last_trade.unwrap().0, trades[0].timestamp);
    }

    #[test]
    fn test_fully_sold_is_flat_but_keeps_cooldown() {
        let trades = vec![
            trade("BTC/USD", Action::Buy, 1.0, 100.0, 0),
            trade("BTC/USD", Action::Sell, 1.0, 105.0, 20),
        ];

        let state = recover(&trades, "BTC/USD", 1e-4).unwrap();
        assert!(state.position.is_none());
        assert_eq!(state.last_trade, Some((trades[1].timestamp, Action::Sell)));
    }

    #[test]
    fn test_empty_history() {
        let state = recover(&[], "BTC/USD", 1e-4).unwrap();
        assert_eq!(
            state,
            RecoveredState {
                position: None,
                last_trade: None
            }
        );
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market_hours::MarketHoursPolicy;
use super::signals::{MacdConfig, MacdSnapshot};
use crate::execution::recovery::RecoveredState;
use crate::execution::{OpenPosition, Position, RiskExit};
use crate::indicators::{average_absolute_return, calculate_ema, calculate_macd, VolatilityRegime};
use crate::models::{
    Action, EntrySignal, ExitReason, HoldReason, PriceSample, TradingDecision,
};
use crate::risk::{CooldownGate, FlashCrashGuard, RiskParameters, VolatilityConfig};
use crate::{Error, Result};

/// Configuration for one pair's engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub symbol: String,
    pub macd: MacdConfig,
    /// Base risk parameters; the volatility monitor tunes from these
    pub risk: RiskParameters,
    pub volatility: VolatilityConfig,
    pub flash_crash_threshold: f64,
    pub market_hours: MarketHoursPolicy,
    /// Recovered net quantity at or below this counts as flat
    pub recovery_dust_quantity: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC/USD".to_string(),
            macd: MacdConfig::default(),
            risk: RiskParameters::default(),
            volatility: VolatilityConfig::default(),
            flash_crash_threshold: 0.07, // 7% single-tick move
            market_hours: MarketHoursPolicy::default(),
            recovery_dust_quantity: 0.0001,
        }
    }
}

/// MACD signal engine with position and risk state for a single pair
///
/// Each pair gets its own instance; nothing is shared between instances.
/// `analyze` always returns a decision. Position and cooldown changes
/// happen inside the same call that produced the decision:
/// - risk exits and MACD exits close the position and record a SELL
/// - BUYs are only applied once the caller confirms the fill through
///   [`SignalEngine::open_position`]
#[derive(Debug, Clone)]
pub struct SignalEngine {
    config: EngineConfig,
    risk: RiskParameters,
    regime: VolatilityRegime,
    position: Position,
    cooldown: CooldownGate,
    flash_guard: FlashCrashGuard,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SignalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            risk: config.risk,
            regime: VolatilityRegime::Normal,
            position: Position::Flat,
            cooldown: CooldownGate::new(),
            flash_guard: FlashCrashGuard::new(config.flash_crash_threshold),
            config,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    /// Risk parameters as tuned by the last `analyze` call
    pub fn risk_parameters(&self) -> &RiskParameters {
        &self.risk
    }

    pub fn volatility_regime(&self) -> VolatilityRegime {
        self.regime
    }

    pub fn cooldown(&self) -> &CooldownGate {
        &self.cooldown
    }

    pub fn min_samples_required(&self) -> usize {
        self.config.macd.min_samples()
    }

    /// Analyze using the current wall-clock time
    pub fn analyze(&mut self, history: &[PriceSample], current_price: f64) -> TradingDecision {
        self.analyze_at(history, current_price, Utc::now())
    }

    /// Produce one decision for `current_price` given `history` (oldest first)
    pub fn analyze_at(
        &mut self,
        history: &[PriceSample],
        current_price: f64,
        now: DateTime<Utc>,
    ) -> TradingDecision {
        let decision = self.evaluate(history, current_price, now);

        if decision.is_hold() {
            tracing::debug!(
                symbol = %self.config.symbol,
                action = %decision.action,
                confidence = decision.confidence,
                price = decision.price,
                "{}",
                decision.reason
            );
        } else {
            tracing::info!(
                symbol = %self.config.symbol,
                action = %decision.action,
                confidence = decision.confidence,
                price = decision.price,
                quantity = decision.quantity,
                "{}",
                decision.reason
            );
        }

        decision
    }

    fn evaluate(&mut self, history: &[PriceSample], price: f64, now: DateTime<Utc>) -> TradingDecision {
        if !price.is_finite() || price <= 0.0 {
            return TradingDecision::hold(
                HoldReason::InvalidInput,
                0.0,
                price,
                format!("Invalid current price: {}", price),
            );
        }

        // 1. Flash-crash veto short-circuits everything
        if let Err(veto) = self.flash_guard.check(price) {
            tracing::warn!(
                symbol = %self.config.symbol,
                "Flash crash veto: ${:.2} -> ${:.2} ({:+.2}%)",
                veto.previous_price,
                veto.current_price,
                veto.change_pct * 100.0
            );
            return TradingDecision::hold(
                HoldReason::FlashCrash,
                0.9,
                price,
                format!(
                    "Extreme move detected: {:+.2}% since last tick, trading paused",
                    veto.change_pct * 100.0
                ),
            );
        }

        let closes: Vec<f64> = history.iter().map(|s| s.price).collect();
        let history_valid = closes.iter().all(|p| p.is_finite());

        // 2. Volatility regime
        if history_valid {
            self.retune(&closes);
        }

        // 3. Risk exits take priority over entries
        if let Some(decision) = self.check_risk_exits(price, now) {
            return decision;
        }

        if !history_valid {
            return TradingDecision::hold(
                HoldReason::InvalidInput,
                0.0,
                price,
                "Invalid market data: non-finite price in history",
            );
        }

        // 4. Enough samples for MACD + signal
        let min_samples = self.config.macd.min_samples();
        if closes.len() < min_samples {
            return TradingDecision::hold(
                HoldReason::InsufficientData,
                0.0,
                price,
                format!("Insufficient data: {} samples, need {}", closes.len(), min_samples),
            );
        }

        // 5. Latest two MACD points must be defined
        let macd = &self.config.macd;
        let series = calculate_macd(&closes, macd.fast_period, macd.slow_period, macd.signal_period);
        let Some(snapshot) = MacdSnapshot::from_series(&series) else {
            return TradingDecision::hold(
                HoldReason::IncompleteIndicator,
                0.0,
                price,
                "MACD calculation incomplete",
            );
        };

        tracing::debug!(
            "MACD: {:.4}, Signal: {:.4}, Prev MACD: {:.4}, Prev Signal: {:.4}",
            snapshot.macd,
            snapshot.signal,
            snapshot.prev_macd,
            snapshot.prev_signal
        );

        // 6. Entries and signal exits
        let mut decision = self.signal_decision(&snapshot, &closes, price, now);

        // 7. Time-of-day confidence policy
        if !decision.is_hold() {
            decision.confidence = self.config.market_hours.adjust(decision.confidence, now);
        }

        decision
    }

    fn retune(&mut self, closes: &[f64]) {
        let vol_config = &self.config.volatility;
        let volatility = average_absolute_return(closes, vol_config.lookback);
        let regime =
            VolatilityRegime::classify(volatility, vol_config.low_threshold, vol_config.high_threshold);

        if regime != self.regime {
            tracing::debug!(
                symbol = %self.config.symbol,
                "Volatility regime {:?} -> {:?} (avg abs return {:.4})",
                self.regime,
                regime,
                volatility
            );
        }

        self.regime = regime;
        self.risk = RiskParameters::tuned_for(&self.config.risk, regime, vol_config);
    }

    fn check_risk_exits(&mut self, price: f64, now: DateTime<Utc>) -> Option<TradingDecision> {
        let open = self.position.as_open_mut()?;

        let previous_stop = open.stop_loss;
        if open.update_trailing_stop(price, &self.risk) {
            tracing::debug!(
                symbol = %self.config.symbol,
                "Trailing stop raised ${:.2} -> ${:.2} (high ${:.2})",
                previous_stop,
                open.stop_loss,
                open.highest_price
            );
        }

        let exit = open.exit_trigger(price, now, &self.risk)?;
        let (confidence, message) = match exit {
            RiskExit::StopLoss => (1.0, format!("Stop loss hit at ${:.2}", open.stop_loss)),
            RiskExit::TakeProfit => (1.0, format!("Take profit hit at ${:.2}", open.take_profit)),
            RiskExit::TimeStop => (
                0.8,
                format!("Time stop: position open {:.1}h", open.hours_open(now)),
            ),
        };

        Some(self.close_with(exit.into(), confidence, price, now, message))
    }

    fn signal_decision(
        &mut self,
        snapshot: &MacdSnapshot,
        closes: &[f64],
        price: f64,
        now: DateTime<Utc>,
    ) -> TradingDecision {
        let mut gated: Option<(HoldReason, String)> = None;

        if snapshot.is_golden_cross() {
            match self.entry_gate(now) {
                Ok(()) => {
                    return TradingDecision::buy(
                        EntrySignal::GoldenCross,
                        0.8,
                        price,
                        "MACD golden cross, buy signal",
                    )
                }
                Err((reason, why)) => gated = Some((reason, format!("Golden cross ignored: {}", why))),
            }
        }

        if snapshot.is_bullish_momentum() {
            match self.entry_gate(now) {
                Ok(()) => {
                    let trend_period = self.config.macd.trend_period;
                    if closes.len() >= trend_period {
                        if let Some(trend) = calculate_ema(closes, trend_period) {
                            if price < trend {
                                return TradingDecision::hold(
                                    HoldReason::BelowLongTermTrend,
                                    0.5,
                                    price,
                                    format!(
                                        "Bullish momentum but price ${:.2} below long-term trend (EMA{} ${:.2})",
                                        price, trend_period, trend
                                    ),
                                );
                            }
                        }
                    }
                    return TradingDecision::buy(
                        EntrySignal::BullishMomentum,
                        0.65,
                        price,
                        "MACD above zero line with rising histogram",
                    );
                }
                Err((reason, why)) => {
                    gated.get_or_insert((reason, format!("Bullish momentum ignored: {}", why)));
                }
            }
        }

        if let Some(open) = self.position.as_open() {
            if snapshot.is_death_cross() {
                return self.close_with(
                    ExitReason::DeathCross,
                    0.8,
                    price,
                    now,
                    "MACD death cross, sell signal".to_string(),
                );
            }

            let pnl_pct = open.unrealized_pnl_pct(price);
            if snapshot.is_bearish_momentum() && pnl_pct > 0.0 {
                return self.close_with(
                    ExitReason::BearishMomentum,
                    0.6,
                    price,
                    now,
                    format!("Bearish momentum, taking profit at {:+.2}%", pnl_pct * 100.0),
                );
            }
        }

        let status = self.position.as_open().map(|open| {
            format!(
                "P/L {:+.2}%, stop ${:.2}, target ${:.2}",
                open.unrealized_pnl_pct(price) * 100.0,
                open.stop_loss,
                open.take_profit
            )
        });

        match (gated, status) {
            (Some((reason, why)), Some(status)) => {
                TradingDecision::hold(reason, 0.5, price, format!("{} ({})", why, status))
            }
            (Some((reason, why)), None) => TradingDecision::hold(reason, 0.5, price, why),
            (None, Some(status)) => {
                TradingDecision::hold(HoldReason::Holding, 0.5, price, format!("Holding position: {}", status))
            }
            (None, None) => TradingDecision::hold(HoldReason::NoSignal, 0.5, price, "No clear signal"),
        }
    }

    /// Whether a new BUY may be emitted right now
    fn entry_gate(&self, now: DateTime<Utc>) -> std::result::Result<(), (HoldReason, String)> {
        if self.position.is_long() {
            return Err((HoldReason::AlreadyPositioned, "already in position".to_string()));
        }

        let remaining =
            self.cooldown
                .remaining_seconds(Action::Buy, self.risk.min_trade_interval_seconds, now);
        if remaining > 0 {
            return Err((
                HoldReason::CooldownActive,
                format!("cooldown active, {}s remaining", remaining),
            ));
        }

        Ok(())
    }

    fn close_with(
        &mut self,
        exit: ExitReason,
        confidence: f64,
        price: f64,
        now: DateTime<Utc>,
        message: String,
    ) -> TradingDecision {
        let quantity = match self.position.close() {
            Some(closed) => {
                tracing::info!(
                    symbol = %self.config.symbol,
                    "Closing {:.8} @ ${:.2} ({:?}), entry ${:.2}, P/L ${:.2}",
                    closed.quantity,
                    price,
                    exit,
                    closed.entry_price,
                    closed.unrealized_pnl(price)
                );
                closed.quantity
            }
            None => 0.0,
        };

        self.cooldown.record(Action::Sell, now);
        TradingDecision::sell(exit, confidence, price, quantity, message)
    }

    /// Open a position after a confirmed BUY fill
    pub fn open_position(&mut self, price: f64, quantity: f64) -> Result<()> {
        self.open_position_at(price, quantity, Utc::now())
    }

    /// Open a position after a confirmed BUY fill at `now`
    ///
    /// Stop and target come from the currently tuned risk parameters.
    /// The BUY is recorded with the cooldown gate.
    pub fn open_position_at(&mut self, price: f64, quantity: f64, now: DateTime<Utc>) -> Result<()> {
        if let Some(open) = self.position.as_open() {
            return Err(Error::Position(format!(
                "already have open {} position @ ${:.2}",
                self.config.symbol, open.entry_price
            )));
        }
        validate_fill(price, quantity)?;

        let open = OpenPosition::open(price, quantity, now, &self.risk);
        tracing::info!(
            symbol = %self.config.symbol,
            "Opened {:.8} @ ${:.2} (stop ${:.2}, target ${:.2})",
            quantity,
            price,
            open.stop_loss,
            open.take_profit
        );

        self.position = Position::Long(open);
        self.cooldown.record(Action::Buy, now);
        Ok(())
    }

    /// Record a confirmed fill with the cooldown gate
    pub fn record_trade(&mut self, action: Action) {
        self.record_trade_at(action, Utc::now());
    }

    pub fn record_trade_at(&mut self, action: Action, now: DateTime<Utc>) {
        self.cooldown.record(action, now);
    }

    /// Overwrite cooldown state directly (restart recovery)
    pub fn set_last_trade(&mut self, at: DateTime<Utc>, action: Action) {
        self.cooldown.restore(at, action);
    }

    /// Rebuild a position from recovered holdings without touching the cooldown
    pub fn restore_position(&mut self, entry_price: f64, quantity: f64, entry_time: DateTime<Utc>) -> Result<()> {
        validate_fill(entry_price, quantity)?;

        if self.position.is_long() {
            tracing::warn!(symbol = %self.config.symbol, "Replacing open position with recovered state");
        }

        self.position = Position::Long(OpenPosition::open(entry_price, quantity, entry_time, &self.risk));
        Ok(())
    }

    /// Apply everything recovered from trade history, restarting the position clock now
    pub fn restore(&mut self, state: &RecoveredState) -> Result<()> {
        self.restore_at(state, Utc::now())
    }

    /// Apply recovered state with `now` as the position's entry time
    ///
    /// The time stop counts from the restart, not from the last BUY.
    pub fn restore_at(&mut self, state: &RecoveredState, now: DateTime<Utc>) -> Result<()> {
        if let Some(position) = &state.position {
            self.restore_position(position.entry_price, position.quantity, now)?;
        }

        if let Some((at, action)) = state.last_trade {
            self.set_last_trade(at, action);
        }

        Ok(())
    }
}

fn validate_fill(price: f64, quantity: f64) -> Result<()> {
    if !price.is_finite() || price <= 0.0 {
        return Err(Error::Position(format!("invalid entry price {}", price)));
    }
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(Error::Position(format!("invalid quantity {}", quantity)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DecisionKind;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap()
    }

    fn history(prices: &[f64]) -> Vec<PriceSample> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PriceSample::new(t0() - Duration::minutes(15 * (prices.len() - i) as i64), p))
            .collect()
    }

    /// Gently oscillating prices: normal volatility, no crossover on the last point
    fn quiet_history(n: usize) -> Vec<PriceSample> {
        let prices: Vec<f64> = (0..n).map(|i| 100.0 + if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        history(&prices)
    }

    #[test]
    fn test_invalid_price_holds() {
        let mut engine = SignalEngine::default();
        for price in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            let decision = engine.analyze_at(&quiet_history(40), price, t0());
            assert_eq!(decision.hold_reason(), Some(HoldReason::InvalidInput));
        }
        // Nothing reached the flash-crash memory
        assert!(engine.flash_guard.last_price().is_none());
    }

    #[test]
    fn test_non_finite_history_holds() {
        let mut engine = SignalEngine::default();
        let mut samples = quiet_history(40);
        samples[10].price = f64::NAN;

        let decision = engine.analyze_at(&samples, 100.0, t0());
        assert_eq!(decision.hold_reason(), Some(HoldReason::InvalidInput));
        assert!(decision.reason.contains("Invalid market data"));
    }

    #[test]
    fn test_insufficient_data() {
        let mut engine = SignalEngine::default();
        let decision = engine.analyze_at(&quiet_history(34), 100.0, t0());

        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.confidence, 0.0);
        assert!(decision.reason.contains("Insufficient data"));
    }

    #[test]
    fn test_incomplete_indicator() {
        // Fast EMA longer than slow: enough samples by count, MACD still warming up
        let config = EngineConfig {
            macd: MacdConfig {
                fast_period: 10,
                slow_period: 5,
                signal_period: 2,
                trend_period: 200,
            },
            ..Default::default()
        };
        let mut engine = SignalEngine::new(config);

        let samples = history(&[100.0, 101.0, 100.0, 101.0, 100.0, 101.0, 100.0]);
        let decision = engine.analyze_at(&samples, 100.0, t0());
        assert_eq!(decision.hold_reason(), Some(HoldReason::IncompleteIndicator));
        assert_eq!(decision.confidence, 0.0);
        assert_eq!(decision.reason, "MACD calculation incomplete");
    }

    #[test]
    fn test_no_signal_when_flat() {
        let mut engine = SignalEngine::default();
        let samples = history(&vec![100.0; 40]);
        let decision = engine.analyze_at(&samples, 100.0, t0());

        assert_eq!(decision.hold_reason(), Some(HoldReason::NoSignal));
        assert_eq!(decision.confidence, 0.5);
        assert_eq!(decision.reason, "No clear signal");
    }

    #[test]
    fn test_holding_reason_reports_levels() {
        let mut engine = SignalEngine::default();
        engine.open_position_at(100.0, 1.0, t0()).unwrap();

        let samples = history(&vec![100.0; 40]);
        let decision = engine.analyze_at(&samples, 101.0, t0() + Duration::minutes(5));

        assert_eq!(decision.hold_reason(), Some(HoldReason::Holding));
        assert!(decision.reason.contains("P/L +1.00%"));
        assert!(decision.reason.contains("stop $97.00"));
    }

    #[test]
    fn test_stop_loss_exit_closes_and_records_sell() {
        let mut engine = SignalEngine::default();
        engine.open_position_at(100.0, 2.0, t0()).unwrap();

        let now = t0() + Duration::minutes(15);
        let decision = engine.analyze_at(&quiet_history(10), 97.0, now);

        assert_eq!(decision.action, Action::Sell);
        assert_eq!(decision.kind, DecisionKind::Exit(ExitReason::StopLoss));
        assert_eq!(decision.confidence, 1.0);
        assert_eq!(decision.quantity, 2.0);
        assert!(decision.reason.to_lowercase().contains("stop loss hit"));
        assert_eq!(engine.position(), &Position::Flat);
        assert_eq!(engine.cooldown().last_trade_action(), Some(Action::Sell));
        assert_eq!(engine.cooldown().last_trade_time(), Some(now));
    }

    #[test]
    fn test_take_profit_exit() {
        let mut engine = SignalEngine::default();
        engine.open_position_at(100.0, 1.0, t0()).unwrap();

        let decision = engine.analyze_at(&quiet_history(10), 103.5, t0() + Duration::minutes(15));
        assert_eq!(decision.kind, DecisionKind::Exit(ExitReason::TakeProfit));
        assert_eq!(decision.confidence, 1.0);
    }

    #[test]
    fn test_time_stop_exit() {
        let mut engine = SignalEngine::default();
        engine.open_position_at(100.0, 1.0, t0()).unwrap();

        let decision = engine.analyze_at(&quiet_history(10), 100.5, t0() + Duration::hours(24));
        assert_eq!(decision.kind, DecisionKind::Exit(ExitReason::TimeStop));
        assert_eq!(decision.confidence, 0.8);
        assert!(decision.reason.starts_with("Time stop"));
    }

    #[test]
    fn test_exits_not_adjusted_by_market_hours() {
        let mut engine = SignalEngine::default();
        engine.open_position_at(100.0, 1.0, t0() - Duration::hours(24)).unwrap();

        // A 0.8 entry would be boosted at this hour; the time stop is not
        let decision = engine.analyze_at(&quiet_history(10), 100.5, t0());
        assert_eq!(decision.kind, DecisionKind::Exit(ExitReason::TimeStop));
        assert_eq!(decision.confidence, 0.8);
    }

    #[test]
    fn test_open_twice_rejected() {
        let mut engine = SignalEngine::default();
        engine.open_position_at(100.0, 1.0, t0()).unwrap();

        let result = engine.open_position_at(101.0, 1.0, t0());
        assert!(matches!(result, Err(Error::Position(_))));
        assert_eq!(engine.position().as_open().unwrap().entry_price, 100.0);
    }

    #[test]
    fn test_open_rejects_bad_fill() {
        let mut engine = SignalEngine::default();
        assert!(engine.open_position_at(0.0, 1.0, t0()).is_err());
        assert!(engine.open_position_at(100.0, 0.0, t0()).is_err());
        assert!(!engine.position().is_long());
        assert!(engine.cooldown().last_trade_action().is_none());
    }

    #[test]
    fn test_open_records_buy_cooldown() {
        let mut engine = SignalEngine::default();
        engine.open_position_at(100.0, 1.0, t0()).unwrap();

        assert_eq!(engine.cooldown().last_trade_action(), Some(Action::Buy));
        assert_eq!(engine.cooldown().last_trade_time(), Some(t0()));
    }

    #[test]
    fn test_low_volatility_tightens_new_stops() {
        let mut engine = SignalEngine::default();
        let samples = history(&vec![100.0; 40]);
        engine.analyze_at(&samples, 100.0, t0());

        assert_eq!(engine.volatility_regime(), VolatilityRegime::Low);
        assert!((engine.risk_parameters().stop_loss_pct - 0.021).abs() < 1e-12);

        engine.open_position_at(100.0, 1.0, t0()).unwrap();
        let open = engine.position().as_open().unwrap();
        assert!((open.stop_loss - 97.9).abs() < 1e-9);
    }

    #[test]
    fn test_restore_sets_position_without_cooldown() {
        let mut engine = SignalEngine::default();
        engine.restore_position(115.0, 2.5, t0()).unwrap();

        let open = engine.position().as_open().unwrap();
        assert_eq!(open.entry_price, 115.0);
        assert_eq!(open.quantity, 2.5);
        assert_eq!(open.highest_price, 115.0);
        assert!(engine.cooldown().last_trade_action().is_none());

        engine.set_last_trade(t0(), Action::Sell);
        assert_eq!(engine.cooldown().last_trade_action(), Some(Action::Sell));
    }
}

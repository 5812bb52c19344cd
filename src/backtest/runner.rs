use chrono::{DateTime, Utc};

use crate::backtest::metrics::{BacktestMetrics, RoundTrip};
use crate::config::Settings;
use crate::execution::{PaperAccount, PaperConfig};
use crate::models::{Action, DecisionKind, HoldReason, PriceSample, TradeRecord, TradingDecision};
use crate::persistence::TradeJournal;
use crate::risk::{SessionGuard, SessionLimits};
use crate::strategy::{EngineConfig, SignalEngine};
use crate::{Error, Result};

/// Entry fill waiting for its exit
struct OpenEntry {
    time: DateTime<Utc>,
    price: f64,
    quantity: f64,
    cost: f64,
}

/// Replays a price series through one engine and a paper account
pub struct BacktestRunner {
    engine_config: EngineConfig,
    paper_config: PaperConfig,
    session_limits: SessionLimits,
    journal: Option<TradeJournal>,
}

impl BacktestRunner {
    pub fn new(engine_config: EngineConfig, paper_config: PaperConfig, session_limits: SessionLimits) -> Self {
        Self {
            engine_config,
            paper_config,
            session_limits,
            journal: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.engine.clone(),
            settings.paper.clone(),
            settings.session.clone(),
        )
    }

    /// Append every fill to `journal`
    pub fn with_journal(mut self, journal: TradeJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Run a backtest over `samples` (oldest first)
    ///
    /// Sample `i` is the current price and the samples before it are the
    /// history, capped at the longest window the engine looks at. The
    /// engine clock is the sample timestamp. Fills are confirmed on the
    /// paper account before engine state is touched; any position left at
    /// the end stays open and is marked to market.
    pub fn run(&self, samples: &[PriceSample]) -> Result<BacktestMetrics> {
        let mut engine = SignalEngine::new(self.engine_config.clone());
        let samples_needed = engine.min_samples_required();

        if samples.len() <= samples_needed {
            return Err(Error::Backtest(format!(
                "Not enough samples for backtest. Need more than {}, got {}",
                samples_needed,
                samples.len()
            )));
        }

        let window = samples_needed.max(self.engine_config.macd.trend_period);
        let mut account = PaperAccount::new(self.engine_config.symbol.clone(), self.paper_config.clone());
        let initial_value = account.portfolio_value(samples[0].price);
        let mut session = SessionGuard::new(self.session_limits.clone(), initial_value);

        tracing::info!(
            "Starting backtest: {} samples, engine needs {}, window {}",
            samples.len(),
            samples_needed,
            window
        );

        let mut equity_curve = Vec::with_capacity(samples.len() - samples_needed);
        let mut round_trips = Vec::new();
        let mut open_entry: Option<OpenEntry> = None;
        let (mut buys, mut sells) = (0usize, 0usize);
        let mut session_trips = 0usize;
        let mut flash_crash_vetoes = 0usize;

        for i in samples_needed..samples.len() {
            let history = &samples[i.saturating_sub(window)..i];
            let current = samples[i];
            let decision = engine.analyze_at(history, current.price, current.timestamp);

            match decision.action {
                Action::Buy => {
                    let asset_value = account.holdings() * current.price;
                    let portfolio_value = account.portfolio_value(current.price);

                    if let Err(trip) = session.check_buy(asset_value, portfolio_value, current.timestamp) {
                        session_trips += 1;
                        tracing::debug!("Session guard refused BUY: {:?}", trip);
                    } else {
                        match account.fill(&decision, current.timestamp) {
                            Ok(record) => {
                                engine.open_position_at(record.price, record.quantity, current.timestamp)?;
                                session.record_fill(current.timestamp);
                                buys += 1;

                                open_entry = Some(OpenEntry {
                                    time: current.timestamp,
                                    price: record.price,
                                    quantity: record.quantity,
                                    cost: record.total + record.commission,
                                });
                                self.journal_fill(&record)?;
                            }
                            Err(e) => tracing::debug!("BUY not filled: {}", e),
                        }
                    }
                }
                Action::Sell => {
                    let sell = sweep_sell(&decision, account.holdings());
                    match account.fill(&sell, current.timestamp) {
                        Ok(record) => {
                            session.record_fill(current.timestamp);
                            sells += 1;

                            if let Some(entry) = open_entry.take() {
                                // Swept leftovers are not part of this round trip
                                let sold = record.quantity.min(entry.quantity);
                                let net_per_unit = (record.total - record.commission) / record.quantity;
                                let pnl = net_per_unit * sold - entry.cost * (sold / entry.quantity);
                                session.record_round_trip(pnl);

                                let exit_reason = match decision.kind {
                                    DecisionKind::Exit(reason) => Some(reason),
                                    _ => None,
                                };
                                round_trips.push(RoundTrip {
                                    entry_time: entry.time,
                                    exit_time: current.timestamp,
                                    entry_price: entry.price,
                                    exit_price: record.price,
                                    quantity: sold,
                                    pnl,
                                    exit_reason,
                                });
                            }
                            self.journal_fill(&record)?;
                        }
                        Err(e) => tracing::warn!("SELL not filled, position already closed by engine: {}", e),
                    }
                }
                Action::Hold => {
                    if decision.hold_reason() == Some(HoldReason::FlashCrash) {
                        flash_crash_vetoes += 1;
                    }
                }
            }

            let value = account.portfolio_value(current.price);
            session.monitor(value);
            equity_curve.push(value);
        }

        let mut metrics = BacktestMetrics::calculate(
            initial_value,
            &equity_curve,
            round_trips,
            (buys, sells),
            account.fees_paid(),
        );
        metrics.session_trips = session_trips;
        metrics.flash_crash_vetoes = flash_crash_vetoes;

        let open_quantity = engine.position().as_open().map_or(0.0, |open| open.quantity);
        metrics.stranded_quantity = (account.holdings() - open_quantity).max(0.0);
        if metrics.stranded_quantity > 0.0 {
            tracing::warn!(
                "{:.8} held with no engine position after rejected exits",
                metrics.stranded_quantity
            );
        }

        tracing::info!(
            "Backtest complete: {} round trips, return {:+.2}%, max drawdown {:.2}%",
            metrics.round_trips,
            metrics.total_return_pct,
            metrics.max_drawdown_pct
        );

        Ok(metrics)
    }

    fn journal_fill(&self, record: &TradeRecord) -> Result<()> {
        if let Some(journal) = &self.journal {
            journal.append(record)?;
        }
        Ok(())
    }
}

/// Exit SELL widened to everything held
///
/// The engine is flat as soon as it emits an exit, so holdings left by an
/// earlier rejected exit go out with the next one.
fn sweep_sell(decision: &TradingDecision, holdings: f64) -> TradingDecision {
    let mut sell = decision.clone();
    if holdings > sell.quantity {
        sell.quantity = holdings;
    }
    sell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};
    use crate::execution::recover;
    use crate::models::{EntrySignal, ExitReason};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn samples(scenario: MarketScenario, count: usize) -> Vec<PriceSample> {
        SyntheticDataGenerator::new(42)
            .with_start_time(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
            .generate(scenario, count, 5)
    }

    fn runner() -> BacktestRunner {
        BacktestRunner::from_settings(&Settings::default())
    }

    #[test]
    fn test_backtest_runs_every_scenario() {
        tracing_subscriber::fmt()
            .with_env_filter("macdbot=debug")
            .try_init()
            .ok();

        for scenario in MarketScenario::ALL {
            let metrics = runner().run(&samples(scenario, 400)).unwrap();

            assert!(metrics.final_portfolio_value > 0.0, "{}", scenario);
            assert!(metrics.sell_fills <= metrics.buy_fills, "{}", scenario);
            assert_eq!(metrics.round_trips, metrics.sell_fills, "{}", scenario);
            assert!(metrics.max_drawdown_pct >= 0.0);
            assert_eq!(metrics.stranded_quantity, 0.0, "{}", scenario);
        }
    }

    #[test]
    fn test_rejected_exit_is_swept_by_next_sell() {
        let mut account = PaperAccount::new("BTC/USD", PaperConfig::default());
        let now = Utc::now();

        let buy = TradingDecision::buy(EntrySignal::GoldenCross, 0.8, 100.0, "golden cross");
        let bought = account.fill(&buy, now).unwrap();

        // Notional of 8 units at $1 is under the $10 minimum
        let tiny_exit = TradingDecision::sell(ExitReason::StopLoss, 1.0, 1.0, bought.quantity, "stop loss");
        assert!(account.fill(&sweep_sell(&tiny_exit, account.holdings()), now).is_err());
        assert!((account.holdings() - bought.quantity).abs() < 1e-9);

        // A later, smaller exit takes the leftovers with it
        let exit = TradingDecision::sell(ExitReason::TakeProfit, 1.0, 100.0, 2.0, "take profit");
        let record = account.fill(&sweep_sell(&exit, account.holdings()), now).unwrap();

        assert!((record.quantity - bought.quantity).abs() < 1e-9);
        assert!(account.holdings().abs() < 1e-9);
    }

    #[test]
    fn test_sweep_never_shrinks_exit() {
        let exit = TradingDecision::sell(ExitReason::DeathCross, 0.8, 100.0, 2.0, "death cross");
        assert_eq!(sweep_sell(&exit, 0.5).quantity, 2.0);
        assert_eq!(sweep_sell(&exit, 3.0).quantity, 3.0);
    }

    #[test]
    fn test_backtest_insufficient_data() {
        let result = runner().run(&samples(MarketScenario::Uptrend, 20));

        assert!(matches!(result, Err(Error::Backtest(_))));
        assert!(result.unwrap_err().to_string().contains("Not enough samples"));
    }

    #[test]
    fn test_backtest_counts_flash_crash_veto() {
        let metrics = runner().run(&samples(MarketScenario::FlashCrash, 300)).unwrap();

        assert_eq!(metrics.flash_crash_vetoes, 1);
    }

    #[test]
    fn test_journal_replays_into_open_position() {
        let path = std::env::temp_dir().join(format!("macdbot-backtest-{}.json", Uuid::new_v4()));
        let journal = TradeJournal::new(&path);

        let metrics = runner()
            .with_journal(TradeJournal::new(&path))
            .run(&samples(MarketScenario::Volatile, 400))
            .unwrap();

        let trades = journal.load().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(trades.len(), metrics.buy_fills + metrics.sell_fills);

        let state = recover(&trades, "BTC/USD", 0.0001).unwrap();
        assert_eq!(state.position.is_some(), metrics.buy_fills > metrics.sell_fills);
    }
}

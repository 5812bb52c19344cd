use serde::{Deserialize, Serialize};

use crate::indicators::VolatilityRegime;

/// Exit and pacing parameters for one engine instance
///
/// `stop_loss_pct` and `take_profit_pct` are retuned every cycle from the
/// volatility regime; the rest only change through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskParameters {
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub trailing_stop_pct: f64,
    pub trailing_activation_pct: f64,
    pub max_position_hours: f64,
    pub min_trade_interval_seconds: i64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.03,
            take_profit_pct: 0.03,
            trailing_stop_pct: 0.015,
            trailing_activation_pct: 0.02,
            max_position_hours: 24.0,
            min_trade_interval_seconds: 1800,
        }
    }
}

/// Volatility monitor settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolatilityConfig {
    pub lookback: usize,
    pub high_threshold: f64,
    pub low_threshold: f64,
    /// Stop/target widening in high volatility
    pub high_multiplier: f64,
    /// Upper bound on widened stop/target
    pub max_pct: f64,
    /// Stop/target shrink factor in low volatility
    pub low_factor: f64,
    /// Lower bound on shrunk stop/target
    pub min_pct: f64,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            lookback: 20,
            high_threshold: 0.05,
            low_threshold: 0.01,
            high_multiplier: 1.5,
            max_pct: 0.08,
            low_factor: 0.7,
            min_pct: 0.015,
        }
    }
}

impl RiskParameters {
    /// Parameters for `regime`, derived from the configured `base`
    pub fn tuned_for(base: &RiskParameters, regime: VolatilityRegime, config: &VolatilityConfig) -> Self {
        let (stop_loss_pct, take_profit_pct) = match regime {
            VolatilityRegime::High => (
                (base.stop_loss_pct * config.high_multiplier).min(config.max_pct),
                (base.take_profit_pct * config.high_multiplier).min(config.max_pct),
            ),
            VolatilityRegime::Low => (
                (base.stop_loss_pct * config.low_factor).max(config.min_pct),
                (base.take_profit_pct * config.low_factor).max(config.min_pct),
            ),
            VolatilityRegime::Normal => (base.stop_loss_pct, base.take_profit_pct),
        };

        Self {
            stop_loss_pct,
            take_profit_pct,
            ..*base
        }
    }
}

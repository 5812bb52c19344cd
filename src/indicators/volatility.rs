use serde::{Deserialize, Serialize};

/// Volatility bucket used to retune stop-loss and take-profit widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolatilityRegime {
    Low,
    Normal,
    High,
}

impl VolatilityRegime {
    pub fn classify(volatility: f64, low_threshold: f64, high_threshold: f64) -> Self {
        if volatility > high_threshold {
            VolatilityRegime::High
        } else if volatility < low_threshold {
            VolatilityRegime::Low
        } else {
            VolatilityRegime::Normal
        }
    }
}

/// Returned when there are not enough closes to measure anything
pub const DEFAULT_VOLATILITY: f64 = 0.02;

/// Mean of `|p[i] - p[i-1]| / p[i-1]` over the last `lookback` returns
///
/// Uses the last `lookback + 1` closes. Returns with a zero base price are
/// skipped.
pub fn average_absolute_return(prices: &[f64], lookback: usize) -> f64 {
    if prices.len() < 2 || lookback == 0 {
        return DEFAULT_VOLATILITY;
    }

    let start = prices.len().saturating_sub(lookback + 1);
    let window = &prices[start..];

    let returns: Vec<f64> = window
        .windows(2)
        .filter(|pair| pair[0] != 0.0)
        .map(|pair| ((pair[1] - pair[0]) / pair[0]).abs())
        .collect();

    if returns.is_empty() {
        return DEFAULT_VOLATILITY;
    }

    returns.iter().sum::<f64>() / returns.len() as f64
}

use serde::{Deserialize, Serialize};

use crate::indicators::MacdSeries;

/// MACD periods
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    /// Long-term trend EMA used to filter momentum entries
    pub trend_period: usize,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
            trend_period: 200,
        }
    }
}

impl MacdConfig {
    /// Samples needed before a signal line with a previous point exists
    ///
    /// # Example
    /// ```
    /// use macdbot::strategy::signals::MacdConfig;
    ///
    /// assert_eq!(MacdConfig::default().min_samples(), 35);
    /// ```
    pub fn min_samples(&self) -> usize {
        self.slow_period + self.signal_period
    }
}

/// Latest two fully defined MACD points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdSnapshot {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub prev_macd: f64,
    pub prev_signal: f64,
    pub prev_histogram: f64,
}

impl MacdSnapshot {
    /// `None` unless MACD and signal are defined at both of the last two points
    pub fn from_series(series: &MacdSeries) -> Option<Self> {
        let n = series.len();
        if n < 2 {
            return None;
        }

        let macd = series.macd[n - 1]?;
        let signal = series.signal[n - 1]?;
        let prev_macd = series.macd[n - 2]?;
        let prev_signal = series.signal[n - 2]?;

        Some(Self {
            macd,
            signal,
            histogram: macd - signal,
            prev_macd,
            prev_signal,
            prev_histogram: prev_macd - prev_signal,
        })
    }

    /// MACD crossed above its signal line on the last point
    pub fn is_golden_cross(&self) -> bool {
        self.prev_macd < self.prev_signal && self.macd > self.signal
    }

    /// MACD crossed below its signal line on the last point
    pub fn is_death_cross(&self) -> bool {
        self.prev_macd > self.prev_signal && self.macd < self.signal
    }

    /// Positive, above signal, histogram widening
    pub fn is_bullish_momentum(&self) -> bool {
        self.macd > 0.0 && self.macd > self.signal && self.histogram > self.prev_histogram
    }

    /// Negative, below signal, histogram falling
    pub fn is_bearish_momentum(&self) -> bool {
        self.macd < 0.0 && self.macd < self.signal && self.histogram < self.prev_histogram
    }
}

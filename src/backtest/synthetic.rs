use crate::models::PriceSample;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+2% daily average)
    Uptrend,
    /// Steady downtrend with noise (-2% daily average)
    Downtrend,
    /// Sideways/choppy market (±1% around mean)
    Sideways,
    /// High volatility (±5% large swings)
    Volatile,
    /// Calm climb interrupted by a single sudden drop
    FlashCrash,
}

impl MarketScenario {
    pub const ALL: [MarketScenario; 5] = [
        MarketScenario::Uptrend,
        MarketScenario::Downtrend,
        MarketScenario::Sideways,
        MarketScenario::Volatile,
        MarketScenario::FlashCrash,
    ];
}

impl fmt::Display for MarketScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MarketScenario::Uptrend => "uptrend",
            MarketScenario::Downtrend => "downtrend",
            MarketScenario::Sideways => "sideways",
            MarketScenario::Volatile => "volatile",
            MarketScenario::FlashCrash => "flash-crash",
        };
        f.write_str(name)
    }
}

impl FromStr for MarketScenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "uptrend" => Ok(MarketScenario::Uptrend),
            "downtrend" => Ok(MarketScenario::Downtrend),
            "sideways" => Ok(MarketScenario::Sideways),
            "volatile" => Ok(MarketScenario::Volatile),
            "flash-crash" | "flashcrash" => Ok(MarketScenario::FlashCrash),
            other => Err(format!("unknown scenario '{}'", other)),
        }
    }
}

/// Generates synthetic price samples for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    start_time: Option<DateTime<Utc>>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 60_000.0,
            start_time: None,
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Pin the first timestamp instead of counting back from now
    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn base_price(&self) -> f64 {
        self.base_price
    }

    /// Generate samples for a specific market scenario
    ///
    /// # Arguments
    /// * `scenario` - The market scenario to simulate
    /// * `num_samples` - Number of samples (300+ lets the long-term trend filter engage)
    /// * `interval_minutes` - Minutes between samples
    pub fn generate(
        &mut self,
        scenario: MarketScenario,
        num_samples: usize,
        interval_minutes: i64,
    ) -> Vec<PriceSample> {
        let start_time = self
            .start_time
            .unwrap_or_else(|| Utc::now() - Duration::minutes(num_samples as i64 * interval_minutes));

        let prices = match scenario {
            MarketScenario::Uptrend => self.trending_prices(num_samples, interval_minutes, 0.02),
            MarketScenario::Downtrend => self.trending_prices(num_samples, interval_minutes, -0.02),
            MarketScenario::Sideways => self.sideways_prices(num_samples),
            MarketScenario::Volatile => self.volatile_prices(num_samples),
            MarketScenario::FlashCrash => self.flash_crash_prices(num_samples),
        };

        prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| {
                PriceSample::new(start_time + Duration::minutes(i as i64 * interval_minutes), price)
            })
            .collect()
    }

    /// Drift of `daily_drift` per day plus ±0.1% noise
    fn trending_prices(&mut self, num_samples: usize, interval_minutes: i64, daily_drift: f64) -> Vec<f64> {
        let mut prices = Vec::with_capacity(num_samples);
        let mut current_price = self.base_price;
        let drift_per_interval = daily_drift / (24.0 * 60.0 / interval_minutes as f64);

        for _ in 0..num_samples {
            let drift = current_price * drift_per_interval;
            let noise = current_price * self.rng.gen_range(-0.001..0.001);
            current_price += drift + noise;
            prices.push(current_price);
        }

        prices
    }

    /// Mean-reverting random walk
    fn sideways_prices(&mut self, num_samples: usize) -> Vec<f64> {
        let mut prices = Vec::with_capacity(num_samples);
        let mut current_price = self.base_price;
        let mean_price = self.base_price;

        for _ in 0..num_samples {
            let reversion = (mean_price - current_price) * 0.1; // 10% pull to mean
            let noise = current_price * self.rng.gen_range(-0.01..0.01);
            current_price += reversion + noise;
            prices.push(current_price);
        }

        prices
    }

    fn volatile_prices(&mut self, num_samples: usize) -> Vec<f64> {
        let mut prices = Vec::with_capacity(num_samples);
        let mut current_price = self.base_price;

        for _ in 0..num_samples {
            let change = current_price * self.rng.gen_range(-0.05..0.05);
            current_price = (current_price + change).max(self.base_price * 0.5);
            prices.push(current_price);
        }

        prices
    }

    /// Slow climb, a 10% single-sample drop at two thirds, then partial recovery
    fn flash_crash_prices(&mut self, num_samples: usize) -> Vec<f64> {
        let mut prices = Vec::with_capacity(num_samples);
        let mut current_price = self.base_price;
        let crash_index = num_samples * 2 / 3;

        for i in 0..num_samples {
            if i == crash_index {
                current_price *= 0.90;
            } else if i < crash_index {
                let change = current_price * self.rng.gen_range(-0.003..0.004);
                current_price += change;
            } else {
                let change = current_price * self.rng.gen_range(-0.003..0.005);
                current_price += change;
            }
            prices.push(current_price);
        }

        prices
    }
}

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// Confidence adjustment by time of day
///
/// During the configured UTC hours weaker signals are damped; outside them
/// stronger signals get a small capped boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketHoursPolicy {
    pub high_volatility_hours: Vec<u32>,
    pub dampen_below: f64,
    pub dampen_factor: f64,
    pub boost_above: f64,
    pub boost_factor: f64,
    pub boost_cap: f64,
}

impl Default for MarketHoursPolicy {
    fn default() -> Self {
        Self {
            high_volatility_hours: vec![13, 14, 15, 16], // US session open
            dampen_below: 0.75,
            dampen_factor: 0.8,
            boost_above: 0.6,
            boost_factor: 1.1,
            boost_cap: 0.9,
        }
    }
}

impl MarketHoursPolicy {
    pub fn is_high_volatility(&self, now: DateTime<Utc>) -> bool {
        self.high_volatility_hours.contains(&now.hour())
    }

    pub fn adjust(&self, confidence: f64, now: DateTime<Utc>) -> f64 {
        if self.is_high_volatility(now) {
            if confidence < self.dampen_below {
                return confidence * self.dampen_factor;
            }
        } else if confidence > self.boost_above {
            return (confidence * self.boost_factor).min(self.boost_cap);
        }
        confidence
    }
}

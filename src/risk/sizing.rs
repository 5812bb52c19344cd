use serde::{Deserialize, Serialize};

/// Confidence-weighted position sizing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizingConfig {
    /// Fraction of available balance committed at confidence 1.0
    pub base_fraction: f64,
    /// Hard cap on a single trade as a fraction of balance
    pub max_fraction: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            base_fraction: 0.10,
            max_fraction: 0.20,
        }
    }
}

/// Base-asset quantity to buy with `balance` of quote currency
pub fn position_size(balance: f64, price: f64, confidence: f64, config: &SizingConfig) -> f64 {
    if balance <= 0.0 || price <= 0.0 || !price.is_finite() {
        return 0.0;
    }

    let adjusted = balance * config.base_fraction * confidence.clamp(0.0, 1.0);
    let capped = adjusted.min(balance * config.max_fraction);

    capped / price
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_sizing() {
        let config = SizingConfig::default();

        // 10000 * 10% * 0.8 = 800 -> 8 units at 100
        let qty = position_size(10000.0, 100.0, 0.8, &config);
        assert!((qty - 8.0).abs() < 1e-12);

        // Price = 50, same value -> 16 units
        let qty = position_size(10000.0, 50.0, 0.8, &config);
        assert!((qty - 16.0).abs() < 1e-12);
    }

    #[test]
    fn test_sizing_capped() {
        let config = SizingConfig {
            base_fraction: 0.5,
            max_fraction: 0.2,
        };
        let qty = position_size(10000.0, 100.0, 1.0, &config);
        assert!((qty - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_sizing_degenerate_inputs() {
        let config = SizingConfig::default();
        assert_eq!(position_size(0.0, 100.0, 0.8, &config), 0.0);
        assert_eq!(position_size(10000.0, 0.0, 0.8, &config), 0.0);
        assert_eq!(position_size(10000.0, f64::NAN, 0.8, &config), 0.0);
    }
}

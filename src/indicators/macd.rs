use super::moving_average::calculate_ema_series;

/// MACD line, signal line and histogram aligned with the input prices
///
/// A point is `None` until every EMA feeding it has warmed up.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

impl MacdSeries {
    pub fn len(&self) -> usize {
        self.macd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.macd.is_empty()
    }
}

/// Calculate MACD from closes
///
/// `macd = ema(fast) - ema(slow)` where both are defined. The signal line is
/// the EMA of the defined MACD values only, left-padded back to full length.
pub fn calculate_macd(
    prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdSeries {
    let fast = calculate_ema_series(prices, fast_period);
    let slow = calculate_ema_series(prices, slow_period);

    let macd: Vec<Option<f64>> = fast
        .iter()
        .zip(slow.iter())
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(f - s),
            _ => None,
        })
        .collect();

    let defined: Vec<f64> = macd.iter().filter_map(|v| *v).collect();
    let signal_tail = calculate_ema_series(&defined, signal_period);

    let mut signal = vec![None; macd.len() - signal_tail.len()];
    signal.extend(signal_tail);

    let histogram = macd
        .iter()
        .zip(signal.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    MacdSeries {
        macd,
        signal,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_prices(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 * 0.5).collect()
    }

    #[test]
    fn test_macd_lengths_match_input() {
        let prices = trending_prices(50);
        let series = calculate_macd(&prices, 12, 26, 9);

        assert_eq!(series.len(), 50);
        assert_eq!(series.signal.len(), 50);
        assert_eq!(series.histogram.len(), 50);
    }

    #[test]
    fn test_macd_warmup_boundaries() {
        let prices = trending_prices(50);
        let series = calculate_macd(&prices, 12, 26, 9);

        // MACD needs the slow EMA: first defined at index 25
        assert!(series.macd[24].is_none());
        assert!(series.macd[25].is_some());

        // Signal needs 9 MACD values: first defined at index 33
        assert!(series.signal[32].is_none());
        assert!(series.signal[33].is_some());
        assert!(series.histogram[32].is_none());
        assert!(series.histogram[33].is_some());
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let prices = trending_prices(60);
        let series = calculate_macd(&prices, 12, 26, 9);

        let last = series.macd.last().copied().flatten().unwrap();
        assert!(last > 0.0, "fast EMA should lead slow EMA in an uptrend");
    }

    #[test]
    fn test_macd_histogram_is_difference() {
        let prices: Vec<f64> = (0..45)
            .map(|i| 100.0 + (i as f64 * 0.4).sin() * 3.0)
            .collect();
        let series = calculate_macd(&prices, 12, 26, 9);

        for i in 0..series.len() {
            if let (Some(m), Some(s), Some(h)) =
                (series.macd[i], series.signal[i], series.histogram[i])
            {
                assert!((h - (m - s)).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_macd_short_input_all_undefined() {
        let series = calculate_macd(&trending_prices(20), 12, 26, 9);
        assert!(series.macd.iter().all(Option::is_none));
        assert!(series.signal.iter().all(Option::is_none));
        assert!(series.histogram.iter().all(Option::is_none));
    }
}

// Technical indicators module
// EMA/MACD for signals, average absolute return for volatility regimes

pub mod macd;
pub mod moving_average;
pub mod volatility;

pub use macd::{calculate_macd, MacdSeries};
pub use moving_average::{calculate_ema, calculate_ema_series, calculate_sma};
pub use volatility::{average_absolute_return, VolatilityRegime};

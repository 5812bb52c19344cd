// Trading strategy module
pub mod engine;
pub mod market_hours;
pub mod signals;

pub use engine::{EngineConfig, SignalEngine};
pub use market_hours::MarketHoursPolicy;
pub use signals::{MacdConfig, MacdSnapshot};

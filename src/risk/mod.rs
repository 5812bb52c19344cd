// Risk management module
pub mod cooldown;
pub mod flash_crash;
pub mod parameters;
pub mod session;
pub mod sizing;

pub use cooldown::CooldownGate;
pub use flash_crash::{FlashCrashGuard, FlashCrashVeto};
pub use parameters::{RiskParameters, VolatilityConfig};
pub use session::{SessionAlert, SessionGuard, SessionLimits, SessionTrip};
pub use sizing::{position_size, SizingConfig};

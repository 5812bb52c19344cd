// Position state, simulated fills and restart recovery
pub mod paper;
pub mod position;
pub mod recovery;

pub use paper::{PaperAccount, PaperConfig};
pub use position::{OpenPosition, Position, RiskExit};
pub use recovery::{recover, RecoveredState};

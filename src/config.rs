use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::execution::PaperConfig;
use crate::risk::SessionLimits;
use crate::strategy::EngineConfig;
use crate::Result;

/// Default location of the settings file, without extension
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Everything the binary needs to run one pair
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub paper: PaperConfig,
    pub session: SessionLimits,
}

/// Load settings with layered sources:
/// 1. Built-in defaults
/// 2. Optional settings file at `path` (TOML, YAML or JSON by extension)
/// 3. `MACDBOT_` environment variables, `__` between levels
///    (e.g. `MACDBOT_ENGINE__MACD__FAST_PERIOD=8`)
pub fn load_settings(path: &str) -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("MACDBOT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = settings.try_deserialize()?;

    tracing::debug!("Loaded settings for {}", settings.engine.symbol);
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = load_settings("does/not/exist/settings").unwrap();

        assert_eq!(settings.engine.macd.fast_period, 12);
        assert_eq!(settings.engine.macd.slow_period, 26);
        assert_eq!(settings.engine.risk.stop_loss_pct, 0.03);
        assert_eq!(settings.engine.flash_crash_threshold, 0.07);
        assert_eq!(settings.paper.commission_rate, 0.001);
        assert_eq!(settings.session.daily_trade_limit, 20);
    }

    #[test]
    fn test_partial_file_overrides() {
        let path = std::env::temp_dir().join(format!("macdbot-settings-{}.toml", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[engine]
symbol = "ETH/USD"

[engine.macd]
fast_period = 8

[engine.risk]
min_trade_interval_seconds = 600
"#
        )
        .unwrap();

        let settings = load_settings(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(settings.engine.symbol, "ETH/USD");
        assert_eq!(settings.engine.macd.fast_period, 8);
        // Untouched fields keep their defaults
        assert_eq!(settings.engine.macd.slow_period, 26);
        assert_eq!(settings.engine.risk.min_trade_interval_seconds, 600);
        assert_eq!(settings.engine.risk.stop_loss_pct, 0.03);
    }
}

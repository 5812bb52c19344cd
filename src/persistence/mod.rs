use std::path::{Path, PathBuf};

use crate::models::TradeRecord;
use crate::Result;

/// JSON trade history on disk
///
/// The file holds a single array of `TradeRecord`s, oldest first. It is the
/// authoritative history used to rebuild engine state after a restart.
pub struct TradeJournal {
    path: PathBuf,
}

impl TradeJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all trades; a missing file is an empty history
    pub fn load(&self) -> Result<Vec<TradeRecord>> {
        if !self.path.exists() {
            tracing::info!("No trade journal at {}, starting empty", self.path.display());
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let trades: Vec<TradeRecord> = serde_json::from_str(&content)?;
        tracing::info!("Loaded {} trades from {}", trades.len(), self.path.display());
        Ok(trades)
    }

    /// Append one trade and rewrite the file
    pub fn append(&self, trade: &TradeRecord) -> Result<()> {
        let mut trades = self.load()?;
        trades.push(trade.clone());
        self.save(&trades)
    }

    pub fn save(&self, trades: &[TradeRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(trades)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Rejects a cycle when the price jumped too far since the previous tick
#[derive(Debug, Clone)]
pub struct FlashCrashGuard {
    threshold_pct: f64,
    last_price: Option<f64>,
}

/// Details of a vetoed tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlashCrashVeto {
    pub previous_price: f64,
    pub current_price: f64,
    pub change_pct: f64,
}

impl FlashCrashGuard {
    pub fn new(threshold_pct: f64) -> Self {
        Self {
            threshold_pct,
            last_price: None,
        }
    }

    pub fn last_price(&self) -> Option<f64> {
        self.last_price
    }

    /// Compare `price` against the previous tick and remember it
    ///
    /// Memory is updated on both outcomes so the next tick compares against
    /// this one.
    pub fn check(&mut self, price: f64) -> Result<(), FlashCrashVeto> {
        let previous = self.last_price.replace(price);

        match previous {
            Some(prev) if prev > 0.0 => {
                let change_pct = (price - prev) / prev;
                if change_pct.abs() > self.threshold_pct {
                    return Err(FlashCrashVeto {
                        previous_price: prev,
                        current_price: price,
                        change_pct,
                    });
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

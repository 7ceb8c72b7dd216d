//! Cooldown — closed bars to wait after a fill before the next entry.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CooldownState {
    bars_remaining: u32,
}

impl CooldownState {
    pub fn bars_remaining(&self) -> u32 {
        self.bars_remaining
    }

    pub fn is_active(&self) -> bool {
        self.bars_remaining > 0
    }

    /// Called exactly once per new closed bar; floored at zero.
    pub fn on_new_bar(&mut self) {
        self.bars_remaining = self.bars_remaining.saturating_sub(1);
    }

    pub fn arm(&mut self, bars: u32) {
        self.bars_remaining = bars;
    }
}

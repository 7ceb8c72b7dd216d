//! ReentryBlocker — after a close, no new entry until the indicator passes
//! through the pivot to the other side.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotSide {
    Above,
    Below,
}

impl PivotSide {
    /// Strict side of `pivot`; `None` when the value sits exactly on it.
    pub fn of(value: f64, pivot: f64) -> Option<Self> {
        if value > pivot {
            Some(PivotSide::Above)
        } else if value < pivot {
            Some(PivotSide::Below)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReentryBlock {
    blocked: bool,
    side: Option<PivotSide>,
}

impl ReentryBlock {
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    pub fn side(&self) -> Option<PivotSide> {
        self.side
    }

    /// Block re-entry, remembering which side of the pivot the close happened on.
    pub fn block(&mut self, value: f64, pivot: f64) {
        self.blocked = true;
        self.side = PivotSide::of(value, pivot);
    }

    /// Feed a reading. Clears the block when the reading is strictly on the
    /// opposite side from the recorded one; a close recorded exactly on the
    /// pivot clears at the first reading strictly off it. Returns true when
    /// this reading cleared the block.
    pub fn observe(&mut self, value: f64, pivot: f64) -> bool {
        if !self.blocked || value.is_nan() {
            return false;
        }
        let now = PivotSide::of(value, pivot);
        let cleared = match (self.side, now) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(recorded), Some(now)) => recorded != now,
        };
        if cleared {
            self.blocked = false;
            self.side = None;
        }
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_does_not_clear_pass_through_does() {
        let mut block = ReentryBlock::default();
        block.block(48.0, 50.0);
        assert_eq!(block.side(), Some(PivotSide::Below));

        assert!(!block.observe(49.9, 50.0));
        assert!(!block.observe(50.0, 50.0));
        assert!(block.is_blocked());

        assert!(block.observe(50.1, 50.0));
        assert!(!block.is_blocked());
    }

    #[test]
    fn above_clears_only_below() {
        let mut block = ReentryBlock::default();
        block.block(57.0, 50.0);
        assert!(!block.observe(65.0, 50.0));
        assert!(block.observe(49.0, 50.0));
    }

    #[test]
    fn close_on_pivot_clears_when_leaving_it() {
        let mut block = ReentryBlock::default();
        block.block(50.0, 50.0);
        assert_eq!(block.side(), None);
        assert!(!block.observe(50.0, 50.0));
        assert!(block.observe(50.5, 50.0));
    }

    #[test]
    fn unblocked_ignores_readings() {
        let mut block = ReentryBlock::default();
        assert!(!block.observe(10.0, 50.0));
        assert!(!block.is_blocked());
    }
}

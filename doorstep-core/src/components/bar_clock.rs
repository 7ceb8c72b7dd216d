//! BarClock — new-bar detection by bar id.
//!
//! A bar is new when its id is greater than the last id seen. Ids that repeat
//! (intra-bar polling) or go backwards (stale data) are not new bars.

use serde::{Deserialize, Serialize};

use crate::domain::BarId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BarClock {
    last_bar_id: Option<BarId>,
}

impl BarClock {
    /// Record `bar_id` and report whether it starts a new bar. The first
    /// observation always does.
    pub fn observe(&mut self, bar_id: BarId) -> bool {
        match self.last_bar_id {
            Some(last) if bar_id <= last => false,
            _ => {
                self.last_bar_id = Some(bar_id);
                true
            }
        }
    }

    pub fn last_bar_id(&self) -> Option<BarId> {
        self.last_bar_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_is_new() {
        let mut clock = BarClock::default();
        assert!(clock.observe(1_000));
        assert_eq!(clock.last_bar_id(), Some(1_000));
    }

    #[test]
    fn repeated_id_is_not_new() {
        let mut clock = BarClock::default();
        clock.observe(1_000);
        assert!(!clock.observe(1_000));
        assert!(clock.observe(2_000));
    }

    #[test]
    fn stale_id_is_ignored() {
        let mut clock = BarClock::default();
        clock.observe(2_000);
        assert!(!clock.observe(1_000));
        assert_eq!(clock.last_bar_id(), Some(2_000));
    }
}

//! Signal models — decide when a side may be entered and when an open
//! position has an opposite-signal exit.
//!
//! Models are stateless and portfolio-agnostic: per-symbol arming state lives
//! in `SignalState`, which the engine owns and hands in each cycle. A model
//! never sees cooldowns, reentry blocks or the position itself; those guards
//! belong to the engine.

pub mod crossover;
pub mod ladder;
pub mod pivot;

pub use crossover::{CrossExit, Crossover, CrossoverConfig, ZoneGate, ZoneMode};
pub use ladder::{LadderConfig, LadderDoorstep};
pub use pivot::{PivotBreakout, PivotConfig};

use serde::{Deserialize, Serialize};

use super::tracker::{ArmState, LevelTracker};
use super::trigger::EntryCandidates;
use crate::domain::{MarketSnapshot, Side};

/// Per-symbol arming state. `long` is the trough-side tracker feeding LONG
/// entries, `short` the peak-side tracker feeding SHORT entries. Models that
/// do not arm leave both `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignalState {
    pub long: Option<LevelTracker>,
    pub short: Option<LevelTracker>,
}

impl SignalState {
    pub fn tracker(&self, side: Side) -> Option<&LevelTracker> {
        match side {
            Side::Long => self.long.as_ref(),
            Side::Short => self.short.as_ref(),
        }
    }

    pub fn tracker_mut(&mut self, side: Side) -> Option<&mut LevelTracker> {
        match side {
            Side::Long => self.long.as_mut(),
            Side::Short => self.short.as_mut(),
        }
    }

    /// Arm state for `side`; disarmed when the model keeps no tracker.
    pub fn arm_state(&self, side: Side) -> ArmState {
        self.tracker(side)
            .map(LevelTracker::arm_state)
            .unwrap_or_default()
    }

    /// Reset the tracker feeding `side` entries, if any.
    pub fn consume(&mut self, side: Side) {
        if let Some(t) = self.tracker_mut(side) {
            t.consume();
        }
    }

    /// Feed `value` to every tracker.
    pub fn observe(&mut self, value: f64) {
        for tracker in [self.long.as_mut(), self.short.as_mut()].into_iter().flatten() {
            tracker.on_reading(value);
        }
    }
}

/// Trait for signal models.
///
/// # Architecture invariant
/// Every method takes the arming state and the current snapshot only; the
/// engine applies position, cooldown and reentry guards around these calls.
pub trait SignalModel: Send + Sync {
    /// Human-readable name (e.g., "ladder_doorstep").
    fn name(&self) -> &str;

    /// Neutral state for a fresh symbol.
    fn initial_state(&self) -> SignalState;

    /// Advance arming state with this cycle's reading.
    fn observe(&self, state: &mut SignalState, snapshot: &MarketSnapshot);

    /// Sides whose entry condition holds this cycle.
    fn entry_candidates(&self, state: &SignalState, snapshot: &MarketSnapshot) -> EntryCandidates;

    /// Called once after a position on `side` is opened.
    fn on_entry(&self, state: &mut SignalState, side: Side, _snapshot: &MarketSnapshot) {
        state.consume(side);
    }

    /// Opposite-signal exit condition for an open `side` position.
    fn opposite_exit(&self, state: &SignalState, side: Side, snapshot: &MarketSnapshot) -> bool;

    /// After an opposite-signal close of `closed`, may the other side be
    /// entered on the same cycle?
    fn reversal_ready(&self, state: &SignalState, closed: Side, snapshot: &MarketSnapshot) -> bool {
        self.entry_candidates(state, snapshot)
            .allows(closed.opposite())
    }

    /// Called once after a `closed` position is exited. With
    /// `consume_opposite`, the tracker that could have produced the exit
    /// signal is reset so it cannot immediately re-trigger.
    fn on_close(&self, state: &mut SignalState, closed: Side, consume_opposite: bool) {
        if consume_opposite {
            state.consume(closed.opposite());
        }
    }

    /// Is `value` in the zone that favours an open `side` position?
    fn in_favour_zone(&self, _side: Side, _value: f64) -> bool {
        false
    }

    /// Neutral pivot level, for models built around one.
    fn pivot(&self) -> Option<f64> {
        None
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};

    use crate::domain::{IndicatorReading, MarketSnapshot};

    pub fn snap(bar_id: i64, value: f64) -> MarketSnapshot {
        MarketSnapshot {
            bar_id,
            time: Utc.timestamp_millis_opt(bar_id * 60_000).unwrap(),
            price: 100.0,
            reading: IndicatorReading::Single(value),
            prev_reading: None,
        }
    }

    pub fn pair_snap(prev: (f64, f64), now: (f64, f64)) -> MarketSnapshot {
        MarketSnapshot {
            bar_id: 1,
            time: Utc.timestamp_millis_opt(60_000).unwrap(),
            price: 100.0,
            reading: IndicatorReading::Pair {
                fast: now.0,
                slow: now.1,
            },
            prev_reading: Some(IndicatorReading::Pair {
                fast: prev.0,
                slow: prev.1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::ratchet::Direction;
    use crate::components::tracker::TrackerMode;

    #[test]
    fn empty_state_is_disarmed() {
        let s = SignalState::default();
        assert_eq!(s.arm_state(Side::Long), ArmState::default());
        assert_eq!(s.arm_state(Side::Short), ArmState::default());
    }

    #[test]
    fn observe_and_consume_route_by_side() {
        let mut s = SignalState {
            long: Some(LevelTracker::new(Direction::Trough, 28.0, TrackerMode::Continuous).unwrap()),
            short: Some(LevelTracker::new(Direction::Peak, 72.0, TrackerMode::Continuous).unwrap()),
        };
        s.observe(75.0);
        assert!(s.arm_state(Side::Short).armed);
        assert!(!s.arm_state(Side::Long).armed);
        s.consume(Side::Short);
        assert!(!s.arm_state(Side::Short).armed);
    }
}

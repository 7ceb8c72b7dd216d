//! Ladder doorstep — RSI peak/trough ladders with a doorstep retrace entry.
//!
//! A reading at or beyond `short_switch` arms the peak tracker; while armed
//! the tracker keeps the most extreme ladder band reached. SHORT fires once
//! the reading falls `doorstep` back from that band. LONG mirrors this on the
//! trough side.
//!
//! While in a position the opposite tracker doubles as the exit ladder: a
//! LONG closes (XC) when the peak tracker's trigger fires, using
//! `close_doorstep` when set.

use serde::{Deserialize, Serialize};

use super::{SignalModel, SignalState};
use crate::components::factory::ModelError;
use crate::components::ratchet::Direction;
use crate::components::tracker::{LevelTracker, TrackerMode};
use crate::components::trigger::{EntryCandidates, EntryShape, EntryTrigger};
use crate::domain::{MarketSnapshot, Side};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LadderConfig {
    pub short_switch: f64,
    pub long_switch: f64,
    pub peak_ladder: Vec<f64>,
    pub trough_ladder: Vec<f64>,
    /// Track the raw running max/min instead of snapping to ladder bands.
    pub continuous: bool,
    pub doorstep: f64,
    pub entry: EntryShape,
    /// Doorstep for the exit ladder; defaults to `doorstep`.
    pub close_doorstep: Option<f64>,
    /// Close early once the reading comes within this distance of the
    /// opposite switch.
    pub exit_margin: Option<f64>,
}

impl Default for LadderConfig {
    fn default() -> Self {
        Self {
            short_switch: 72.0,
            long_switch: 28.0,
            peak_ladder: vec![84.0, 80.0, 75.0, 70.0],
            trough_ladder: vec![20.0, 25.0, 27.0, 30.0],
            continuous: false,
            doorstep: 3.0,
            entry: EntryShape::default(),
            close_doorstep: None,
            exit_margin: None,
        }
    }
}

impl LadderConfig {
    fn tracker(&self, direction: Direction) -> Result<LevelTracker, ModelError> {
        let (switch, ladder) = match direction {
            Direction::Peak => (self.short_switch, &self.peak_ladder),
            Direction::Trough => (self.long_switch, &self.trough_ladder),
        };
        let mode = if self.continuous {
            TrackerMode::Continuous
        } else {
            TrackerMode::Ladder {
                levels: ladder.clone(),
            }
        };
        LevelTracker::new(direction, switch, mode)
    }
}

#[derive(Debug, Clone)]
pub struct LadderDoorstep {
    config: LadderConfig,
    entry: EntryTrigger,
    close: EntryTrigger,
}

impl LadderDoorstep {
    pub fn new(config: LadderConfig) -> Result<Self, ModelError> {
        if config.long_switch >= config.short_switch {
            return Err(ModelError::InvalidParam {
                name: "long_switch".into(),
                reason: format!(
                    "must be below short_switch ({} >= {})",
                    config.long_switch, config.short_switch
                ),
            });
        }
        // Surface ladder errors at build time.
        config.tracker(Direction::Peak)?;
        config.tracker(Direction::Trough)?;

        let entry = EntryTrigger::new(config.doorstep, config.entry)?;
        let close = EntryTrigger::new(
            config.close_doorstep.unwrap_or(config.doorstep),
            EntryShape::default(),
        )?;
        if let Some(m) = config.exit_margin {
            if !m.is_finite() || m < 0.0 {
                return Err(ModelError::InvalidParam {
                    name: "exit_margin".into(),
                    reason: format!("must be a finite value >= 0, got {m}"),
                });
            }
        }
        Ok(Self {
            config,
            entry,
            close,
        })
    }

    pub fn config(&self) -> &LadderConfig {
        &self.config
    }
}

/// Tracker direction whose trigger opens `side`.
fn feeding(side: Side) -> Direction {
    match side {
        Side::Long => Direction::Trough,
        Side::Short => Direction::Peak,
    }
}

impl SignalModel for LadderDoorstep {
    fn name(&self) -> &str {
        "ladder_doorstep"
    }

    fn initial_state(&self) -> SignalState {
        // Validated in `new`.
        SignalState {
            long: self.config.tracker(Direction::Trough).ok(),
            short: self.config.tracker(Direction::Peak).ok(),
        }
    }

    fn observe(&self, state: &mut SignalState, snapshot: &MarketSnapshot) {
        state.observe(snapshot.reading.primary());
    }

    fn entry_candidates(&self, state: &SignalState, snapshot: &MarketSnapshot) -> EntryCandidates {
        let value = snapshot.reading.primary();
        EntryCandidates {
            long: self
                .entry
                .fires(feeding(Side::Long), state.arm_state(Side::Long), value),
            short: self
                .entry
                .fires(feeding(Side::Short), state.arm_state(Side::Short), value),
        }
    }

    /// Both trackers restart after an entry; the next reading re-arms
    /// whichever switch it is still beyond.
    fn on_entry(&self, state: &mut SignalState, _side: Side, _snapshot: &MarketSnapshot) {
        state.consume(Side::Long);
        state.consume(Side::Short);
    }

    fn opposite_exit(&self, state: &SignalState, side: Side, snapshot: &MarketSnapshot) -> bool {
        let value = snapshot.reading.primary();
        let other = side.opposite();
        if self
            .close
            .fires(feeding(other), state.arm_state(other), value)
        {
            return true;
        }
        match (self.config.exit_margin, side) {
            (Some(m), Side::Long) => value >= self.config.short_switch - m,
            (Some(m), Side::Short) => value <= self.config.long_switch + m,
            (None, _) => false,
        }
    }

    /// Reverse only while the other side is armed and the reading has come
    /// back inside its switch.
    fn reversal_ready(&self, state: &SignalState, closed: Side, snapshot: &MarketSnapshot) -> bool {
        let value = snapshot.reading.primary();
        let other = closed.opposite();
        state.arm_state(other).armed
            && match other {
                Side::Short => value < self.config.short_switch,
                Side::Long => value > self.config.long_switch,
            }
    }

    fn in_favour_zone(&self, side: Side, value: f64) -> bool {
        match side {
            Side::Long => value >= self.config.short_switch,
            Side::Short => value <= self.config.long_switch,
        }
    }
}

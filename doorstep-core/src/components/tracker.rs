//! LevelTracker — arm on a switch threshold, then capture the most extreme
//! indicator level seen until the arm is consumed.
//!
//! Two capture modes:
//! - `Ladder`: the extreme snaps to the most extreme band the reading
//!   qualifies for (≥84, ≥80, ≥75, ≥70 for peaks; ≤20, ≤25, ≤27, ≤30 for
//!   troughs).
//! - `Continuous`: the extreme is the raw running max/min.

use serde::{Deserialize, Serialize};

use super::factory::ModelError;
use super::ratchet::{Direction, Ratchet};

/// Observable arm state. `extreme_level` is only ever `Some` while `armed`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ArmState {
    pub armed: bool,
    pub extreme_level: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrackerMode {
    Ladder { levels: Vec<f64> },
    Continuous,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTracker {
    direction: Direction,
    switch: f64,
    mode: TrackerMode,
    armed: bool,
    extreme: Ratchet,
}

impl LevelTracker {
    /// Build a tracker; ladder levels may be given in any order but must be
    /// distinct and finite.
    pub fn new(direction: Direction, switch: f64, mode: TrackerMode) -> Result<Self, ModelError> {
        if !switch.is_finite() {
            return Err(ModelError::InvalidParam {
                name: "switch".into(),
                reason: format!("must be finite, got {switch}"),
            });
        }
        let mode = match mode {
            TrackerMode::Ladder { mut levels } => {
                if levels.is_empty() || levels.iter().any(|l| !l.is_finite()) {
                    return Err(ModelError::Ladder(format!("{levels:?}")));
                }
                levels.sort_by(|a, b| a.total_cmp(b));
                if levels.windows(2).any(|w| w[0] == w[1]) {
                    return Err(ModelError::Ladder(format!("{levels:?}")));
                }
                TrackerMode::Ladder { levels }
            }
            TrackerMode::Continuous => TrackerMode::Continuous,
        };
        Ok(Self {
            direction,
            switch,
            mode,
            armed: false,
            extreme: Ratchet::new(direction),
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn switch(&self) -> f64 {
        self.switch
    }

    pub fn arm_state(&self) -> ArmState {
        ArmState {
            armed: self.armed,
            extreme_level: if self.armed { self.extreme.level() } else { None },
        }
    }

    /// Feed one reading: arm when the switch is reached, then ratchet the
    /// extreme while armed. NaN readings leave the state untouched.
    pub fn on_reading(&mut self, value: f64) -> ArmState {
        if value.is_nan() {
            return self.arm_state();
        }
        if !self.armed && self.direction.reached(value, self.switch) {
            self.armed = true;
        }
        if self.armed {
            if let Some(level) = self.qualifying_level(value) {
                self.extreme.apply(level);
            }
        }
        self.arm_state()
    }

    /// Reset to `{armed: false, extreme_level: None}`.
    pub fn consume(&mut self) {
        self.armed = false;
        self.extreme.clear();
    }

    /// Most extreme band `value` qualifies for, or `value` itself when continuous.
    fn qualifying_level(&self, value: f64) -> Option<f64> {
        match &self.mode {
            TrackerMode::Continuous => Some(value),
            TrackerMode::Ladder { levels } => match self.direction {
                Direction::Peak => levels.iter().rev().find(|&&l| value >= l).copied(),
                Direction::Trough => levels.iter().find(|&&l| value <= l).copied(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_ladder() -> LevelTracker {
        LevelTracker::new(
            Direction::Peak,
            72.0,
            TrackerMode::Ladder {
                levels: vec![84.0, 80.0, 75.0, 70.0],
            },
        )
        .unwrap()
    }

    fn trough_ladder() -> LevelTracker {
        LevelTracker::new(
            Direction::Trough,
            28.0,
            TrackerMode::Ladder {
                levels: vec![20.0, 25.0, 27.0, 30.0],
            },
        )
        .unwrap()
    }

    #[test]
    fn stays_disarmed_below_switch() {
        let mut t = peak_ladder();
        let state = t.on_reading(71.9);
        assert_eq!(state, ArmState::default());
    }

    #[test]
    fn arms_and_snaps_to_band() {
        let mut t = peak_ladder();
        let state = t.on_reading(85.0);
        assert!(state.armed);
        assert_eq!(state.extreme_level, Some(84.0));
    }

    #[test]
    fn ladder_climbs_but_never_descends() {
        let mut t = peak_ladder();
        assert_eq!(t.on_reading(76.0).extreme_level, Some(75.0));
        assert_eq!(t.on_reading(81.0).extreme_level, Some(80.0));
        assert_eq!(t.on_reading(73.0).extreme_level, Some(80.0));
        assert_eq!(t.on_reading(50.0).extreme_level, Some(80.0));
        assert!(t.arm_state().armed);
    }

    #[test]
    fn trough_ladder_descends() {
        let mut t = trough_ladder();
        assert_eq!(t.on_reading(26.0).extreme_level, Some(27.0));
        assert_eq!(t.on_reading(19.0).extreme_level, Some(20.0));
        assert_eq!(t.on_reading(29.0).extreme_level, Some(20.0));
    }

    #[test]
    fn continuous_tracks_raw_extreme() {
        let mut t = LevelTracker::new(Direction::Trough, 30.0, TrackerMode::Continuous).unwrap();
        t.on_reading(29.0);
        t.on_reading(22.5);
        assert_eq!(t.on_reading(24.0).extreme_level, Some(22.5));
    }

    #[test]
    fn armed_without_band_has_no_extreme() {
        let mut t = LevelTracker::new(
            Direction::Peak,
            72.0,
            TrackerMode::Ladder {
                levels: vec![75.0, 80.0],
            },
        )
        .unwrap();
        let state = t.on_reading(73.0);
        assert!(state.armed);
        assert_eq!(state.extreme_level, None);
    }

    #[test]
    fn consume_resets() {
        let mut t = peak_ladder();
        t.on_reading(90.0);
        t.consume();
        assert_eq!(t.arm_state(), ArmState::default());
        // Re-arms only after the switch is reached again.
        assert_eq!(t.on_reading(71.0), ArmState::default());
    }

    #[test]
    fn rejects_duplicate_levels() {
        let err = LevelTracker::new(
            Direction::Peak,
            72.0,
            TrackerMode::Ladder {
                levels: vec![80.0, 80.0],
            },
        );
        assert!(matches!(err, Err(ModelError::Ladder(_))));
    }

    #[test]
    fn rejects_empty_ladder() {
        let err = LevelTracker::new(Direction::Trough, 28.0, TrackerMode::Ladder { levels: vec![] });
        assert!(err.is_err());
    }
}

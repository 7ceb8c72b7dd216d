//! EntryTrigger — has the reading retraced far enough from the captured
//! extreme to enter, and is entry permitted at all?
//!
//! A peak tracker feeds SHORT entries, a trough tracker LONG entries. The
//! trigger sits `doorstep` back toward neutral from the extreme:
//! `extreme - doorstep` for peaks, `extreme + doorstep` for troughs.

use serde::{Deserialize, Serialize};

use super::factory::ModelError;
use super::ratchet::Direction;
use super::tracker::ArmState;
use crate::domain::Side;

/// Trigger shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryShape {
    /// Fires once the reading has crossed past the trigger; with
    /// `entry_band`, only while still within that distance of it.
    OneSided {
        #[serde(default)]
        entry_band: Option<f64>,
    },
    /// Fires while the reading is inside `[trigger - band, trigger + band]`.
    BandReturn { band: f64 },
}

impl Default for EntryShape {
    fn default() -> Self {
        EntryShape::OneSided { entry_band: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntryTrigger {
    pub doorstep: f64,
    pub shape: EntryShape,
}

impl EntryTrigger {
    pub fn new(doorstep: f64, shape: EntryShape) -> Result<Self, ModelError> {
        non_negative("doorstep", doorstep)?;
        match shape {
            EntryShape::OneSided {
                entry_band: Some(band),
            } => non_negative("entry_band", band)?,
            EntryShape::BandReturn { band } => non_negative("band", band)?,
            EntryShape::OneSided { entry_band: None } => {}
        }
        Ok(Self { doorstep, shape })
    }

    pub fn trigger_level(&self, direction: Direction, extreme: f64) -> f64 {
        direction.retrace(extreme, self.doorstep)
    }

    /// True when an armed tracker with a captured extreme sees `value` at
    /// its trigger.
    ///
    /// ```
    /// use doorstep_core::components::{ArmState, Direction, EntryShape, EntryTrigger};
    ///
    /// let trigger = EntryTrigger::new(3.0, EntryShape::default()).unwrap();
    /// let arm = ArmState { armed: true, extreme_level: Some(80.0) };
    /// assert!(!trigger.fires(Direction::Peak, arm, 77.5));
    /// assert!(trigger.fires(Direction::Peak, arm, 77.0));
    /// ```
    pub fn fires(&self, direction: Direction, arm: ArmState, value: f64) -> bool {
        if !arm.armed || value.is_nan() {
            return false;
        }
        let Some(extreme) = arm.extreme_level else {
            return false;
        };
        let trigger = self.trigger_level(direction, extreme);
        match self.shape {
            EntryShape::OneSided { entry_band } => {
                direction.retraced(value, extreme, self.doorstep)
                    && entry_band.map_or(true, |band| (value - trigger).abs() <= band)
            }
            EntryShape::BandReturn { band } => (value - trigger).abs() <= band,
        }
    }
}

fn non_negative(name: &str, value: f64) -> Result<(), ModelError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ModelError::InvalidParam {
            name: name.to_string(),
            reason: format!("must be a finite value >= 0, got {value}"),
        });
    }
    Ok(())
}

/// Guard conditions that must all hold before any entry fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryGuards {
    pub flat: bool,
    pub cooldown_remaining: u32,
    pub reentry_blocked: bool,
    /// A position was closed earlier on this same bar.
    pub exited_this_bar: bool,
}

impl EntryGuards {
    pub fn permit(&self) -> bool {
        self.flat && self.cooldown_remaining == 0 && !self.reentry_blocked && !self.exited_this_bar
    }
}

/// Sides a symbol may open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowedSides {
    #[default]
    Both,
    LongOnly,
    ShortOnly,
}

impl AllowedSides {
    pub fn permits(self, side: Side) -> bool {
        match self {
            AllowedSides::Both => true,
            AllowedSides::LongOnly => side == Side::Long,
            AllowedSides::ShortOnly => side == Side::Short,
        }
    }
}

/// Which sides' entry conditions hold this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EntryCandidates {
    pub long: bool,
    pub short: bool,
}

impl EntryCandidates {
    pub fn only(side: Side) -> Self {
        match side {
            Side::Long => Self {
                long: true,
                short: false,
            },
            Side::Short => Self {
                long: false,
                short: true,
            },
        }
    }

    pub fn allows(&self, side: Side) -> bool {
        match side {
            Side::Long => self.long,
            Side::Short => self.short,
        }
    }

    /// Drop the sides `allowed` does not permit.
    pub fn restrict(self, allowed: AllowedSides) -> Self {
        Self {
            long: self.long && allowed.permits(Side::Long),
            short: self.short && allowed.permits(Side::Short),
        }
    }

    /// Pick at most one side. Both holding is resolved by `prefer_short_on_tie`.
    pub fn resolve(&self, prefer_short_on_tie: bool) -> Option<Side> {
        match (self.long, self.short) {
            (true, true) if prefer_short_on_tie => Some(Side::Short),
            (true, true) => Some(Side::Long),
            (true, false) => Some(Side::Long),
            (false, true) => Some(Side::Short),
            (false, false) => None,
        }
    }
}

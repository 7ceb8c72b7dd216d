//! Crossover — fast line crossing the slow line (EMA pair, stochastic %K/%D).
//!
//! Cross up → LONG, cross down → SHORT. The gap between the lines on the
//! previous bar must be at least `min_gap`. An optional zone gate restricts
//! entries to crosses near an extreme:
//! - `Instant`: the fast line must be inside the zone on the crossing bar.
//! - `Armed`: touching the zone arms that side; a later cross fires and
//!   consumes the arm.
//!
//! Zone levels are measured on the reading's primary value, so an EMA pair
//! fed together with stochastic %K crosses on the EMAs and arms on %K.
//!
//! An open position exits (XC) on the opposite cross, on the fast line
//! reaching the opposite zone (a LONG at or above `overbought`, a SHORT at or
//! below `oversold`), or on either, per `CrossExit`.

use serde::{Deserialize, Serialize};

use super::{SignalModel, SignalState};
use crate::components::factory::ModelError;
use crate::components::ratchet::Direction;
use crate::components::tracker::{LevelTracker, TrackerMode};
use crate::components::trigger::EntryCandidates;
use crate::domain::{MarketSnapshot, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneMode {
    #[default]
    Instant,
    Armed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneGate {
    pub oversold: f64,
    pub overbought: f64,
    #[serde(default)]
    pub mode: ZoneMode,
}

/// What closes an open position with an opposite signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossExit {
    #[default]
    Cross,
    OppositeZone,
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverConfig {
    pub min_gap: f64,
    pub zone: Option<ZoneGate>,
    pub exit: CrossExit,
}

#[derive(Debug, Clone)]
pub struct Crossover {
    config: CrossoverConfig,
}

impl Crossover {
    pub fn new(config: CrossoverConfig) -> Result<Self, ModelError> {
        if !config.min_gap.is_finite() || config.min_gap < 0.0 {
            return Err(ModelError::InvalidParam {
                name: "min_gap".into(),
                reason: format!("must be a finite value >= 0, got {}", config.min_gap),
            });
        }
        if let Some(z) = config.zone {
            if !(z.oversold.is_finite() && z.overbought.is_finite()) || z.oversold >= z.overbought {
                return Err(ModelError::InvalidParam {
                    name: "zone".into(),
                    reason: format!(
                        "oversold ({}) must be below overbought ({})",
                        z.oversold, z.overbought
                    ),
                });
            }
        }
        if config.exit != CrossExit::Cross && config.zone.is_none() {
            return Err(ModelError::InvalidParam {
                name: "exit".into(),
                reason: "zone exits need a zone".into(),
            });
        }
        Ok(Self { config })
    }

    /// Direction of a fast/slow cross between the previous and current bar,
    /// with the previous-bar gap checked against `min_gap`.
    fn cross(snapshot: &MarketSnapshot, min_gap: f64) -> Option<Side> {
        let (fast, slow) = snapshot.reading.pair()?;
        let (pf, ps) = snapshot.prev_reading?.pair()?;
        let was_above = pf > ps;
        let is_above = fast > slow;
        match (was_above, is_above) {
            (false, true) if ps - pf >= min_gap => Some(Side::Long),
            (true, false) if pf - ps >= min_gap => Some(Side::Short),
            _ => None,
        }
    }

    fn in_zone(zone: &ZoneGate, side: Side, fast: f64) -> bool {
        match side {
            Side::Long => fast < zone.oversold,
            Side::Short => fast > zone.overbought,
        }
    }

    /// Has an open `side` position's reading reached the far zone?
    fn reached_far_zone(zone: &ZoneGate, side: Side, value: f64) -> bool {
        match side {
            Side::Long => value >= zone.overbought,
            Side::Short => value <= zone.oversold,
        }
    }
}

impl SignalModel for Crossover {
    fn name(&self) -> &str {
        "crossover"
    }

    fn initial_state(&self) -> SignalState {
        match self.config.zone {
            Some(z) if z.mode == ZoneMode::Armed => SignalState {
                long: LevelTracker::new(Direction::Trough, z.oversold, TrackerMode::Continuous).ok(),
                short: LevelTracker::new(Direction::Peak, z.overbought, TrackerMode::Continuous).ok(),
            },
            _ => SignalState::default(),
        }
    }

    fn observe(&self, state: &mut SignalState, snapshot: &MarketSnapshot) {
        state.observe(snapshot.reading.primary());
    }

    fn entry_candidates(&self, state: &SignalState, snapshot: &MarketSnapshot) -> EntryCandidates {
        let Some(side) = Self::cross(snapshot, self.config.min_gap) else {
            return EntryCandidates::default();
        };
        let gated = match self.config.zone {
            None => true,
            Some(z) => match z.mode {
                ZoneMode::Instant => Self::in_zone(&z, side, snapshot.reading.primary()),
                ZoneMode::Armed => state.arm_state(side).armed,
            },
        };
        if gated {
            EntryCandidates::only(side)
        } else {
            EntryCandidates::default()
        }
    }

    fn opposite_exit(&self, _state: &SignalState, side: Side, snapshot: &MarketSnapshot) -> bool {
        let crossed = || Self::cross(snapshot, 0.0) == Some(side.opposite());
        let far_zone = || {
            self.config
                .zone
                .is_some_and(|z| Self::reached_far_zone(&z, side, snapshot.reading.primary()))
        };
        match self.config.exit {
            CrossExit::Cross => crossed(),
            CrossExit::OppositeZone => far_zone(),
            CrossExit::Either => crossed() || far_zone(),
        }
    }

    fn in_favour_zone(&self, side: Side, value: f64) -> bool {
        self.config
            .zone
            .is_some_and(|z| Self::in_zone(&z, side.opposite(), value))
    }
}

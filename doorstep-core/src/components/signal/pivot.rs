//! Pivot breakout — enter once the indicator clears a neutral pivot by the
//! doorstep distance.
//!
//! LONG at `value >= pivot + doorstep`, SHORT at `value <= pivot - doorstep`.
//! No arming; the engine's reentry block keeps a closed position from being
//! re-entered until the reading passes through the pivot.

use serde::{Deserialize, Serialize};

use super::{SignalModel, SignalState};
use crate::components::factory::ModelError;
use crate::components::trigger::EntryCandidates;
use crate::domain::{MarketSnapshot, Side};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PivotConfig {
    pub pivot: f64,
    pub doorstep: f64,
}

impl Default for PivotConfig {
    fn default() -> Self {
        Self {
            pivot: 50.0,
            doorstep: 5.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PivotBreakout {
    config: PivotConfig,
}

impl PivotBreakout {
    pub fn new(config: PivotConfig) -> Result<Self, ModelError> {
        if !config.pivot.is_finite() {
            return Err(ModelError::InvalidParam {
                name: "pivot".into(),
                reason: format!("must be finite, got {}", config.pivot),
            });
        }
        if !config.doorstep.is_finite() || config.doorstep < 0.0 {
            return Err(ModelError::InvalidParam {
                name: "doorstep".into(),
                reason: format!("must be a finite value >= 0, got {}", config.doorstep),
            });
        }
        Ok(Self { config })
    }

    fn long_ready(&self, value: f64) -> bool {
        value >= self.config.pivot + self.config.doorstep
    }

    fn short_ready(&self, value: f64) -> bool {
        value <= self.config.pivot - self.config.doorstep
    }
}

impl SignalModel for PivotBreakout {
    fn name(&self) -> &str {
        "pivot_breakout"
    }

    fn initial_state(&self) -> SignalState {
        SignalState::default()
    }

    fn observe(&self, _state: &mut SignalState, _snapshot: &MarketSnapshot) {}

    fn entry_candidates(&self, _state: &SignalState, snapshot: &MarketSnapshot) -> EntryCandidates {
        let value = snapshot.reading.primary();
        EntryCandidates {
            long: self.long_ready(value),
            short: self.short_ready(value),
        }
    }

    fn opposite_exit(&self, _state: &SignalState, side: Side, snapshot: &MarketSnapshot) -> bool {
        let value = snapshot.reading.primary();
        match side {
            Side::Long => self.short_ready(value),
            Side::Short => self.long_ready(value),
        }
    }

    fn in_favour_zone(&self, side: Side, value: f64) -> bool {
        match side {
            Side::Long => self.long_ready(value),
            Side::Short => self.short_ready(value),
        }
    }

    fn pivot(&self) -> Option<f64> {
        Some(self.config.pivot)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::snap;
    use super::*;

    fn model() -> PivotBreakout {
        PivotBreakout::new(PivotConfig::default()).unwrap()
    }

    #[test]
    fn thresholds_are_inclusive() {
        let m = model();
        let state = m.initial_state();
        assert_eq!(
            m.entry_candidates(&state, &snap(0, 55.0)),
            EntryCandidates::only(Side::Long)
        );
        assert_eq!(
            m.entry_candidates(&state, &snap(0, 45.0)),
            EntryCandidates::only(Side::Short)
        );
        assert_eq!(
            m.entry_candidates(&state, &snap(0, 54.9)),
            EntryCandidates::default()
        );
    }

    #[test]
    fn opposite_exit_is_opposite_entry() {
        let m = model();
        let state = m.initial_state();
        assert!(m.opposite_exit(&state, Side::Long, &snap(0, 44.0)));
        assert!(!m.opposite_exit(&state, Side::Long, &snap(0, 46.0)));
        assert!(m.opposite_exit(&state, Side::Short, &snap(0, 56.0)));
    }

    #[test]
    fn exposes_pivot() {
        assert_eq!(model().pivot(), Some(50.0));
    }

    #[test]
    fn negative_doorstep_rejected() {
        assert!(PivotBreakout::new(PivotConfig {
            pivot: 50.0,
            doorstep: -1.0
        })
        .is_err());
    }
}

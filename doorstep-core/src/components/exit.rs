//! ExitEvaluator — decides at most one exit per cycle while a position is open.
//!
//! Priority, first match wins:
//! 1. Stop-loss (`roe <= -stop_loss_roe`, or the pivot stop of an un-armed
//!    indicator trail)
//! 2. Take-profit per `TakeProfitPolicy`
//! 3. Opposite-signal exit, as reported by the signal model
//!
//! Cooldown and re-entry blocks never produce exits; they only gate entries.

use serde::{Deserialize, Serialize};

use super::factory::ModelError;
use super::ratchet::{Direction, Ratchet};
use crate::domain::{ExitReason, Side};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TakeProfitPolicy {
    #[default]
    None,
    /// Close as soon as `roe >= roe`.
    Immediate { roe: f64 },
    /// Arm at `roe >= roe`, then trail the best ROE and close once it has
    /// given back `doorstep_close` points.
    Trailing { roe: f64, doorstep_close: f64 },
    /// Arm at `roe >= roe`, then hold only while the indicator stays in the
    /// extreme zone on the position's favourable side.
    IndicatorGated { roe: f64 },
    /// Pivot-anchored: arm once the indicator is `arm_distance` past the
    /// pivot in the position's favour, then trail the indicator extreme and
    /// close on a `close_band` retrace. Before arming, a return to the pivot
    /// stops the position out.
    IndicatorTrail { arm_distance: f64, close_band: f64 },
}

impl TakeProfitPolicy {
    pub fn name(&self) -> &'static str {
        match self {
            TakeProfitPolicy::None => "none",
            TakeProfitPolicy::Immediate { .. } => "immediate",
            TakeProfitPolicy::Trailing { .. } => "trailing",
            TakeProfitPolicy::IndicatorGated { .. } => "indicator_gated",
            TakeProfitPolicy::IndicatorTrail { .. } => "indicator_trail",
        }
    }

    pub fn needs_pivot(&self) -> bool {
        matches!(self, TakeProfitPolicy::IndicatorTrail { .. })
    }
}

/// Per-position take-profit progress. Reset on every entry and close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitState {
    armed: bool,
    extreme: Ratchet,
}

impl Default for TakeProfitState {
    fn default() -> Self {
        Self {
            armed: false,
            extreme: Ratchet::new(Direction::Peak),
        }
    }
}

impl TakeProfitState {
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Best ROE (trailing) or indicator extreme (indicator trail) since arming.
    pub fn extreme(&self) -> Option<f64> {
        self.extreme.level()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn arm_at(&mut self, direction: Direction, level: f64) {
        self.armed = true;
        self.extreme = Ratchet::with_initial_level(direction, level);
    }
}

/// What the evaluator sees for one open position in one cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitInputs {
    pub side: Side,
    /// Unrealized return on margin, percent.
    pub roe: f64,
    /// Primary indicator value.
    pub value: f64,
    pub opposite_signal: bool,
    /// Indicator is in the extreme zone that favours `side`.
    pub in_favour_zone: bool,
    pub pivot: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExitPolicy {
    #[serde(default)]
    pub stop_loss_roe: Option<f64>,
    #[serde(default)]
    pub take_profit: TakeProfitPolicy,
}

impl ExitPolicy {
    pub fn validate(&self) -> Result<(), ModelError> {
        if let Some(sl) = self.stop_loss_roe {
            positive("stop_loss_roe", sl)?;
        }
        match self.take_profit {
            TakeProfitPolicy::None => Ok(()),
            TakeProfitPolicy::Immediate { roe } | TakeProfitPolicy::IndicatorGated { roe } => {
                finite("take_profit.roe", roe)
            }
            TakeProfitPolicy::Trailing {
                roe,
                doorstep_close,
            } => {
                finite("take_profit.roe", roe)?;
                non_negative("take_profit.doorstep_close", doorstep_close)
            }
            TakeProfitPolicy::IndicatorTrail {
                arm_distance,
                close_band,
            } => {
                non_negative("take_profit.arm_distance", arm_distance)?;
                non_negative("take_profit.close_band", close_band)
            }
        }
    }

    /// Update take-profit progress with this cycle's inputs, then return the
    /// highest-priority exit that applies, if any.
    pub fn evaluate(&self, tp: &mut TakeProfitState, x: &ExitInputs) -> Option<ExitReason> {
        self.update_arm(tp, x);

        if self.stop_hit(tp, x) {
            return Some(ExitReason::StopLoss);
        }
        if self.take_profit_hit(tp, x) {
            return Some(ExitReason::TakeProfit);
        }
        if x.opposite_signal {
            return Some(ExitReason::OppositeSignal);
        }
        None
    }

    fn update_arm(&self, tp: &mut TakeProfitState, x: &ExitInputs) {
        match self.take_profit {
            TakeProfitPolicy::None | TakeProfitPolicy::Immediate { .. } => {}
            TakeProfitPolicy::Trailing { roe, .. } => {
                if tp.armed {
                    tp.extreme.apply(x.roe);
                } else if x.roe >= roe {
                    tp.arm_at(Direction::Peak, x.roe);
                }
            }
            TakeProfitPolicy::IndicatorGated { roe } => {
                if !tp.armed && x.roe >= roe {
                    tp.armed = true;
                }
            }
            TakeProfitPolicy::IndicatorTrail { arm_distance, .. } => {
                let Some(pivot) = x.pivot else { return };
                let direction = favour(x.side);
                if tp.armed {
                    tp.extreme.apply(x.value);
                } else if direction.reached(x.value, direction.retrace(pivot, -arm_distance)) {
                    tp.arm_at(direction, x.value);
                }
            }
        }
    }

    fn stop_hit(&self, tp: &TakeProfitState, x: &ExitInputs) -> bool {
        if let Some(sl) = self.stop_loss_roe {
            if x.roe <= -sl {
                return true;
            }
        }
        match (self.take_profit, x.pivot) {
            (TakeProfitPolicy::IndicatorTrail { .. }, Some(pivot)) if !tp.armed => {
                // Back at or through the pivot against the position.
                favour(x.side).retraced(x.value, pivot, 0.0)
            }
            _ => false,
        }
    }

    fn take_profit_hit(&self, tp: &TakeProfitState, x: &ExitInputs) -> bool {
        match self.take_profit {
            TakeProfitPolicy::None => false,
            TakeProfitPolicy::Immediate { roe } => x.roe >= roe,
            TakeProfitPolicy::Trailing { doorstep_close, .. } => match tp.extreme() {
                Some(peak) if tp.armed => peak - x.roe >= doorstep_close,
                _ => false,
            },
            TakeProfitPolicy::IndicatorGated { .. } => tp.armed && !x.in_favour_zone,
            TakeProfitPolicy::IndicatorTrail { close_band, .. } => match tp.extreme() {
                Some(extreme) if tp.armed => favour(x.side).retraced(x.value, extreme, close_band),
                _ => false,
            },
        }
    }
}

/// Indicator direction that favours a position: up for longs, down for shorts.
fn favour(side: Side) -> Direction {
    match side {
        Side::Long => Direction::Peak,
        Side::Short => Direction::Trough,
    }
}

fn finite(name: &str, value: f64) -> Result<(), ModelError> {
    if !value.is_finite() {
        return Err(invalid(name, value, "must be finite"));
    }
    Ok(())
}

fn positive(name: &str, value: f64) -> Result<(), ModelError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(name, value, "must be > 0"));
    }
    Ok(())
}

fn non_negative(name: &str, value: f64) -> Result<(), ModelError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(name, value, "must be >= 0"));
    }
    Ok(())
}

fn invalid(name: &str, value: f64, rule: &str) -> ModelError {
    ModelError::InvalidParam {
        name: name.to_string(),
        reason: format!("{rule}, got {value}"),
    }
}

//! Engine settings and the per-symbol state bundle.

use serde::{Deserialize, Serialize};

use crate::components::factory::ModelError;
use crate::components::{
    AllowedSides, BarClock, CooldownState, PositionManager, ReentryBlock, SignalModel, SignalState,
    TakeProfitState,
};
use crate::domain::{BarId, IndicatorReading, Position, PositionSide};

/// Knobs shared by every symbol an engine drives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub leverage: f64,
    /// Closed bars to wait after any fill before the next entry.
    pub cooldown_bars: u32,
    /// When both sides' entry conditions hold on one cycle, take SHORT.
    pub prefer_short_on_tie: bool,
    /// After an opposite-signal close, enter the other side on the same
    /// cycle when the model allows it.
    pub reverse_on_exit: bool,
    /// Reset the opposite tracker when a position closes.
    pub consume_opposite_on_close: bool,
    /// Permit a new entry on the bar that just closed a position.
    pub allow_same_bar_reentry: bool,
    /// Sides that may be opened, reversals included. Exits are unaffected.
    pub allowed_sides: AllowedSides,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            leverage: 10.0,
            cooldown_bars: 1,
            prefer_short_on_tie: true,
            reverse_on_exit: false,
            consume_opposite_on_close: true,
            allow_same_bar_reentry: false,
            allowed_sides: AllowedSides::Both,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.leverage.is_finite() || self.leverage < 1.0 {
            return Err(ModelError::InvalidParam {
                name: "leverage".into(),
                reason: format!("must be >= 1, got {}", self.leverage),
            });
        }
        Ok(())
    }
}

/// Everything the engine remembers about one symbol between cycles.
///
/// Touched only by `Engine::step` for that symbol. Persisting it across
/// restarts is left to the caller; a fresh state is neutral and flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolState {
    pub clock: BarClock,
    pub signal: SignalState,
    pub positions: PositionManager,
    pub cooldown: CooldownState,
    pub reentry: ReentryBlock,
    pub take_profit: TakeProfitState,
    pub last_exit_bar: Option<BarId>,
    pub last_reading: Option<IndicatorReading>,
}

impl SymbolState {
    pub fn new(model: &dyn SignalModel) -> Self {
        Self {
            clock: BarClock::default(),
            signal: model.initial_state(),
            positions: PositionManager::default(),
            cooldown: CooldownState::default(),
            reentry: ReentryBlock::default(),
            take_profit: TakeProfitState::default(),
            last_exit_bar: None,
            last_reading: None,
        }
    }

    /// Adopt a position that is already open at the exchange, e.g. after a
    /// restart. Take-profit tracking starts over.
    pub fn restore(&mut self, position: Position) {
        self.positions.restore(position);
        self.take_profit.reset();
    }

    pub fn position(&self) -> Option<&Position> {
        self.positions.position()
    }

    pub fn side(&self) -> PositionSide {
        self.positions.side()
    }
}

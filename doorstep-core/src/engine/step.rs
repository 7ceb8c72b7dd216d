//! One evaluation cycle for one symbol.
//!
//! Order per cycle: bar clock → cooldown tick → reentry observe → tracker
//! update → exit evaluation (in a position) or entry evaluation (flat).
//!
//! The cycle works on a draft of the symbol's state and commits it only after
//! the broker calls it depends on have succeeded, so a failing call leaves
//! the state exactly as it was.

use tracing::{debug, info, warn};

use crate::broker::{Broker, CollaboratorError, Feed, IndicatorSource};
use crate::components::factory::{build_model, ModelError, SignalConfig};
use crate::components::{EntryGuards, EntryOutcome, ExitInputs, ExitPolicy, SignalModel};
use crate::domain::{BarId, ExitReason, MarketSnapshot, Side, SymbolId, TradeRecord};
use crate::indicators::IndicatorSpec;

use super::state::{EngineSettings, SymbolState};

/// A cycle that could not be evaluated. The symbol's state is untouched.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CycleError {
    #[error("indicator source failed: {0}")]
    Source(CollaboratorError),
    #[error("broker call failed: {0}")]
    Broker(CollaboratorError),
    #[error("non-finite reading for {symbol} at bar {bar_id}")]
    InvalidReading { symbol: String, bar_id: BarId },
}

/// A state change made during one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Entered {
        side: Side,
        price: f64,
        quantity: f64,
        /// Entered on the cycle that closed the other side.
        reversal: bool,
    },
    Exited(TradeRecord),
    /// The broker could not fill the entry. Nothing changed.
    EntryAbandoned {
        side: Side,
        price: Option<f64>,
        quantity: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    pub bar_id: BarId,
    pub new_bar: bool,
    pub transitions: Vec<Transition>,
    /// A reversal entry that failed after its close was committed.
    pub deferred_error: Option<CycleError>,
}

impl CycleOutcome {
    fn new(bar_id: BarId, new_bar: bool) -> Self {
        Self {
            bar_id,
            new_bar,
            transitions: Vec::new(),
            deferred_error: None,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn exit(&self) -> Option<&TradeRecord> {
        self.transitions.iter().find_map(|t| match t {
            Transition::Exited(trade) => Some(trade),
            _ => None,
        })
    }

    pub fn entry_side(&self) -> Option<Side> {
        self.transitions.iter().find_map(|t| match t {
            Transition::Entered { side, .. } => Some(*side),
            _ => None,
        })
    }
}

/// The state machine: a signal model plus exit policy and settings.
/// Stateless between calls; all per-symbol memory is in `SymbolState`.
pub struct Engine {
    model: Box<dyn SignalModel>,
    exit: ExitPolicy,
    settings: EngineSettings,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("model", &self.model.name())
            .field("exit", &self.exit)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Engine {
    pub fn new(
        model: Box<dyn SignalModel>,
        exit: ExitPolicy,
        settings: EngineSettings,
    ) -> Result<Self, ModelError> {
        exit.validate()?;
        settings.validate()?;
        if exit.take_profit.needs_pivot() && model.pivot().is_none() {
            return Err(ModelError::PolicyMismatch {
                policy: exit.take_profit.name().to_string(),
                model: model.name().to_string(),
            });
        }
        Ok(Self {
            model,
            exit,
            settings,
        })
    }

    /// Build from configuration, checking the model against its feed.
    pub fn build(
        signal: &SignalConfig,
        exit: ExitPolicy,
        settings: EngineSettings,
        indicator: &IndicatorSpec,
    ) -> Result<Self, ModelError> {
        Self::new(build_model(signal, indicator)?, exit, settings)
    }

    pub fn new_state(&self) -> SymbolState {
        SymbolState::new(self.model.as_ref())
    }

    pub fn model(&self) -> &dyn SignalModel {
        self.model.as_ref()
    }

    pub fn exit_policy(&self) -> &ExitPolicy {
        &self.exit
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Fetch the latest snapshot for `symbol` and step it.
    pub fn poll(
        &self,
        symbol: &SymbolId,
        state: &mut SymbolState,
        feed: &Feed,
        source: &mut dyn IndicatorSource,
        broker: &mut dyn Broker,
    ) -> Result<CycleOutcome, CycleError> {
        let snapshot = source.snapshot(symbol, feed).map_err(CycleError::Source)?;
        self.step(symbol, state, &snapshot, broker)
    }

    /// Evaluate one cycle. On `Err`, `state` is unchanged.
    pub fn step(
        &self,
        symbol: &SymbolId,
        state: &mut SymbolState,
        snapshot: &MarketSnapshot,
        broker: &mut dyn Broker,
    ) -> Result<CycleOutcome, CycleError> {
        if !snapshot.reading.is_finite() || !snapshot.price.is_finite() {
            return Err(CycleError::InvalidReading {
                symbol: symbol.to_string(),
                bar_id: snapshot.bar_id,
            });
        }
        broker.observe_price(symbol, snapshot.price);

        let mut draft = state.clone();
        let new_bar = draft.clock.observe(snapshot.bar_id);
        if new_bar {
            draft.cooldown.on_new_bar();
        }
        let mut outcome = CycleOutcome::new(snapshot.bar_id, new_bar);

        let value = snapshot.reading.primary();
        if let Some(pivot) = self.model.pivot() {
            if draft.reentry.observe(value, pivot) {
                debug!(symbol = %symbol, value, "reentry block cleared");
            }
        }
        self.model.observe(&mut draft.signal, snapshot);
        draft.last_reading = Some(snapshot.reading);

        let open_side = draft.position().map(|p| p.side);
        match open_side {
            Some(side) => self.evaluate_exit(symbol, state, draft, side, snapshot, broker, &mut outcome)?,
            None => {
                self.evaluate_entry(symbol, &mut draft, snapshot, broker, &mut outcome)?;
                *state = draft;
            }
        }
        Ok(outcome)
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_exit(
        &self,
        symbol: &SymbolId,
        state: &mut SymbolState,
        mut draft: SymbolState,
        side: Side,
        snapshot: &MarketSnapshot,
        broker: &mut dyn Broker,
        outcome: &mut CycleOutcome,
    ) -> Result<(), CycleError> {
        let value = snapshot.reading.primary();
        let roe = broker.roe(symbol).map_err(CycleError::Broker)?;
        let inputs = ExitInputs {
            side,
            roe,
            value,
            opposite_signal: self.model.opposite_exit(&draft.signal, side, snapshot),
            in_favour_zone: self.model.in_favour_zone(side, value),
            pivot: self.model.pivot(),
        };
        let Some(reason) = self.exit.evaluate(&mut draft.take_profit, &inputs) else {
            *state = draft;
            return Ok(());
        };

        let reverse = self.settings.reverse_on_exit
            && reason == ExitReason::OppositeSignal
            && self.settings.allowed_sides.permits(side.opposite())
            && self.model.reversal_ready(&draft.signal, side, snapshot);

        let closed = draft
            .positions
            .close(
                broker,
                symbol,
                reason,
                snapshot,
                &mut draft.cooldown,
                self.settings.cooldown_bars,
            )
            .map_err(CycleError::Broker)?;
        let Some(trade) = closed else {
            *state = draft;
            return Ok(());
        };

        info!(
            symbol = %symbol,
            side = %side,
            reason = %reason,
            price = trade.exit_price,
            roe = trade.roe,
            "position closed"
        );
        if let Some(pivot) = self.model.pivot() {
            draft.reentry.block(value, pivot);
        }
        self.model.on_close(
            &mut draft.signal,
            side,
            self.settings.consume_opposite_on_close && !reverse,
        );
        draft.take_profit.reset();
        draft.last_exit_bar = Some(snapshot.bar_id);
        outcome.transitions.push(Transition::Exited(trade));
        *state = draft;

        if reverse {
            let guards = EntryGuards {
                flat: state.positions.is_flat(),
                cooldown_remaining: state.cooldown.bars_remaining(),
                reentry_blocked: state.reentry.is_blocked(),
                exited_this_bar: false,
            };
            if !guards.permit() {
                debug!(symbol = %symbol, ?guards, "reversal suppressed");
                return Ok(());
            }
            let mut next = state.clone();
            match self.enter(symbol, &mut next, side.opposite(), true, snapshot, broker) {
                Ok(t) => {
                    outcome.transitions.push(t);
                    *state = next;
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "reversal entry failed after close");
                    outcome.deferred_error = Some(CycleError::Broker(e));
                }
            }
        }
        Ok(())
    }

    fn evaluate_entry(
        &self,
        symbol: &SymbolId,
        draft: &mut SymbolState,
        snapshot: &MarketSnapshot,
        broker: &mut dyn Broker,
        outcome: &mut CycleOutcome,
    ) -> Result<(), CycleError> {
        let guards = EntryGuards {
            flat: draft.positions.is_flat(),
            cooldown_remaining: draft.cooldown.bars_remaining(),
            reentry_blocked: draft.reentry.is_blocked(),
            exited_this_bar: !self.settings.allow_same_bar_reentry
                && draft.last_exit_bar == Some(snapshot.bar_id),
        };
        if !guards.permit() {
            return Ok(());
        }
        let candidates = self
            .model
            .entry_candidates(&draft.signal, snapshot)
            .restrict(self.settings.allowed_sides);
        let Some(side) = candidates.resolve(self.settings.prefer_short_on_tie) else {
            return Ok(());
        };
        if candidates.long && candidates.short {
            debug!(symbol = %symbol, chosen = %side, "both sides triggered");
        }
        let transition = self
            .enter(symbol, draft, side, false, snapshot, broker)
            .map_err(CycleError::Broker)?;
        outcome.transitions.push(transition);
        Ok(())
    }

    /// Open `side` and apply the entry bookkeeping. An abandoned fill leaves
    /// `draft` as it was.
    fn enter(
        &self,
        symbol: &SymbolId,
        draft: &mut SymbolState,
        side: Side,
        reversal: bool,
        snapshot: &MarketSnapshot,
        broker: &mut dyn Broker,
    ) -> Result<Transition, CollaboratorError> {
        match draft
            .positions
            .enter(broker, symbol, side, self.settings.leverage, snapshot)?
        {
            EntryOutcome::Opened(position) => {
                self.model.on_entry(&mut draft.signal, side, snapshot);
                draft.cooldown.arm(self.settings.cooldown_bars);
                draft.take_profit.reset();
                info!(
                    symbol = %symbol,
                    side = %side,
                    price = position.entry_price,
                    quantity = position.quantity,
                    reversal,
                    "position opened"
                );
                Ok(Transition::Entered {
                    side,
                    price: position.entry_price,
                    quantity: position.quantity,
                    reversal,
                })
            }
            EntryOutcome::Abandoned { price, quantity } => {
                warn!(symbol = %symbol, side = %side, ?price, quantity, "entry not fillable");
                Ok(Transition::EntryAbandoned {
                    side,
                    price,
                    quantity,
                })
            }
        }
    }
}

//! Poll loop — the live-style driver.
//!
//! Each pass walks every configured symbol in order, fetches its latest
//! snapshot and steps its engine. A failing cycle is logged and the symbol is
//! simply retried on the next pass; its state is left exactly as it was.
//! Symbols never share state, so one symbol's failure does not touch another.
//! A symbol whose finite source has drained drops out of later passes, and
//! the loop ends once every symbol has drained.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use doorstep_core::broker::{Broker, Feed, IndicatorSource};
use doorstep_core::components::ModelError;
use doorstep_core::domain::SymbolId;
use doorstep_core::engine::{CycleError, CycleOutcome, Engine, SymbolState};

use crate::backtest::remark;
use crate::config::{SymbolSetup, ValidatedConfig};

/// One symbol's engine, feed and state, plus counters for reporting.
#[derive(Debug)]
pub struct SymbolSlot {
    pub engine: Engine,
    pub feed: Feed,
    pub state: SymbolState,
    pub cycles: usize,
    pub failures: usize,
}

impl SymbolSlot {
    pub fn new(setup: &SymbolSetup) -> Result<Self, ModelError> {
        let engine = setup.build_engine()?;
        let state = engine.new_state();
        Ok(Self {
            engine,
            feed: setup.feed(),
            state,
            cycles: 0,
            failures: 0,
        })
    }
}

#[derive(Debug)]
pub struct PollContext {
    pub slots: BTreeMap<SymbolId, SymbolSlot>,
    /// Pause between passes; zero disables sleeping.
    pub interval: Duration,
}

impl PollContext {
    pub fn new(interval: Duration) -> Self {
        Self {
            slots: BTreeMap::new(),
            interval,
        }
    }

    /// One slot per valid symbol. Rejected symbols were already reported by
    /// `AppConfig::validate` and stay out of the loop.
    pub fn from_config(validated: &ValidatedConfig, interval: Duration) -> Result<Self, ModelError> {
        let mut ctx = Self::new(interval);
        for setup in &validated.setups {
            ctx.slots.insert(setup.symbol.clone(), SymbolSlot::new(setup)?);
        }
        Ok(ctx)
    }

    pub fn state(&self, symbol: &SymbolId) -> Option<&SymbolState> {
        self.slots.get(symbol).map(|slot| &slot.state)
    }
}

/// What happened to every symbol in one pass.
#[derive(Debug, Default)]
pub struct PassReport {
    pub outcomes: Vec<(SymbolId, CycleOutcome)>,
    pub errors: Vec<(SymbolId, CycleError)>,
}

impl PassReport {
    pub fn transitions(&self) -> usize {
        self.outcomes.iter().map(|(_, o)| o.transitions.len()).sum()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollSummary {
    pub passes: usize,
    pub cycles: usize,
    pub transitions: usize,
    pub errors: usize,
}

/// Step every symbol once, in symbol order. Drained symbols are left out.
pub fn run_pass(
    ctx: &mut PollContext,
    source: &mut dyn IndicatorSource,
    broker: &mut dyn Broker,
) -> PassReport {
    let mut report = PassReport::default();
    for (symbol, slot) in ctx.slots.iter_mut() {
        if source.is_drained(symbol) {
            continue;
        }
        slot.cycles += 1;
        match slot
            .engine
            .poll(symbol, &mut slot.state, &slot.feed, source, broker)
        {
            Ok(outcome) => {
                if let Some(err) = &outcome.deferred_error {
                    error!(symbol = %symbol, error = %err, "reversal entry failed; position closed");
                    slot.failures += 1;
                }
                if !outcome.is_quiet() {
                    debug!(symbol = %symbol, bar_id = outcome.bar_id, remark = %remark(&outcome));
                }
                report.outcomes.push((symbol.clone(), outcome));
            }
            Err(err) => {
                warn!(symbol = %symbol, error = %err, "cycle skipped");
                slot.failures += 1;
                report.errors.push((symbol.clone(), err));
            }
        }
    }
    report
}

/// Run passes until `max_passes` is reached or every symbol's source has
/// drained (a live source never does), sleeping `ctx.interval` between
/// passes.
pub fn run_poll_loop(
    ctx: &mut PollContext,
    source: &mut dyn IndicatorSource,
    broker: &mut dyn Broker,
    max_passes: Option<usize>,
) -> PollSummary {
    info!(
        symbols = ctx.slots.len(),
        interval_secs = ctx.interval.as_secs(),
        ?max_passes,
        "poll loop starting"
    );
    let mut summary = PollSummary::default();
    loop {
        if max_passes.is_some_and(|max| summary.passes >= max) {
            break;
        }
        if ctx.slots.keys().all(|symbol| source.is_drained(symbol)) {
            debug!("every source drained");
            break;
        }
        if summary.passes > 0 && !ctx.interval.is_zero() {
            std::thread::sleep(ctx.interval);
        }
        let report = run_pass(ctx, source, broker);
        summary.passes += 1;
        summary.cycles += report.outcomes.len() + report.errors.len();
        summary.transitions += report.transitions();
        summary.errors += report.errors.len();
    }
    info!(
        passes = summary.passes,
        transitions = summary.transitions,
        errors = summary.errors,
        "poll loop finished"
    );
    summary
}

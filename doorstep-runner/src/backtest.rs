//! Backtest driver — steps one symbol's engine over a candle series against
//! the paper broker and collects one output row per evaluated bar.
//!
//! Indicator readings are computed once for the whole series; warmup bars
//! (no reading yet) are not evaluated and produce no row. A close row carries
//! the closed trade's entry price, realized PnL and ROE. Each cycle goes
//! through `Engine::step`, the same path the poll loop uses.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use doorstep_core::broker::{PaperBroker, PaperConfig};
use doorstep_core::components::ModelError;
use doorstep_core::domain::{
    Candle, Interval, MarketSnapshot, Position, PositionSide, SymbolId, TradeRecord,
    TransitionRecord,
};
use doorstep_core::engine::{CycleOutcome, Transition};
use doorstep_core::fingerprint::RunFingerprint;

use crate::candles::{load_candles, CandleError};
use crate::config::{ConfigError, SymbolSetup};
use crate::metrics::BacktestMetrics;

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("strategy does not build: {0}")]
    Model(#[from] ModelError),
    #[error("no candles for {0}")]
    NoData(SymbolId),
    #[error("candle data: {0}")]
    Candles(#[from] CandleError),
    #[error("failed to fingerprint run: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub symbol: SymbolId,
    pub timeframe: Interval,
    pub fingerprint: RunFingerprint,
    pub broker: PaperConfig,
    /// Indicator column names, in `TransitionRecord::indicator_values` order.
    pub indicator_columns: Vec<String>,
    /// One row per evaluated bar; a reversal bar gets a close row and an
    /// entry row.
    pub transitions: Vec<TransitionRecord>,
    pub trades: Vec<TradeRecord>,
    /// Mark-to-market equity after each evaluated bar.
    pub equity_curve: Vec<f64>,
    pub metrics: BacktestMetrics,
    pub bars: usize,
    pub evaluated_bars: usize,
    /// Cycles that returned an error (logged, state unchanged).
    pub failed_cycles: usize,
    /// Position still open when the series ended.
    pub open_position: Option<Position>,
}

fn transition_remark(transition: &Transition) -> String {
    match transition {
        Transition::Entered {
            side,
            reversal: false,
            ..
        } => format!("{side} ENTRY"),
        Transition::Entered {
            side,
            reversal: true,
            ..
        } => format!("{side} ENTRY (reversal)"),
        Transition::Exited(trade) => exit_remark(trade),
        Transition::EntryAbandoned { side, .. } => format!("{side} ENTRY ABANDONED"),
    }
}

fn exit_remark(trade: &TradeRecord) -> String {
    format!("CLOSE {} ({})", trade.side, trade.reason)
}

fn joined<'a>(transitions: impl Iterator<Item = &'a Transition>) -> String {
    transitions
        .map(transition_remark)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Human-readable summary of a cycle's transitions, `""` when nothing happened.
pub fn remark(outcome: &CycleOutcome) -> String {
    joined(outcome.transitions.iter())
}

/// Shared columns of the rows written for one evaluated bar.
struct RowContext<'a> {
    setup: &'a SymbolSetup,
    time: DateTime<Utc>,
    close: f64,
    values: Vec<f64>,
}

impl RowContext<'_> {
    fn row(&self, position: PositionSide, remark: String) -> TransitionRecord {
        TransitionRecord {
            datetime: self.time,
            symbol: self.setup.symbol.to_string(),
            timeframe: self.setup.interval.to_string(),
            close: self.close,
            indicator_values: self.values.clone(),
            position,
            remark,
            entry_price: None,
            unrealized_pnl: 0.0,
            roe: 0.0,
        }
    }

    /// Row valued against whatever is open after the cycle.
    fn holding(&self, position: Option<&Position>, remark: String) -> TransitionRecord {
        let side = PositionSide::from(position.map(|p| p.side));
        TransitionRecord {
            entry_price: position.map(|p| p.entry_price),
            unrealized_pnl: position.map_or(0.0, |p| p.pnl_at(self.close)),
            roe: position.map_or(0.0, |p| p.roe_at(self.close)),
            ..self.row(side, remark)
        }
    }

    /// Row for a close: flat afterwards, valued with the realized trade.
    fn closed(&self, trade: &TradeRecord, remark: String) -> TransitionRecord {
        TransitionRecord {
            entry_price: Some(trade.entry_price),
            unrealized_pnl: trade.pnl,
            roe: trade.roe,
            ..self.row(PositionSide::Flat, remark)
        }
    }
}

pub fn run_backtest(
    setup: &SymbolSetup,
    candles: &[Candle],
    broker_config: &PaperConfig,
) -> Result<BacktestResult, BacktestError> {
    let symbol = &setup.symbol;
    if candles.is_empty() {
        return Err(BacktestError::NoData(symbol.clone()));
    }
    broker_config.validate()?;
    let engine = setup.build_engine()?;
    let fingerprint = RunFingerprint::new(
        symbol.as_str(),
        setup.interval.as_str(),
        &setup.strategy,
        candles,
        None,
    )?;
    let mut broker = PaperBroker::new(broker_config.clone());
    let mut state = engine.new_state();
    let readings = setup.strategy.indicator.compute(candles);

    let mut transitions = Vec::new();
    let mut trades = Vec::new();
    let mut equity_curve = Vec::new();
    let mut failed_cycles = 0;
    let mut evaluated_bars = 0;

    for (i, candle) in candles.iter().enumerate() {
        let Some(reading) = readings[i] else {
            continue;
        };
        let snapshot = MarketSnapshot {
            bar_id: candle.bar_id(),
            time: candle.open_time,
            price: candle.close,
            reading,
            prev_reading: i.checked_sub(1).and_then(|p| readings[p]),
        };

        let mut closed = None;
        let mut after_close = String::new();
        let remark = match engine.step(symbol, &mut state, &snapshot, &mut broker) {
            Ok(outcome) => {
                if let Some(error) = &outcome.deferred_error {
                    warn!(symbol = %symbol, bar_id = snapshot.bar_id, %error, "reversal entry failed after close");
                    failed_cycles += 1;
                }
                closed = outcome.exit().cloned();
                after_close = joined(
                    outcome
                        .transitions
                        .iter()
                        .filter(|t| !matches!(t, Transition::Exited(_))),
                );
                let text = remark(&outcome);
                if !text.is_empty() {
                    debug!(symbol = %symbol, time = %snapshot.time, remark = %text);
                }
                text
            }
            Err(error) => {
                warn!(symbol = %symbol, bar_id = snapshot.bar_id, %error, "cycle failed, state unchanged");
                failed_cycles += 1;
                format!("ERROR: {error}")
            }
        };

        let row = RowContext {
            setup,
            time: snapshot.time,
            close: candle.close,
            values: reading.values(),
        };
        match (closed, state.position()) {
            // Reversal: the close gets its own row ahead of the new position.
            (Some(trade), Some(position)) => {
                transitions.push(row.closed(&trade, exit_remark(&trade)));
                transitions.push(row.holding(Some(position), after_close));
                trades.push(trade);
            }
            (Some(trade), None) => {
                transitions.push(row.closed(&trade, remark));
                trades.push(trade);
            }
            (None, position) => transitions.push(row.holding(position, remark)),
        }
        evaluated_bars += 1;
        equity_curve.push(broker.mark_to_market());
    }

    let final_equity = broker.mark_to_market();
    let metrics = BacktestMetrics::compute(&equity_curve, &trades, final_equity);
    let open_position = state.position().cloned();
    info!(
        symbol = %symbol,
        bars = candles.len(),
        trades = metrics.trade_count,
        total_roe = metrics.total_roe,
        final_equity,
        open = %PositionSide::from(open_position.as_ref().map(|p| p.side)),
        "backtest finished"
    );

    Ok(BacktestResult {
        symbol: symbol.clone(),
        timeframe: setup.interval.clone(),
        fingerprint,
        broker: broker_config.clone(),
        indicator_columns: setup
            .strategy
            .indicator
            .columns()
            .into_iter()
            .map(String::from)
            .collect(),
        evaluated_bars,
        transitions,
        trades,
        equity_curve,
        metrics,
        bars: candles.len(),
        failed_cycles,
        open_position,
    })
}

/// Load `path` and backtest it.
pub fn run_backtest_file(
    setup: &SymbolSetup,
    path: &Path,
    broker_config: &PaperConfig,
) -> Result<BacktestResult, BacktestError> {
    let candles = load_candles(path)?;
    run_backtest(setup, &candles, broker_config)
}

//! Artifact export — transition rows and trades as CSV, plus a JSON summary.
//!
//! The transition CSV keeps the column order downstream tooling expects:
//! `datetime, symbol, timeframe, close, <indicator columns>, position,
//! remark, entry_price, unrealized_pnl, roe`.
//!
//! `summary.json` carries a `schema_version`; unknown versions are rejected
//! on load.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use doorstep_core::domain::{Position, TradeRecord, TransitionRecord};
use doorstep_core::fingerprint::RunFingerprint;

use crate::backtest::BacktestResult;
use crate::metrics::BacktestMetrics;

pub const SCHEMA_VERSION: u32 = 1;

/// Everything in a run except the per-bar rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub fingerprint: RunFingerprint,
    pub metrics: BacktestMetrics,
    pub bars: usize,
    pub evaluated_bars: usize,
    pub failed_cycles: usize,
    pub open_position: Option<Position>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunSummary {
    pub fn of(result: &BacktestResult) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            fingerprint: result.fingerprint.clone(),
            metrics: result.metrics.clone(),
            bars: result.bars,
            evaluated_bars: result.evaluated_bars,
            failed_cycles: result.failed_cycles,
            open_position: result.open_position.clone(),
        }
    }
}

fn opt_price(v: Option<f64>) -> String {
    v.map(|p| format!("{p:.6}")).unwrap_or_default()
}

pub fn write_transitions_csv<W: Write>(
    writer: W,
    indicator_columns: &[String],
    rows: &[TransitionRecord],
) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header = vec!["datetime", "symbol", "timeframe", "close"];
    header.extend(indicator_columns.iter().map(String::as_str));
    header.extend(["position", "remark", "entry_price", "unrealized_pnl", "roe"]);
    wtr.write_record(&header)?;

    for r in rows {
        let mut record = vec![
            r.datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            r.symbol.clone(),
            r.timeframe.clone(),
            format!("{:.6}", r.close),
        ];
        record.extend(r.indicator_values.iter().map(|v| format!("{v:.4}")));
        record.extend([
            r.position.to_string(),
            r.remark.clone(),
            opt_price(r.entry_price),
            format!("{:.4}", r.unrealized_pnl),
            format!("{:.4}", r.roe),
        ]);
        wtr.write_record(&record)?;
    }
    wtr.flush().context("failed to flush transitions CSV")?;
    Ok(())
}

/// Columns: symbol, side, entry_time, entry_price, exit_time, exit_price,
/// quantity, initial_margin, pnl, fees, net_pnl, roe, reason
pub fn write_trades_csv<W: Write>(writer: W, trades: &[TradeRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "symbol",
        "side",
        "entry_time",
        "entry_price",
        "exit_time",
        "exit_price",
        "quantity",
        "initial_margin",
        "pnl",
        "fees",
        "net_pnl",
        "roe",
        "reason",
    ])?;

    for t in trades {
        wtr.write_record([
            t.symbol.clone(),
            t.side.to_string(),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            format!("{:.6}", t.quantity),
            format!("{:.4}", t.initial_margin),
            format!("{:.4}", t.pnl),
            format!("{:.4}", t.fees),
            format!("{:.4}", t.net_pnl()),
            format!("{:.4}", t.roe),
            t.reason.to_string(),
        ])?;
    }
    wtr.flush().context("failed to flush trades CSV")?;
    Ok(())
}

pub fn write_equity_csv<W: Write>(writer: W, equity_curve: &[f64]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["bar_index", "equity"])?;
    for (i, eq) in equity_curve.iter().enumerate() {
        wtr.write_record([i.to_string(), format!("{eq:.4}")])?;
    }
    wtr.flush().context("failed to flush equity CSV")?;
    Ok(())
}

/// Directory name for a run: symbol, timeframe, indicator and a short
/// config hash, e.g. `BTCUSDT_15m_rsi_14_3f2a9c0d1e4b`.
pub fn artifact_dir_name(result: &BacktestResult) -> String {
    format!(
        "{}_{}_{}_{}",
        result.symbol,
        result.timeframe,
        result.fingerprint.strategy.indicator.label(),
        result.fingerprint.full_hash.short()
    )
}

fn create(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path).with_context(|| format!("failed to create {}", path.display()))
}

/// Save the full artifact set for one run under `output_dir`.
///
/// Creates `{artifact_dir_name}/` containing:
/// - `transitions.csv` — one row per evaluated bar
/// - `trades.csv` — closed trades
/// - `equity.csv` — mark-to-market equity per evaluated bar
/// - `summary.json` — fingerprint, metrics and end state
///
/// Re-running the same config on the same data overwrites the directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let run_dir = output_dir.join(artifact_dir_name(result));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write_transitions_csv(
        create(&run_dir.join("transitions.csv"))?,
        &result.indicator_columns,
        &result.transitions,
    )?;
    write_trades_csv(create(&run_dir.join("trades.csv"))?, &result.trades)?;
    write_equity_csv(create(&run_dir.join("equity.csv"))?, &result.equity_curve)?;

    let json = serde_json::to_string_pretty(&RunSummary::of(result))
        .context("failed to serialize run summary")?;
    std::fs::write(run_dir.join("summary.json"), json)
        .with_context(|| format!("failed to write summary in {}", run_dir.display()))?;

    Ok(run_dir)
}

/// Read `summary.json` from an artifact directory.
pub fn load_summary(dir: &Path) -> Result<RunSummary> {
    let path = dir.join("summary.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let summary: RunSummary =
        serde_json::from_str(&json).context("failed to deserialize run summary")?;
    if summary.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            summary.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(summary)
}

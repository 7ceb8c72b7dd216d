//! Doorstep Runner — configuration, backtests, export, poll loop and sweeps.
//!
//! This crate builds on `doorstep-core` to provide:
//! - TOML config loading with per-symbol validation
//! - Candle CSV loading and seeded synthetic series
//! - A backtest driver over the paper broker, with metrics
//! - CSV/JSON artifact export with run fingerprints
//! - The sequential poll loop over every configured symbol
//! - Rayon-parallel parameter sweeps

pub mod backtest;
pub mod candles;
pub mod config;
pub mod export;
pub mod metrics;
pub mod poll;
pub mod sweep;
pub mod synthetic;

pub use backtest::{remark, run_backtest, run_backtest_file, BacktestError, BacktestResult};
pub use candles::{load_candles, read_candles, save_candles, write_candles, CandleError};
pub use config::{
    AppConfig, ConfigError, EngineSection, RejectedSymbol, SymbolConfig, SymbolSetup,
    ValidatedConfig,
};
pub use export::{
    load_summary, save_artifacts, write_equity_csv, write_trades_csv, write_transitions_csv,
    RunSummary,
};
pub use metrics::{BacktestMetrics, ExitCounts};
pub use poll::{run_pass, run_poll_loop, PassReport, PollContext, PollSummary, SymbolSlot};
pub use sweep::{run_sweep, SweepGrid, SweepPoint, SweepResults, SweepRow};
pub use synthetic::{from_closes, synthetic_candles, SyntheticSpec};

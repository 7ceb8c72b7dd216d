//! Indicator trait.
//!
//! Indicators are pure functions: candle history in, numeric series out.
//! The backtest precomputes them once per series; the live source recomputes
//! them on each fetch over the most recent window.

use crate::domain::Candle;

/// Trait for single-series indicators.
///
/// Output has the same length as the input. The first `lookback()` values
/// are `f64::NAN` (warmup).
///
/// # Look-ahead contamination guard
/// No value at bar t may depend on candle data from bar t+1 or later.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "rsi_14", "ema_12").
    fn name(&self) -> &str;

    /// Number of bars needed before the indicator produces valid output.
    fn lookback(&self) -> usize;

    fn compute(&self, candles: &[Candle]) -> Vec<f64>;
}

//! Concrete indicator implementations.
//!
//! RSI and EMA implement the `Indicator` trait from `components::indicator`.
//! The stochastic oscillator computes both of its lines in one pass, smoothed
//! with `sma_of_series`. `IndicatorSpec` selects and combines them into the
//! `IndicatorReading` stream a symbol's state machine consumes.

pub mod ema;
pub mod rsi;
pub mod sma;
pub mod spec;
pub mod stochastic;

pub use ema::{ema_of_series, Ema};
pub use rsi::{rsi_of_series, Rsi};
pub use sma::sma_of_series;
pub use spec::IndicatorSpec;
pub use stochastic::stochastic_lines;

/// Create synthetic candles from close prices for testing.
///
/// Generates plausible OHLV: open = prev_close (or close for first candle),
/// high = max(open,close) + 1.0, low = min(open,close) - 1.0, volume = 1000,
/// one-minute spacing.
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<crate::domain::Candle> {
    use crate::domain::Candle;
    use chrono::TimeZone;
    let base = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle {
                open_time: base + chrono::Duration::minutes(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

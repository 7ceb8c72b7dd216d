//! Stochastic oscillator (%K / %D).
//!
//! raw[t] = 100 * (close[t] - LL) / (HH - LL) over the last `k_period` candles,
//! using candle highs and lows. Both lines come from one pass:
//! - %K: SMA(raw, k_smooth)
//! - %D: SMA(%K, d_smooth)
//!
//! A window with HH == LL reports 50.
//! Lookback: (k_period - 1) + (k_smooth - 1) [+ (d_smooth - 1) for %D].

use super::sma::sma_of_series;
use crate::domain::Candle;

/// Both stochastic lines in one pass: `(%K, %D)`.
pub fn stochastic_lines(
    candles: &[Candle],
    k_period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> (Vec<f64>, Vec<f64>) {
    let n = candles.len();
    let mut raw = vec![f64::NAN; n];

    if k_period >= 1 && n >= k_period {
        for i in (k_period - 1)..n {
            let window = &candles[i + 1 - k_period..=i];
            if window.iter().any(|c| c.is_void()) {
                continue;
            }
            let hh = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
            let ll = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let range = hh - ll;
            raw[i] = if range <= 0.0 {
                50.0
            } else {
                100.0 * (candles[i].close - ll) / range
            };
        }
    }

    let k = sma_of_series(&raw, k_smooth);
    let d = sma_of_series(&k, d_smooth);
    (k, d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_candles, DEFAULT_EPSILON};

    #[test]
    fn raw_k_at_top_of_range() {
        // make_candles: high = max(open, close) + 1, low = min(open, close) - 1
        // Rising closes 10..14 with k_period 3 at index 4: HH = 15, LL = 10, close 14
        let candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0]);
        let (k, _) = stochastic_lines(&candles, 3, 1, 1);
        assert!(k[1].is_nan());
        assert_approx(k[4], 80.0, DEFAULT_EPSILON);
    }

    #[test]
    fn d_is_smoothed_k() {
        let candles = make_candles(&[10.0, 12.0, 11.0, 13.0, 12.0, 14.0, 13.0]);
        let (k, d) = stochastic_lines(&candles, 3, 2, 2);
        let expected = (k[5] + k[6]) / 2.0;
        assert_approx(d[6], expected, DEFAULT_EPSILON);
    }

    #[test]
    fn flat_window_is_neutral() {
        let mut candles = make_candles(&[10.0, 10.0, 10.0]);
        for c in &mut candles {
            c.high = 10.0;
            c.low = 10.0;
        }
        let (k, _) = stochastic_lines(&candles, 3, 1, 1);
        assert_approx(k[2], 50.0, DEFAULT_EPSILON);
    }

    #[test]
    fn lines_stay_in_bounds() {
        let candles = make_candles(&[100.0, 105.0, 98.0, 110.0, 95.0, 115.0, 90.0, 120.0]);
        let (k, d) = stochastic_lines(&candles, 3, 2, 2);
        for v in k.iter().chain(d.iter()).filter(|v| !v.is_nan()) {
            assert!((0.0..=100.0).contains(v));
        }
    }

    #[test]
    fn first_values_follow_the_smoothing() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i as f64 * 0.9).sin() * 4.0).collect();
        let (k, d) = stochastic_lines(&make_candles(&closes), 14, 3, 3);
        assert_eq!(k.iter().position(|v| !v.is_nan()), Some(15));
        assert_eq!(d.iter().position(|v| !v.is_nan()), Some(17));
    }

    #[test]
    fn void_candle_blanks_its_windows() {
        let mut candles = make_candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0]);
        candles[2].close = f64::NAN;
        let (k, _) = stochastic_lines(&candles, 3, 1, 1);
        assert!(k[2].is_nan() && k[3].is_nan() && k[4].is_nan());
        assert!(!k[5].is_nan());
    }
}

//! Simple Moving Average (SMA) over a derived series (stochastic smoothing).
//!
//! Lookback: period - 1 (first valid value at index period-1).

/// Rolling mean of an arbitrary series. Any NaN in a window yields NaN for
/// that window; the leading NaNs of an upstream indicator are skipped over
/// naturally since those windows are all NaN.
pub fn sma_of_series(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];

    if period == 0 || n < period {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = window.iter().sum::<f64>() / period as f64;
    }

    result
}

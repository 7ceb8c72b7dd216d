//! Deterministic synthetic candles for demos, sweeps and tests.
//!
//! A bounded random walk from `start_price`. The RNG for each symbol comes
//! from `RngHierarchy`, so a `(seed, symbol)` pair always yields the same
//! series no matter how many symbols are generated or in what order.
//! These are clearly fake; artifacts record the seed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use doorstep_core::domain::{Candle, SymbolId};
use doorstep_core::rng::RngHierarchy;

const SCOPE: &str = "synthetic";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSpec {
    pub bars: usize,
    pub start: DateTime<Utc>,
    pub start_price: f64,
    /// Largest per-bar move as a fraction of price.
    pub volatility: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            bars: 1_440,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default(),
            start_price: 100.0,
            volatility: 0.01,
        }
    }
}

pub fn synthetic_candles(
    spec: &SyntheticSpec,
    symbol: &SymbolId,
    bar: Duration,
    seed: u64,
) -> Vec<Candle> {
    let mut rng = RngHierarchy::new(seed).rng_for(SCOPE, symbol.as_str(), 0);
    let vol = spec.volatility.abs().max(1e-6);
    let mut price = spec.start_price.max(1e-6);
    let mut time = spec.start;

    let mut candles = Vec::with_capacity(spec.bars);
    for _ in 0..spec.bars {
        let ret: f64 = rng.gen_range(-vol..vol);
        let open = price;
        let close = (price * (1.0 + ret)).max(1e-6);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..vol / 2.0));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..vol / 2.0));
        let volume = rng.gen_range(10.0..1_000.0);
        candles.push(Candle {
            open_time: time,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
        time += bar;
    }
    candles
}

/// Candles that close at exactly `closes`, one `bar` apart from
/// `SyntheticSpec::default().start`. Open is the previous close; high/low
/// sit one unit outside the body.
pub fn from_closes(closes: &[f64], bar: Duration) -> Vec<Candle> {
    let start = SyntheticSpec::default().start;
    let mut time = start;
    let mut candles = Vec::with_capacity(closes.len());
    for (i, &close) in closes.iter().enumerate() {
        let open = if i == 0 { close } else { closes[i - 1] };
        candles.push(Candle {
            open_time: time,
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1_000.0,
        });
        time += bar;
    }
    candles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(symbol: &str, seed: u64) -> Vec<Candle> {
        let spec = SyntheticSpec {
            bars: 200,
            ..SyntheticSpec::default()
        };
        synthetic_candles(&spec, &SymbolId::from(symbol), Duration::minutes(15), seed)
    }

    #[test]
    fn from_closes_keeps_closes() {
        let candles = from_closes(&[10.0, 11.0, 9.5], Duration::hours(1));
        assert_eq!(candles.iter().map(|c| c.close).collect::<Vec<_>>(), vec![10.0, 11.0, 9.5]);
        assert_eq!(candles[1].open, 10.0);
        assert_eq!(candles[2].open_time - candles[0].open_time, Duration::hours(2));
    }

    #[test]
    fn same_seed_same_series() {
        assert_eq!(generate("BTCUSDT", 7), generate("BTCUSDT", 7));
    }

    #[test]
    fn symbols_and_seeds_diverge() {
        assert_ne!(generate("BTCUSDT", 7), generate("ETHUSDT", 7));
        assert_ne!(generate("BTCUSDT", 7), generate("BTCUSDT", 8));
    }

    #[test]
    fn candles_are_sane_and_spaced() {
        let candles = generate("BTCUSDT", 1);
        assert_eq!(candles.len(), 200);
        assert!(candles.iter().all(Candle::is_sane));
        for pair in candles.windows(2) {
            assert_eq!(pair[1].open_time - pair[0].open_time, Duration::minutes(15));
            assert_eq!(pair[1].open, pair[0].close);
        }
    }
}

//! Indicator readings and the per-cycle market snapshot.

use super::candle::BarId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One indicator observation for one symbol.
///
/// RSI produces a single value; EMA fast/slow and stochastic %K/%D produce a
/// pair. `Zoned` is an EMA pair watched alongside a bounded oscillator: the
/// pair crosses, the oscillator carries the zone levels.
///
/// The primary value is the one levels are measured on: the single value,
/// the fast line of a pair (%K for stochastics) or the oscillator of a
/// zoned pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndicatorReading {
    Single(f64),
    // Before `Pair`: untagged matching would otherwise drop `zone`.
    Zoned { fast: f64, slow: f64, zone: f64 },
    Pair { fast: f64, slow: f64 },
}

impl IndicatorReading {
    pub fn primary(&self) -> f64 {
        match *self {
            IndicatorReading::Single(v) => v,
            IndicatorReading::Pair { fast, .. } => fast,
            IndicatorReading::Zoned { zone, .. } => zone,
        }
    }

    pub fn pair(&self) -> Option<(f64, f64)> {
        match *self {
            IndicatorReading::Single(_) => None,
            IndicatorReading::Pair { fast, slow } | IndicatorReading::Zoned { fast, slow, .. } => {
                Some((fast, slow))
            }
        }
    }

    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }

    /// Values in output-column order.
    pub fn values(&self) -> Vec<f64> {
        match *self {
            IndicatorReading::Single(v) => vec![v],
            IndicatorReading::Pair { fast, slow } => vec![fast, slow],
            IndicatorReading::Zoned { fast, slow, zone } => vec![fast, slow, zone],
        }
    }
}

/// Everything the engine needs for one symbol in one cycle.
///
/// `bar_id` identifies the most recently closed bar; `price` is the price
/// used for fills and valuation in this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub bar_id: BarId,
    pub time: DateTime<Utc>,
    pub price: f64,
    pub reading: IndicatorReading,
    pub prev_reading: Option<IndicatorReading>,
}

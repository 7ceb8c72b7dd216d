//! Replay source — serves a stored candle series one closed bar per call,
//! the way a live feed would deliver it on successive polls.

use std::collections::HashMap;

use super::{CollaboratorError, Feed, IndicatorSource};
use crate::domain::{Candle, IndicatorReading, MarketSnapshot, SymbolId};

#[derive(Debug, Clone)]
struct ReplaySeries {
    candles: Vec<Candle>,
    readings: Option<Vec<Option<IndicatorReading>>>,
    cursor: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    series: HashMap<SymbolId, ReplaySeries>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: SymbolId, candles: Vec<Candle>) -> Self {
        self.insert(symbol, candles);
        self
    }

    pub fn insert(&mut self, symbol: SymbolId, candles: Vec<Candle>) {
        self.series.insert(
            symbol,
            ReplaySeries {
                candles,
                readings: None,
                cursor: 0,
            },
        );
    }

    /// Bars not yet served for `symbol`.
    pub fn remaining(&self, symbol: &SymbolId) -> usize {
        self.series
            .get(symbol)
            .map_or(0, |s| s.candles.len().saturating_sub(s.cursor))
    }

    /// Every series drained.
    pub fn is_exhausted(&self) -> bool {
        self.series.keys().all(|s| self.is_drained(s))
    }
}

impl IndicatorSource for ReplaySource {
    /// Serve the next bar that has a finite reading. Warmup bars are skipped.
    fn snapshot(&mut self, symbol: &SymbolId, feed: &Feed) -> Result<MarketSnapshot, CollaboratorError> {
        let series = self
            .series
            .get_mut(symbol)
            .ok_or_else(|| CollaboratorError::MissingData(symbol.to_string()))?;
        let readings = series
            .readings
            .get_or_insert_with(|| feed.indicator.compute(&series.candles));

        while series.cursor < series.candles.len() {
            let i = series.cursor;
            series.cursor += 1;
            if let Some(reading) = readings[i] {
                let candle = &series.candles[i];
                return Ok(MarketSnapshot {
                    bar_id: candle.bar_id(),
                    time: candle.open_time,
                    price: candle.close,
                    reading,
                    prev_reading: i.checked_sub(1).and_then(|p| readings[p]),
                });
            }
        }
        Err(CollaboratorError::Fetch {
            symbol: symbol.to_string(),
            message: "replay exhausted".into(),
        })
    }

    /// No bar with a reading is left. Unknown symbols are never drained; a
    /// fetch for them fails instead.
    fn is_drained(&self, symbol: &SymbolId) -> bool {
        self.series.get(symbol).is_some_and(|s| match &s.readings {
            Some(readings) => readings[s.cursor..].iter().all(Option::is_none),
            None => s.candles.is_empty(),
        })
    }
}

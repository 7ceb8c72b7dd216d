//! Parameter sweep over doorstep-style knobs, evaluated in parallel.
//!
//! Each axis left empty keeps the base strategy's value. Grid points whose
//! strategy does not build (a doorstep the model rejects, say) are skipped.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use doorstep_core::broker::PaperConfig;
use doorstep_core::components::TakeProfitPolicy;
use doorstep_core::domain::Candle;
use doorstep_core::fingerprint::{ConfigHash, StrategyConfig};

use crate::backtest::{run_backtest, BacktestError};
use crate::config::{ConfigError, SymbolSetup};
use crate::metrics::BacktestMetrics;

/// `[sweep]` table: candidate values per axis.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepGrid {
    pub doorstep: Vec<f64>,
    /// One-sided entry band of the ladder model.
    pub entry_band: Vec<f64>,
    /// Give-back of a trailing take-profit.
    pub doorstep_close: Vec<f64>,
    pub cooldown_bars: Vec<u32>,
}

/// One grid point. `None` means "as in the base strategy".
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SweepPoint {
    pub doorstep: Option<f64>,
    pub entry_band: Option<f64>,
    pub doorstep_close: Option<f64>,
    pub cooldown_bars: Option<u32>,
}

fn axis<T: Copy>(values: &[T]) -> Vec<Option<T>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().copied().map(Some).collect()
    }
}

impl SweepGrid {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let floats = [
            ("sweep.doorstep", &self.doorstep),
            ("sweep.entry_band", &self.entry_band),
            ("sweep.doorstep_close", &self.doorstep_close),
        ];
        for (name, values) in floats {
            if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(ConfigError::Invalid {
                    name: name.into(),
                    reason: format!("values must be finite and non-negative, got {bad}"),
                });
            }
        }
        Ok(())
    }

    /// Number of grid points, counting an empty axis as one.
    pub fn size(&self) -> usize {
        self.doorstep.len().max(1)
            * self.entry_band.len().max(1)
            * self.doorstep_close.len().max(1)
            * self.cooldown_bars.len().max(1)
    }

    pub fn points(&self) -> Vec<SweepPoint> {
        let mut points = Vec::with_capacity(self.size());
        for doorstep in axis(&self.doorstep) {
            for entry_band in axis(&self.entry_band) {
                for doorstep_close in axis(&self.doorstep_close) {
                    for cooldown_bars in axis(&self.cooldown_bars) {
                        points.push(SweepPoint {
                            doorstep,
                            entry_band,
                            doorstep_close,
                            cooldown_bars,
                        });
                    }
                }
            }
        }
        points
    }
}

impl SweepPoint {
    /// `base` with this point's values applied. Axes that do not apply to
    /// the base model or exit policy are left alone.
    pub fn apply(&self, base: &StrategyConfig) -> StrategyConfig {
        let mut next = base.clone();
        if let Some(d) = self.doorstep {
            next.signal = next.signal.with_doorstep(d);
        }
        if self.entry_band.is_some() {
            next.signal = next.signal.with_entry_band(self.entry_band);
        }
        if let (Some(close), TakeProfitPolicy::Trailing { doorstep_close, .. }) =
            (self.doorstep_close, &mut next.exit.take_profit)
        {
            *doorstep_close = close;
        }
        if let Some(n) = self.cooldown_bars {
            next.engine.cooldown_bars = n;
        }
        next
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRow {
    pub point: SweepPoint,
    pub full_hash: ConfigHash,
    pub metrics: BacktestMetrics,
}

/// Results from a parameter sweep, best first.
#[derive(Debug, Clone, Default)]
pub struct SweepResults {
    rows: Vec<SweepRow>,
    skipped: usize,
}

impl SweepResults {
    fn new(mut rows: Vec<SweepRow>, skipped: usize) -> Self {
        rows.sort_by(|a, b| b.metrics.total_roe.total_cmp(&a.metrics.total_roe));
        Self { rows, skipped }
    }

    /// All rows, sorted by total ROE descending.
    pub fn all(&self) -> &[SweepRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Grid points whose strategy did not build.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn top_n(&self, n: usize) -> &[SweepRow] {
        &self.rows[..n.min(self.rows.len())]
    }

    pub fn best(&self) -> Option<&SweepRow> {
        self.rows.first()
    }
}

/// Backtest every grid point against `candles` in parallel.
pub fn run_sweep(
    setup: &SymbolSetup,
    candles: &[Candle],
    broker: &PaperConfig,
    grid: &SweepGrid,
) -> Result<SweepResults, BacktestError> {
    grid.validate()?;
    let points = grid.points();
    info!(symbol = %setup.symbol, points = points.len(), "sweep starting");

    let outcomes: Vec<Option<SweepRow>> = points
        .par_iter()
        .map(|point| {
            let variant = SymbolSetup {
                strategy: point.apply(&setup.strategy),
                ..setup.clone()
            };
            match run_backtest(&variant, candles, broker) {
                Ok(result) => Ok(Some(SweepRow {
                    point: *point,
                    full_hash: result.fingerprint.full_hash,
                    metrics: result.metrics,
                })),
                Err(BacktestError::Model(err)) => {
                    debug!(?point, %err, "grid point skipped");
                    Ok(None)
                }
                Err(err) => Err(err),
            }
        })
        .collect::<Result<Vec<_>, BacktestError>>()?;

    let total = outcomes.len();
    let rows: Vec<SweepRow> = outcomes.into_iter().flatten().collect();
    let skipped = total - rows.len();
    let results = SweepResults::new(rows, skipped);
    info!(
        symbol = %setup.symbol,
        evaluated = results.len(),
        skipped,
        best_roe = results.best().map(|r| r.metrics.total_roe),
        "sweep finished"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorstep_core::components::{ExitPolicy, SignalConfig};
    use doorstep_core::domain::{Interval, SymbolId};
    use doorstep_core::engine::EngineSettings;
    use doorstep_core::indicators::IndicatorSpec;

    use crate::synthetic::{synthetic_candles, SyntheticSpec};

    fn base() -> StrategyConfig {
        StrategyConfig {
            indicator: IndicatorSpec::Rsi { period: 14 },
            signal: SignalConfig::default(),
            exit: ExitPolicy {
                stop_loss_roe: Some(30.0),
                take_profit: TakeProfitPolicy::Trailing {
                    roe: 10.0,
                    doorstep_close: 3.0,
                },
            },
            engine: EngineSettings::default(),
        }
    }

    #[test]
    fn grid_size_counts_empty_axes_as_one() {
        let grid = SweepGrid {
            doorstep: vec![2.0, 3.0, 4.0],
            cooldown_bars: vec![0, 1],
            ..SweepGrid::default()
        };
        assert_eq!(grid.size(), 6);
        assert_eq!(grid.points().len(), 6);
        assert_eq!(SweepGrid::default().points(), vec![SweepPoint::default()]);
    }

    #[test]
    fn point_applies_every_axis() {
        let point = SweepPoint {
            doorstep: Some(5.0),
            entry_band: Some(2.0),
            doorstep_close: Some(1.5),
            cooldown_bars: Some(4),
        };
        let s = point.apply(&base());
        assert_eq!(s.signal.doorstep(), Some(5.0));
        assert_eq!(s.signal, SignalConfig::default().with_doorstep(5.0).with_entry_band(Some(2.0)));
        assert_eq!(
            s.exit.take_profit,
            TakeProfitPolicy::Trailing {
                roe: 10.0,
                doorstep_close: 1.5
            }
        );
        assert_eq!(s.engine.cooldown_bars, 4);
    }

    #[test]
    fn empty_point_is_identity() {
        assert_eq!(SweepPoint::default().apply(&base()), base());
    }

    #[test]
    fn negative_values_are_rejected() {
        let grid = SweepGrid {
            doorstep: vec![3.0, -1.0],
            ..SweepGrid::default()
        };
        assert!(matches!(grid.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn sweep_sorts_by_total_roe() {
        let setup = SymbolSetup {
            symbol: SymbolId::from("BTCUSDT"),
            interval: Interval::new("15m"),
            strategy: base(),
        };
        let spec = SyntheticSpec {
            bars: 600,
            volatility: 0.02,
            ..SyntheticSpec::default()
        };
        let candles = synthetic_candles(&spec, &setup.symbol, chrono::Duration::minutes(15), 11);
        let grid = SweepGrid {
            doorstep: vec![1.0, 3.0, 5.0],
            cooldown_bars: vec![0, 2],
            ..SweepGrid::default()
        };
        let results = run_sweep(&setup, &candles, &PaperConfig::default(), &grid).unwrap();
        assert_eq!(results.len() + results.skipped(), 6);
        for pair in results.all().windows(2) {
            assert!(pair[0].metrics.total_roe >= pair[1].metrics.total_roe);
        }
        assert_eq!(results.top_n(2).len(), 2.min(results.len()));
    }
}

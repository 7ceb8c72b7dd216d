//! Serializable indicator selection for a symbol feed.

use serde::{Deserialize, Serialize};

use super::ema::Ema;
use super::rsi::Rsi;
use super::stochastic::stochastic_lines;
use crate::components::factory::ModelError;
use crate::components::indicator::Indicator;
use crate::domain::{Candle, IndicatorReading};

/// Which indicator drives a symbol's state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorSpec {
    Rsi {
        period: usize,
    },
    EmaPair {
        fast: usize,
        slow: usize,
    },
    Stochastic {
        k_period: usize,
        #[serde(default = "default_smooth")]
        k_smooth: usize,
        #[serde(default = "default_smooth")]
        d_smooth: usize,
    },
    /// EMA fast/slow pair for crosses, stochastic %K for zone levels.
    EmaStochastic {
        fast: usize,
        slow: usize,
        k_period: usize,
        #[serde(default = "default_smooth")]
        k_smooth: usize,
    },
}

fn default_smooth() -> usize {
    3
}

impl IndicatorSpec {
    pub fn validate(&self) -> Result<(), ModelError> {
        match *self {
            IndicatorSpec::Rsi { period } => nonzero("rsi period", period),
            IndicatorSpec::EmaPair { fast, slow } => {
                nonzero("ema fast period", fast)?;
                nonzero("ema slow period", slow)?;
                if fast >= slow {
                    return Err(ModelError::PeriodOrder { fast, slow });
                }
                Ok(())
            }
            IndicatorSpec::Stochastic {
                k_period,
                k_smooth,
                d_smooth,
            } => {
                nonzero("stochastic k_period", k_period)?;
                nonzero("stochastic k_smooth", k_smooth)?;
                nonzero("stochastic d_smooth", d_smooth)
            }
            IndicatorSpec::EmaStochastic {
                fast,
                slow,
                k_period,
                k_smooth,
            } => {
                IndicatorSpec::EmaPair { fast, slow }.validate()?;
                nonzero("stochastic k_period", k_period)?;
                nonzero("stochastic k_smooth", k_smooth)
            }
        }
    }

    /// True when readings carry a fast/slow pair.
    pub fn is_pair(&self) -> bool {
        !matches!(self, IndicatorSpec::Rsi { .. })
    }

    /// True when the primary value is a bounded 0..100 oscillator that zone
    /// levels can be measured on.
    pub fn is_bounded(&self) -> bool {
        !matches!(self, IndicatorSpec::EmaPair { .. })
    }

    /// Bars consumed before the first finite reading.
    pub fn warmup_bars(&self) -> usize {
        match *self {
            IndicatorSpec::Rsi { period } => period,
            IndicatorSpec::EmaPair { slow, .. } => slow.saturating_sub(1),
            IndicatorSpec::Stochastic {
                k_period,
                k_smooth,
                d_smooth,
            } => (k_period + k_smooth + d_smooth).saturating_sub(3),
            IndicatorSpec::EmaStochastic {
                slow,
                k_period,
                k_smooth,
                ..
            } => slow
                .saturating_sub(1)
                .max((k_period + k_smooth).saturating_sub(2)),
        }
    }

    /// Short label used in output file names, e.g. `rsi_14`.
    pub fn label(&self) -> String {
        match *self {
            IndicatorSpec::Rsi { period } => format!("rsi_{period}"),
            IndicatorSpec::EmaPair { fast, slow } => format!("ema_{fast}_{slow}"),
            IndicatorSpec::Stochastic {
                k_period,
                k_smooth,
                d_smooth,
            } => format!("stoch_{k_period}_{k_smooth}_{d_smooth}"),
            IndicatorSpec::EmaStochastic {
                fast,
                slow,
                k_period,
                k_smooth,
            } => format!("ema_{fast}_{slow}_k_{k_period}_{k_smooth}"),
        }
    }

    /// Column names for the reading values, in `IndicatorReading::values` order.
    pub fn columns(&self) -> Vec<&'static str> {
        match self {
            IndicatorSpec::Rsi { .. } => vec!["rsi"],
            IndicatorSpec::EmaPair { .. } => vec!["ema_fast", "ema_slow"],
            IndicatorSpec::Stochastic { .. } => vec!["k", "d"],
            IndicatorSpec::EmaStochastic { .. } => vec!["ema_fast", "ema_slow", "k"],
        }
    }

    /// Reading series aligned with `candles`; `None` during warmup or after
    /// a void candle.
    pub fn compute(&self, candles: &[Candle]) -> Vec<Option<IndicatorReading>> {
        match *self {
            IndicatorSpec::Rsi { period } => Rsi::new(period.max(1))
                .compute(candles)
                .into_iter()
                .map(|v| finite(IndicatorReading::Single(v)))
                .collect(),
            IndicatorSpec::EmaPair { fast, slow } => {
                let f = Ema::new(fast.max(1)).compute(candles);
                let s = Ema::new(slow.max(1)).compute(candles);
                pair_series(f, s)
            }
            IndicatorSpec::Stochastic {
                k_period,
                k_smooth,
                d_smooth,
            } => {
                let (k, d) = stochastic_lines(candles, k_period, k_smooth, d_smooth);
                pair_series(k, d)
            }
            IndicatorSpec::EmaStochastic {
                fast,
                slow,
                k_period,
                k_smooth,
            } => {
                let f = Ema::new(fast.max(1)).compute(candles);
                let s = Ema::new(slow.max(1)).compute(candles);
                // %D is not used; smoothing it by 1 leaves %K's warmup alone.
                let (k, _) = stochastic_lines(candles, k_period, k_smooth, 1);
                f.into_iter()
                    .zip(s)
                    .zip(k)
                    .map(|((fast, slow), zone)| {
                        finite(IndicatorReading::Zoned { fast, slow, zone })
                    })
                    .collect()
            }
        }
    }
}

fn nonzero(name: &'static str, value: usize) -> Result<(), ModelError> {
    if value == 0 {
        return Err(ModelError::ZeroPeriod { name });
    }
    Ok(())
}

fn finite(reading: IndicatorReading) -> Option<IndicatorReading> {
    reading.is_finite().then_some(reading)
}

fn pair_series(fast: Vec<f64>, slow: Vec<f64>) -> Vec<Option<IndicatorReading>> {
    fast.into_iter()
        .zip(slow)
        .map(|(fast, slow)| finite(IndicatorReading::Pair { fast, slow }))
        .collect()
}

//! Factory system — converts `SignalConfig` into a runtime `SignalModel`.
//!
//! Mismatches between a model and the indicator feeding it (a crossover on a
//! single-valued feed, zone levels on price-scale EMAs) are rejected here
//! rather than at evaluation time.

use serde::{Deserialize, Serialize};

use crate::indicators::IndicatorSpec;

use super::signal::{
    Crossover, CrossoverConfig, LadderConfig, LadderDoorstep, PivotBreakout, PivotConfig,
    SignalModel,
};
use super::trigger::EntryShape;

// ─── Error type ──────────────────────────────────────────────────────

/// Invalid strategy configuration. Raised while building, never mid-cycle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("fast period ({fast}) must be shorter than slow period ({slow})")]
    PeriodOrder { fast: usize, slow: usize },
    #[error("{name} must be at least 1")]
    ZeroPeriod { name: &'static str },
    #[error("invalid ladder levels: {0}")]
    Ladder(String),
    #[error("invalid {name}: {reason}")]
    InvalidParam { name: String, reason: String },
    #[error("signal model '{model}' needs {needs}, but the feed is {indicator}")]
    IndicatorMismatch {
        model: String,
        needs: &'static str,
        indicator: String,
    },
    #[error("exit policy '{policy}' needs a model with a pivot; '{model}' has none")]
    PolicyMismatch { policy: String, model: String },
}

// ─── Config ──────────────────────────────────────────────────────────

/// Which signal model drives entries and opposite-signal exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SignalConfig {
    LadderDoorstep(LadderConfig),
    PivotBreakout(PivotConfig),
    Crossover(CrossoverConfig),
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig::LadderDoorstep(LadderConfig::default())
    }
}

impl SignalConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalConfig::LadderDoorstep(_) => "ladder_doorstep",
            SignalConfig::PivotBreakout(_) => "pivot_breakout",
            SignalConfig::Crossover(_) => "crossover",
        }
    }

    /// The doorstep distance, for models that have one.
    pub fn doorstep(&self) -> Option<f64> {
        match self {
            SignalConfig::LadderDoorstep(c) => Some(c.doorstep),
            SignalConfig::PivotBreakout(c) => Some(c.doorstep),
            SignalConfig::Crossover(_) => None,
        }
    }

    /// Copy with the doorstep replaced. Models without one are returned as-is.
    pub fn with_doorstep(&self, doorstep: f64) -> Self {
        let mut next = self.clone();
        match &mut next {
            SignalConfig::LadderDoorstep(c) => c.doorstep = doorstep,
            SignalConfig::PivotBreakout(c) => c.doorstep = doorstep,
            SignalConfig::Crossover(_) => {}
        }
        next
    }

    /// Copy with the one-sided entry band replaced (ladder model only).
    pub fn with_entry_band(&self, band: Option<f64>) -> Self {
        let mut next = self.clone();
        if let SignalConfig::LadderDoorstep(c) = &mut next {
            if let EntryShape::OneSided { entry_band } = &mut c.entry {
                *entry_band = band;
            }
        }
        next
    }
}

// ─── Model factory ───────────────────────────────────────────────────

/// Build the signal model for `config`, checking it against its feed.
pub fn build_model(
    config: &SignalConfig,
    indicator: &IndicatorSpec,
) -> Result<Box<dyn SignalModel>, ModelError> {
    indicator.validate()?;
    let model: Box<dyn SignalModel> = match config {
        SignalConfig::LadderDoorstep(c) => Box::new(LadderDoorstep::new(c.clone())?),
        SignalConfig::PivotBreakout(c) => Box::new(PivotBreakout::new(c.clone())?),
        SignalConfig::Crossover(c) => {
            if !indicator.is_pair() {
                return Err(ModelError::IndicatorMismatch {
                    model: config.kind().to_string(),
                    needs: "a fast/slow pair",
                    indicator: indicator.label(),
                });
            }
            if c.zone.is_some() && !indicator.is_bounded() {
                return Err(ModelError::IndicatorMismatch {
                    model: config.kind().to_string(),
                    needs: "a bounded oscillator for its zone",
                    indicator: indicator.label(),
                });
            }
            Box::new(Crossover::new(c.clone())?)
        }
    };
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::signal::{ZoneGate, ZoneMode};

    #[test]
    fn default_is_ladder() {
        let model = build_model(&SignalConfig::default(), &IndicatorSpec::Rsi { period: 14 }).unwrap();
        assert_eq!(model.name(), "ladder_doorstep");
    }

    #[test]
    fn crossover_needs_pair_feed() {
        let cfg = SignalConfig::Crossover(CrossoverConfig::default());
        let err = build_model(&cfg, &IndicatorSpec::Rsi { period: 14 })
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::IndicatorMismatch { .. }));

        let ok = build_model(&cfg, &IndicatorSpec::EmaPair { fast: 9, slow: 21 });
        assert!(ok.is_ok());
    }

    #[test]
    fn zone_gate_needs_bounded_feed() {
        let cfg = SignalConfig::Crossover(CrossoverConfig {
            zone: Some(ZoneGate {
                oversold: 20.0,
                overbought: 80.0,
                mode: ZoneMode::Armed,
            }),
            ..CrossoverConfig::default()
        });
        let err = build_model(&cfg, &IndicatorSpec::EmaPair { fast: 5, slow: 13 })
            .err()
            .unwrap();
        assert!(matches!(err, ModelError::IndicatorMismatch { .. }));

        let hybrid = IndicatorSpec::EmaStochastic {
            fast: 5,
            slow: 13,
            k_period: 14,
            k_smooth: 3,
        };
        assert!(build_model(&cfg, &hybrid).is_ok());
    }

    #[test]
    fn bad_indicator_rejected_first() {
        let cfg = SignalConfig::Crossover(CrossoverConfig::default());
        let err = build_model(&cfg, &IndicatorSpec::EmaPair { fast: 21, slow: 9 })
            .err()
            .unwrap();
        assert_eq!(err, ModelError::PeriodOrder { fast: 21, slow: 9 });
    }

    #[test]
    fn with_doorstep_only_touches_models_that_have_one() {
        let ladder = SignalConfig::default().with_doorstep(4.5);
        assert_eq!(ladder.doorstep(), Some(4.5));
        let cross = SignalConfig::Crossover(CrossoverConfig::default()).with_doorstep(4.5);
        assert_eq!(cross.doorstep(), None);
    }

    #[test]
    fn with_entry_band_sets_one_sided_band() {
        let cfg = SignalConfig::default().with_entry_band(Some(2.0));
        match cfg {
            SignalConfig::LadderDoorstep(c) => {
                assert_eq!(c.entry, EntryShape::OneSided { entry_band: Some(2.0) })
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn deserializes_tagged_with_defaults() {
        let cfg: SignalConfig = toml::from_str("kind = \"pivot_breakout\"\ndoorstep = 7.0").unwrap();
        match cfg {
            SignalConfig::PivotBreakout(c) => {
                assert_eq!(c.pivot, 50.0);
                assert_eq!(c.doorstep, 7.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

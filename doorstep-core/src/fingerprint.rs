//! Run fingerprinting — deterministic identification of strategy configurations.
//!
//! - `StrategyConfig`: indicator + signal model + exit policy + engine settings.
//! - `structural_hash`: component kinds only (no parameter values), for grouping.
//! - `full_hash`: kinds plus every parameter, for exact deduplication.
//! - `RunFingerprint`: the record written next to backtest artifacts.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::components::exit::ExitPolicy;
use crate::components::factory::{ModelError, SignalConfig};
use crate::domain::Candle;
use crate::engine::{Engine, EngineSettings};
use crate::indicators::IndicatorSpec;

/// BLAKE3 digest, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(String);

impl ConfigHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for file names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything that decides how one symbol trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub indicator: IndicatorSpec,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub exit: ExitPolicy,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl StrategyConfig {
    /// Structural hash: indicator, model and take-profit kinds only.
    ///
    /// Two ladder strategies with different doorsteps share a
    /// `structural_hash` but not a `full_hash`.
    pub fn structural_hash(&self) -> ConfigHash {
        let indicator_kind = match self.indicator {
            IndicatorSpec::Rsi { .. } => "rsi",
            IndicatorSpec::EmaPair { .. } => "ema_pair",
            IndicatorSpec::Stochastic { .. } => "stochastic",
            IndicatorSpec::EmaStochastic { .. } => "ema_stochastic",
        };
        let structural = format!(
            "{}+{}+{}+sl:{}",
            indicator_kind,
            self.signal.kind(),
            self.exit.take_profit.name(),
            self.exit.stop_loss_roe.is_some(),
        );
        ConfigHash::from_bytes(structural.as_bytes())
    }

    /// Full hash over the canonical JSON encoding (struct fields serialize in
    /// declaration order).
    pub fn full_hash(&self) -> Result<ConfigHash, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(ConfigHash::from_bytes(json.as_bytes()))
    }

    pub fn build_engine(&self) -> Result<Engine, ModelError> {
        Engine::build(&self.signal, self.exit, self.engine, &self.indicator)
    }
}

/// Hash of a candle series, so artifacts name the data they came from.
pub fn dataset_hash(candles: &[Candle]) -> ConfigHash {
    let mut hasher = blake3::Hasher::new();
    for c in candles {
        hasher.update(&c.bar_id().to_le_bytes());
        for v in [c.open, c.high, c.low, c.close, c.volume] {
            hasher.update(&v.to_le_bytes());
        }
    }
    ConfigHash(hasher.finalize().to_hex().to_string())
}

/// Complete fingerprint of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    // ── Identity ──
    pub timestamp: DateTime<Utc>,
    pub seed: Option<u64>,

    // ── Data ──
    pub symbol: String,
    pub timeframe: String,
    pub bars: usize,
    pub first_bar: Option<DateTime<Utc>>,
    pub last_bar: Option<DateTime<Utc>>,

    // ── Configuration ──
    pub strategy: StrategyConfig,

    // ── Derived hashes ──
    pub structural_hash: ConfigHash,
    pub full_hash: ConfigHash,
    pub dataset_hash: ConfigHash,
}

impl RunFingerprint {
    pub fn new(
        symbol: &str,
        timeframe: &str,
        strategy: &StrategyConfig,
        candles: &[Candle],
        seed: Option<u64>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            timestamp: Utc::now(),
            seed,
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
            bars: candles.len(),
            first_bar: candles.first().map(|c| c.open_time),
            last_bar: candles.last().map(|c| c.open_time),
            strategy: strategy.clone(),
            structural_hash: strategy.structural_hash(),
            full_hash: strategy.full_hash()?,
            dataset_hash: dataset_hash(candles),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::exit::TakeProfitPolicy;
    use crate::indicators::make_candles;

    fn sample_config() -> StrategyConfig {
        StrategyConfig {
            indicator: IndicatorSpec::Rsi { period: 14 },
            signal: SignalConfig::default(),
            exit: ExitPolicy {
                stop_loss_roe: Some(20.0),
                take_profit: TakeProfitPolicy::Trailing {
                    roe: 10.0,
                    doorstep_close: 3.0,
                },
            },
            engine: EngineSettings::default(),
        }
    }

    #[test]
    fn structural_hash_ignores_params() {
        let c1 = sample_config();
        let mut c2 = sample_config();
        c2.signal = c2.signal.with_doorstep(5.0);

        assert_eq!(c1.structural_hash(), c2.structural_hash());
        assert_ne!(c1.full_hash().unwrap(), c2.full_hash().unwrap());
    }

    #[test]
    fn structural_hash_differs_for_different_policy() {
        let c1 = sample_config();
        let mut c2 = sample_config();
        c2.exit.take_profit = TakeProfitPolicy::Immediate { roe: 10.0 };
        assert_ne!(c1.structural_hash(), c2.structural_hash());
    }

    #[test]
    fn hashing_is_deterministic_across_roundtrip() {
        let config = sample_config();
        let json = serde_json::to_string(&config).unwrap();
        let back: StrategyConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
        assert_eq!(config.full_hash().unwrap(), back.full_hash().unwrap());
    }

    #[test]
    fn dataset_hash_tracks_data() {
        let a = make_candles(&[1.0, 2.0, 3.0]);
        let b = make_candles(&[1.0, 2.0, 3.5]);
        assert_eq!(dataset_hash(&a), dataset_hash(&a));
        assert_ne!(dataset_hash(&a), dataset_hash(&b));
        assert_eq!(dataset_hash(&a).short().len(), 12);
    }

    #[test]
    fn builds_engine() {
        assert!(sample_config().build_engine().is_ok());
        let mut bad = sample_config();
        bad.exit.take_profit = TakeProfitPolicy::IndicatorTrail {
            arm_distance: 20.0,
            close_band: 4.0,
        };
        assert!(matches!(
            bad.build_engine().unwrap_err(),
            ModelError::PolicyMismatch { .. }
        ));
    }

    #[test]
    fn fingerprint_records_range() {
        let candles = make_candles(&[1.0, 2.0, 3.0]);
        let fp = RunFingerprint::new("BTCUSDT", "1m", &sample_config(), &candles, Some(7)).unwrap();
        assert_eq!(fp.bars, 3);
        assert_eq!(fp.first_bar, Some(candles[0].open_time));
        assert_eq!(fp.seed, Some(7));
    }
}

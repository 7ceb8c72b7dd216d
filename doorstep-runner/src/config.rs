//! TOML application config: engine knobs, exit policy, signal model, paper
//! broker, the symbol list and an optional sweep grid.
//!
//! ```toml
//! [engine]
//! leverage = 10
//! cooldown_bars = 1
//! poll_interval_secs = 60
//!
//! [exit]
//! stop_loss_roe = 20.0
//! take_profit = { kind = "trailing", roe = 10.0, doorstep_close = 3.0 }
//!
//! [signal]
//! kind = "ladder_doorstep"
//! doorstep = 3.0
//!
//! [[symbols]]
//! symbol = "BTCUSDT"
//! interval = "15m"
//! indicator = { kind = "rsi", period = 14 }
//! ```
//!
//! A symbol whose strategy does not build is rejected and skipped; the rest
//! still run. Problems that affect every symbol fail the whole config.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use doorstep_core::broker::{Feed, PaperConfig};
use doorstep_core::components::{ExitPolicy, ModelError, SignalConfig};
use doorstep_core::domain::{Interval, SymbolId};
use doorstep_core::engine::{Engine, EngineSettings};
use doorstep_core::fingerprint::StrategyConfig;
use doorstep_core::indicators::IndicatorSpec;

use crate::sweep::SweepGrid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no symbols configured")]
    NoSymbols,
    #[error("symbol '{0}' is configured more than once")]
    DuplicateSymbol(SymbolId),
    #[error("interval '{interval}' of {symbol} is not a bar length")]
    BadInterval { symbol: SymbolId, interval: Interval },
    #[error("invalid {name}: {reason}")]
    Invalid { name: String, reason: String },
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// `[engine]`: settings shared by every symbol plus the poll cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    #[serde(flatten)]
    pub settings: EngineSettings,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    60
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            settings: EngineSettings::default(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// One `[[symbols]]` entry. `signal` and `exit` override the top-level
/// sections for this symbol only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: SymbolId,
    pub interval: Interval,
    pub indicator: IndicatorSpec,
    #[serde(default)]
    pub signal: Option<SignalConfig>,
    #[serde(default)]
    pub exit: Option<ExitPolicy>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub exit: ExitPolicy,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub broker: PaperConfig,
    #[serde(default)]
    pub symbols: Vec<SymbolConfig>,
    #[serde(default)]
    pub sweep: Option<SweepGrid>,
}

/// The effective, buildable configuration of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSetup {
    pub symbol: SymbolId,
    pub interval: Interval,
    pub strategy: StrategyConfig,
}

impl SymbolSetup {
    pub fn feed(&self) -> Feed {
        Feed {
            interval: self.interval.clone(),
            indicator: self.strategy.indicator.clone(),
        }
    }

    pub fn build_engine(&self) -> Result<Engine, ModelError> {
        self.strategy.build_engine()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedSymbol {
    pub symbol: SymbolId,
    pub error: ModelError,
}

/// Outcome of `AppConfig::validate`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    pub setups: Vec<SymbolSetup>,
    pub rejected: Vec<RejectedSymbol>,
}

impl ValidatedConfig {
    pub fn setup(&self, symbol: &SymbolId) -> Option<&SymbolSetup> {
        self.setups.iter().find(|s| &s.symbol == symbol)
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn strategy_for(&self, symbol: &SymbolConfig) -> StrategyConfig {
        StrategyConfig {
            indicator: symbol.indicator.clone(),
            signal: symbol.signal.clone().unwrap_or_else(|| self.signal.clone()),
            exit: symbol.exit.unwrap_or(self.exit),
            engine: self.engine.settings,
        }
    }

    /// Check the whole config, then build every symbol's strategy.
    ///
    /// Shared sections (engine, broker, sweep, the symbol list itself) fail
    /// the config. A symbol whose own strategy is invalid lands in
    /// `rejected` and is left out of `setups`.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        self.engine.settings.validate()?;
        self.broker.validate()?;
        if self.engine.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "engine.poll_interval_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        if let Some(grid) = &self.sweep {
            grid.validate()?;
        }
        if self.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }

        let mut seen = BTreeSet::new();
        let mut setups = Vec::with_capacity(self.symbols.len());
        let mut rejected = Vec::new();
        for entry in &self.symbols {
            if !seen.insert(entry.symbol.clone()) {
                return Err(ConfigError::DuplicateSymbol(entry.symbol.clone()));
            }
            if entry.interval.duration().is_none() {
                return Err(ConfigError::BadInterval {
                    symbol: entry.symbol.clone(),
                    interval: entry.interval.clone(),
                });
            }
            let strategy = self.strategy_for(entry);
            match strategy.build_engine() {
                Ok(_) => setups.push(SymbolSetup {
                    symbol: entry.symbol.clone(),
                    interval: entry.interval.clone(),
                    strategy,
                }),
                Err(error) => {
                    warn!(symbol = %entry.symbol, %error, "symbol rejected, skipping");
                    rejected.push(RejectedSymbol {
                        symbol: entry.symbol.clone(),
                        error,
                    });
                }
            }
        }
        Ok(ValidatedConfig { setups, rejected })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doorstep_core::components::TakeProfitPolicy;

    const SAMPLE: &str = r#"
[engine]
leverage = 5
cooldown_bars = 2
prefer_short_on_tie = false
poll_interval_secs = 30

[exit]
stop_loss_roe = 20.0
take_profit = { kind = "trailing", roe = 10.0, doorstep_close = 3.0 }

[signal]
kind = "ladder_doorstep"
doorstep = 4.0

[broker]
initial_equity = 500.0
fee_rate = 0.0005

[[symbols]]
symbol = "BTCUSDT"
interval = "15m"
indicator = { kind = "rsi", period = 14 }

[[symbols]]
symbol = "ETHUSDT"
interval = "1h"
indicator = { kind = "ema_pair", fast = 9, slow = 21 }
signal = { kind = "crossover", min_gap = 0.5 }
exit = { stop_loss_roe = 15.0 }
"#;

    #[test]
    fn parses_all_sections() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.engine.settings.leverage, 5.0);
        assert_eq!(config.engine.settings.cooldown_bars, 2);
        assert!(!config.engine.settings.prefer_short_on_tie);
        assert!(config.engine.settings.consume_opposite_on_close);
        assert_eq!(config.engine.poll_interval_secs, 30);
        assert_eq!(config.exit.stop_loss_roe, Some(20.0));
        assert_eq!(
            config.exit.take_profit,
            TakeProfitPolicy::Trailing {
                roe: 10.0,
                doorstep_close: 3.0
            }
        );
        assert_eq!(config.signal.doorstep(), Some(4.0));
        assert_eq!(config.broker.initial_equity, 500.0);
        assert_eq!(config.broker.allocation, 1.0);
        assert_eq!(config.symbols.len(), 2);
        assert!(config.sweep.is_none());
    }

    #[test]
    fn symbol_overrides_replace_shared_sections() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let eth = config.strategy_for(&config.symbols[1]);
        assert_eq!(eth.signal.kind(), "crossover");
        assert_eq!(eth.exit.stop_loss_roe, Some(15.0));
        assert_eq!(eth.exit.take_profit, TakeProfitPolicy::None);
        assert_eq!(eth.engine.cooldown_bars, 2);

        let btc = config.strategy_for(&config.symbols[0]);
        assert_eq!(btc.signal.kind(), "ladder_doorstep");
    }

    #[test]
    fn validate_builds_every_symbol() {
        let validated = AppConfig::from_toml(SAMPLE).unwrap().validate().unwrap();
        assert_eq!(validated.setups.len(), 2);
        assert!(validated.rejected.is_empty());
        let eth = validated.setup(&SymbolId::from("ETHUSDT")).unwrap();
        assert_eq!(eth.feed().interval.as_str(), "1h");
    }

    #[test]
    fn invalid_symbol_is_skipped_not_fatal() {
        let toml = r#"
[[symbols]]
symbol = "BTCUSDT"
interval = "15m"
indicator = { kind = "rsi", period = 14 }

[[symbols]]
symbol = "XRPUSDT"
interval = "15m"
indicator = { kind = "ema_pair", fast = 21, slow = 9 }
signal = { kind = "crossover" }
"#;
        let validated = AppConfig::from_toml(toml).unwrap().validate().unwrap();
        assert_eq!(validated.setups.len(), 1);
        assert_eq!(validated.rejected.len(), 1);
        assert_eq!(validated.rejected[0].symbol.as_str(), "XRPUSDT");
        assert_eq!(
            validated.rejected[0].error,
            ModelError::PeriodOrder { fast: 21, slow: 9 }
        );
    }

    #[test]
    fn crossover_on_rsi_feed_is_rejected() {
        let toml = r#"
[signal]
kind = "crossover"

[[symbols]]
symbol = "BTCUSDT"
interval = "15m"
indicator = { kind = "rsi", period = 14 }
"#;
        let validated = AppConfig::from_toml(toml).unwrap().validate().unwrap();
        assert!(validated.setups.is_empty());
        assert!(matches!(
            validated.rejected[0].error,
            ModelError::IndicatorMismatch { .. }
        ));
    }

    #[test]
    fn duplicate_symbols_fail_the_config() {
        let toml = r#"
[[symbols]]
symbol = "BTCUSDT"
interval = "15m"
indicator = { kind = "rsi", period = 14 }

[[symbols]]
symbol = "BTCUSDT"
interval = "1h"
indicator = { kind = "rsi", period = 7 }
"#;
        let err = AppConfig::from_toml(toml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSymbol(s) if s.as_str() == "BTCUSDT"));
    }

    #[test]
    fn empty_symbol_list_fails() {
        let err = AppConfig::from_toml("").unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::NoSymbols));
    }

    #[test]
    fn bad_interval_fails() {
        let toml = r#"
[[symbols]]
symbol = "BTCUSDT"
interval = "fortnight"
indicator = { kind = "rsi", period = 14 }
"#;
        let err = AppConfig::from_toml(toml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::BadInterval { .. }));
    }

    #[test]
    fn invalid_broker_fails() {
        let toml = r#"
[broker]
allocation = 1.5

[[symbols]]
symbol = "BTCUSDT"
interval = "15m"
indicator = { kind = "rsi", period = 14 }
"#;
        let err = AppConfig::from_toml(toml).unwrap().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Model(ModelError::InvalidParam { .. })));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = AppConfig::from_toml("[engine\nleverage = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = AppConfig::from_file(Path::new("/nonexistent/doorstep.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/doorstep.toml"));
    }
}

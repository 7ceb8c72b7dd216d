//! Collaborator contracts — the exchange side of the state machine.
//!
//! The engine never talks to an exchange directly. It consumes:
//! - `IndicatorSource`: latest closed-bar id, price and indicator reading(s)
//! - `Broker`: entry/close orders plus unrealized PnL and ROE
//!
//! `PaperBroker` and `ReplaySource` are the in-process implementations used
//! by backtests, replays and tests.

pub mod paper;
pub mod replay;

pub use paper::{PaperBroker, PaperConfig};
pub use replay::ReplaySource;

use serde::{Deserialize, Serialize};

use crate::domain::{Interval, MarketSnapshot, Side, SymbolId};
use crate::indicators::IndicatorSpec;

/// Transient failure talking to a collaborator. The cycle that hit it is
/// skipped; the next pass retries naturally.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("fetch failed for {symbol}: {message}")]
    Fetch { symbol: String, message: String },
    #[error("order failed for {symbol}: {message}")]
    Order { symbol: String, message: String },
    #[error("no market data for {0}")]
    MissingData(String),
}

/// What a symbol's indicator feed is made of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub interval: Interval,
    pub indicator: IndicatorSpec,
}

pub trait IndicatorSource {
    /// Latest closed-bar snapshot for `symbol`.
    fn snapshot(&mut self, symbol: &SymbolId, feed: &Feed) -> Result<MarketSnapshot, CollaboratorError>;

    /// A finite source that has served every evaluable bar of `symbol`.
    /// Live feeds never drain.
    fn is_drained(&self, _symbol: &SymbolId) -> bool {
        false
    }
}

/// Result of an entry request. `price: None` or `quantity <= 0` means the
/// order could not be filled (below minimum size, no liquidity); that is a
/// normal outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntryFill {
    pub price: Option<f64>,
    pub quantity: f64,
    pub fee: f64,
}

impl EntryFill {
    pub fn unfilled() -> Self {
        Self {
            price: None,
            quantity: 0.0,
            fee: 0.0,
        }
    }

    pub fn is_filled(&self) -> bool {
        matches!(self.price, Some(p) if p > 0.0) && self.quantity > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseFill {
    pub price: f64,
    pub fee: f64,
}

pub trait Broker {
    /// Open a position of `side` at market with `leverage`.
    fn enter_position(
        &mut self,
        symbol: &SymbolId,
        side: Side,
        leverage: f64,
    ) -> Result<EntryFill, CollaboratorError>;

    /// Reduce-only close of the full position on `side`.
    fn close_position(&mut self, symbol: &SymbolId, side: Side) -> Result<CloseFill, CollaboratorError>;

    fn unrealized_pnl(&self, symbol: &SymbolId) -> Result<f64, CollaboratorError>;

    /// Unrealized return on margin, percent.
    fn roe(&self, symbol: &SymbolId) -> Result<f64, CollaboratorError>;

    /// Latest price seen by the engine. Live brokers price from the exchange
    /// and ignore it.
    fn observe_price(&mut self, _symbol: &SymbolId, _price: f64) {}
}

//! Position side and the single live position per symbol.

use super::candle::BarId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable position state. `Flat` is both the initial and terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

impl PositionSide {
    pub fn as_str(self) -> &'static str {
        match self {
            PositionSide::Flat => "FLAT",
            PositionSide::Long => "LONG",
            PositionSide::Short => "SHORT",
        }
    }
}

impl From<Option<Side>> for PositionSide {
    fn from(side: Option<Side>) -> Self {
        match side {
            None => PositionSide::Flat,
            Some(Side::Long) => PositionSide::Long,
            Some(Side::Short) => PositionSide::Short,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A live leveraged position.
///
/// FLAT is modelled as the absence of a `Position` (`Option<Position>`), so
/// an open position always carries a side, a positive quantity and an entry
/// price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_price: f64,
    pub quantity: f64,
    pub initial_margin: f64,
    pub opened_at_bar: BarId,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Profit at `price` in quote currency, before fees.
    pub fn pnl_at(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.quantity
    }

    /// Return on margin at `price`, in percent.
    ///
    /// LONG: `(price - entry) * qty / margin * 100`; SHORT mirrors the sign.
    pub fn roe_at(&self, price: f64) -> f64 {
        if self.initial_margin <= 0.0 {
            return 0.0;
        }
        self.pnl_at(price) / self.initial_margin * 100.0
    }
}

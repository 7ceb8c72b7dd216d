//! TradeRecord and TransitionRecord — what the engine reports after a fill.

use super::candle::BarId;
use super::position::{PositionSide, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    #[serde(rename = "SL")]
    StopLoss,
    #[serde(rename = "TP")]
    TakeProfit,
    #[serde(rename = "XC")]
    OppositeSignal,
}

impl ExitReason {
    pub fn code(self) -> &'static str {
        match self {
            ExitReason::StopLoss => "SL",
            ExitReason::TakeProfit => "TP",
            ExitReason::OppositeSignal => "XC",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A complete round-trip trade: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: Side,

    // ── Entry ──
    pub entry_bar: BarId,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    // ── Exit ──
    pub exit_bar: BarId,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,

    // ── Size ──
    pub quantity: f64,
    pub initial_margin: f64,

    // ── Result ──
    pub pnl: f64,
    /// Realized return on margin, percent.
    pub roe: f64,
    pub fees: f64,
    pub reason: ExitReason,
}

impl TradeRecord {
    pub fn net_pnl(&self) -> f64 {
        self.pnl - self.fees
    }

    pub fn is_winner(&self) -> bool {
        self.net_pnl() > 0.0
    }
}

/// One row of backtest output, in the column order consumers expect:
/// `datetime, symbol, timeframe, close, indicator_value(s), position, remark,
/// entry_price, unrealized_pnl, roe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub datetime: DateTime<Utc>,
    pub symbol: String,
    pub timeframe: String,
    pub close: f64,
    pub indicator_values: Vec<f64>,
    pub position: PositionSide,
    pub remark: String,
    pub entry_price: Option<f64>,
    pub unrealized_pnl: f64,
    pub roe: f64,
}

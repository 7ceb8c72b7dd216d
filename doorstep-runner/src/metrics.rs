//! Performance metrics — pure functions over the trade list and equity curve.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! ROE figures are in percent of margin, as the engine reports them.

use serde::{Deserialize, Serialize};
use doorstep_core::domain::{ExitReason, TradeRecord};

/// Closed-trade counts by exit reason.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitCounts {
    pub stop_loss: usize,
    pub take_profit: usize,
    pub opposite_signal: usize,
}

impl ExitCounts {
    pub fn from_trades(trades: &[TradeRecord]) -> Self {
        let mut counts = Self::default();
        for t in trades {
            match t.reason {
                ExitReason::StopLoss => counts.stop_loss += 1,
                ExitReason::TakeProfit => counts.take_profit += 1,
                ExitReason::OppositeSignal => counts.opposite_signal += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.stop_loss + self.take_profit + self.opposite_signal
    }
}

/// Aggregate results of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub trade_count: usize,
    pub win_rate: f64,
    /// Sum of realized ROE over all trades, percent.
    pub total_roe: f64,
    pub avg_roe: f64,
    pub total_pnl: f64,
    pub profit_factor: f64,
    /// Largest peak-to-trough equity decline, as a negative fraction.
    pub max_drawdown: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub max_consecutive_losses: usize,
    pub exits: ExitCounts,
}

impl BacktestMetrics {
    pub fn compute(equity_curve: &[f64], trades: &[TradeRecord], final_equity: f64) -> Self {
        Self {
            trade_count: trades.len(),
            win_rate: win_rate(trades),
            total_roe: total_roe(trades),
            avg_roe: avg_roe(trades),
            total_pnl: trades.iter().map(TradeRecord::net_pnl).sum(),
            profit_factor: profit_factor(trades),
            max_drawdown: max_drawdown(equity_curve),
            final_equity,
            total_return: total_return(equity_curve),
            max_consecutive_losses: max_consecutive_losses(trades),
            exits: ExitCounts::from_trades(trades),
        }
    }
}

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;

    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (eq - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Fraction of trades closed with a positive net PnL.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

pub fn total_roe(trades: &[TradeRecord]) -> f64 {
    trades.iter().map(|t| t.roe).sum()
}

pub fn avg_roe(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    total_roe(trades) / trades.len() as f64
}

/// Profit factor: gross profits / gross losses.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let (gross_profit, gross_loss) = trades.iter().map(TradeRecord::net_pnl).fold(
        (0.0_f64, 0.0_f64),
        |(gain, loss), pnl| {
            if pnl > 0.0 {
                (gain + pnl, loss)
            } else {
                (gain, loss - pnl)
            }
        },
    );

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

/// Longest run of consecutive losing trades.
pub fn max_consecutive_losses(trades: &[TradeRecord]) -> usize {
    let mut best = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() {
            current = 0;
        } else {
            current += 1;
            best = best.max(current);
        }
    }
    best
}

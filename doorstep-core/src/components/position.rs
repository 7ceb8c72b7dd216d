//! PositionManager — the only owner of a symbol's live position.
//!
//! States: `FLAT → LONG → FLAT` and `FLAT → SHORT → FLAT`. A reversal is a
//! close followed by an entry; the manager never flips sides in one call.
//! Both transitions go through the broker first and only touch local state
//! once the broker call has succeeded.

use serde::{Deserialize, Serialize};

use super::cooldown::CooldownState;
use crate::broker::{Broker, CollaboratorError};
use crate::domain::{ExitReason, MarketSnapshot, Position, PositionSide, Side, SymbolId, TradeRecord};

/// Result of an entry request that reached the broker without error.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    Opened(Position),
    /// Non-fillable order (`quantity <= 0` or no price). State is unchanged.
    Abandoned { price: Option<f64>, quantity: f64 },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PositionManager {
    position: Option<Position>,
    entry_fee: f64,
}

impl PositionManager {
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn side(&self) -> PositionSide {
        self.position.as_ref().map(|p| p.side).into()
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Seed a position that already exists at the exchange.
    pub fn restore(&mut self, position: Position) {
        self.position = Some(position);
        self.entry_fee = 0.0;
    }

    /// Open `side` at market. Calling this while a position is open is a
    /// caller bug; the request is dropped without reaching the broker.
    pub fn enter(
        &mut self,
        broker: &mut dyn Broker,
        symbol: &SymbolId,
        side: Side,
        leverage: f64,
        at: &MarketSnapshot,
    ) -> Result<EntryOutcome, CollaboratorError> {
        debug_assert!(self.position.is_none(), "enter() while in a position");
        if self.position.is_some() {
            return Ok(EntryOutcome::Abandoned {
                price: None,
                quantity: 0.0,
            });
        }

        let fill = broker.enter_position(symbol, side, leverage)?;
        let price = match fill.price {
            Some(p) if fill.is_filled() => p,
            _ => {
                return Ok(EntryOutcome::Abandoned {
                    price: fill.price,
                    quantity: fill.quantity,
                })
            }
        };

        let position = Position {
            side,
            entry_price: price,
            quantity: fill.quantity,
            initial_margin: price * fill.quantity / leverage.max(1.0),
            opened_at_bar: at.bar_id,
            opened_at: at.time,
        };
        self.position = Some(position.clone());
        self.entry_fee = fill.fee;
        Ok(EntryOutcome::Opened(position))
    }

    /// Close the full position for `reason` and re-arm the cooldown. Returns
    /// `None` when already flat.
    pub fn close(
        &mut self,
        broker: &mut dyn Broker,
        symbol: &SymbolId,
        reason: ExitReason,
        at: &MarketSnapshot,
        cooldown: &mut CooldownState,
        cooldown_bars: u32,
    ) -> Result<Option<TradeRecord>, CollaboratorError> {
        let Some(position) = self.position.as_ref() else {
            return Ok(None);
        };
        let fill = broker.close_position(symbol, position.side)?;

        let trade = TradeRecord {
            symbol: symbol.to_string(),
            side: position.side,
            entry_bar: position.opened_at_bar,
            entry_time: position.opened_at,
            entry_price: position.entry_price,
            exit_bar: at.bar_id,
            exit_time: at.time,
            exit_price: fill.price,
            quantity: position.quantity,
            initial_margin: position.initial_margin,
            pnl: position.pnl_at(fill.price),
            roe: position.roe_at(fill.price),
            fees: self.entry_fee + fill.fee,
            reason,
        };
        self.position = None;
        self.entry_fee = 0.0;
        cooldown.arm(cooldown_bars);
        Ok(Some(trade))
    }
}

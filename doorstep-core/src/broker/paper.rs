//! Paper broker — simulated fills against the last observed price.
//!
//! Sizing follows the exchange scripts: margin = available balance ×
//! allocation, notional = margin × leverage, quantity = notional / fill
//! price. The available balance is realized equity minus the margin already
//! committed to open positions, so symbols sharing one broker never commit
//! more than the account holds.
//! Fees are charged on notional at entry and exit; slippage moves every fill
//! against the trader.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Broker, CloseFill, CollaboratorError, EntryFill};
use crate::components::factory::ModelError;
use crate::domain::{Side, SymbolId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperConfig {
    pub initial_equity: f64,
    /// Fraction of the available balance committed as margin per entry.
    pub allocation: f64,
    pub fee_rate: f64,
    pub slippage_rate: f64,
    /// Orders with a smaller notional are not filled.
    pub min_notional: f64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_equity: 1_000.0,
            allocation: 1.0,
            fee_rate: 0.0,
            slippage_rate: 0.0,
            min_notional: 0.0,
        }
    }
}

impl PaperConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        let checks = [
            ("initial_equity", self.initial_equity, self.initial_equity > 0.0),
            (
                "allocation",
                self.allocation,
                self.allocation > 0.0 && self.allocation <= 1.0,
            ),
            ("fee_rate", self.fee_rate, (0.0..1.0).contains(&self.fee_rate)),
            (
                "slippage_rate",
                self.slippage_rate,
                (0.0..1.0).contains(&self.slippage_rate),
            ),
            ("min_notional", self.min_notional, self.min_notional >= 0.0),
        ];
        for (name, value, ok) in checks {
            if !ok || !value.is_finite() {
                return Err(ModelError::InvalidParam {
                    name: format!("broker.{name}"),
                    reason: format!("out of range: {value}"),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PaperPosition {
    side: Side,
    entry_price: f64,
    quantity: f64,
    margin: f64,
}

impl PaperPosition {
    fn pnl_at(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.quantity
    }
}

#[derive(Debug, Clone)]
pub struct PaperBroker {
    config: PaperConfig,
    equity: f64,
    fees_paid: f64,
    marks: HashMap<SymbolId, f64>,
    open: HashMap<SymbolId, PaperPosition>,
}

impl PaperBroker {
    pub fn new(config: PaperConfig) -> Self {
        Self {
            equity: config.initial_equity,
            config,
            fees_paid: 0.0,
            marks: HashMap::new(),
            open: HashMap::new(),
        }
    }

    pub fn mark(&mut self, symbol: &SymbolId, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.marks.insert(symbol.clone(), price);
        }
    }

    /// Realized equity (after fees), excluding open positions.
    pub fn equity(&self) -> f64 {
        self.equity
    }

    /// Realized equity plus unrealized PnL of every open position.
    pub fn mark_to_market(&self) -> f64 {
        self.equity
            + self
                .open
                .iter()
                .filter_map(|(s, p)| self.marks.get(s).map(|&m| p.pnl_at(m)))
                .sum::<f64>()
    }

    /// Realized equity not committed as margin.
    pub fn available(&self) -> f64 {
        let committed: f64 = self.open.values().map(|p| p.margin).sum();
        (self.equity - committed).max(0.0)
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    pub fn has_position(&self, symbol: &SymbolId) -> bool {
        self.open.contains_key(symbol)
    }

    fn fill_price(&self, mark: f64, buying: bool) -> f64 {
        if buying {
            mark * (1.0 + self.config.slippage_rate)
        } else {
            mark * (1.0 - self.config.slippage_rate)
        }
    }

    fn last_mark(&self, symbol: &SymbolId) -> Result<f64, CollaboratorError> {
        self.marks
            .get(symbol)
            .copied()
            .ok_or_else(|| CollaboratorError::MissingData(symbol.to_string()))
    }
}

impl Broker for PaperBroker {
    fn enter_position(
        &mut self,
        symbol: &SymbolId,
        side: Side,
        leverage: f64,
    ) -> Result<EntryFill, CollaboratorError> {
        if self.open.contains_key(symbol) {
            return Err(CollaboratorError::Order {
                symbol: symbol.to_string(),
                message: "position already open".into(),
            });
        }
        let mark = self.last_mark(symbol)?;
        let leverage = leverage.max(1.0);
        let margin = self.available() * self.config.allocation;
        let notional = margin * leverage;
        if margin <= 0.0 || notional < self.config.min_notional {
            return Ok(EntryFill::unfilled());
        }

        let price = self.fill_price(mark, side == Side::Long);
        let quantity = notional / price;
        let fee = notional * self.config.fee_rate;
        self.equity -= fee;
        self.fees_paid += fee;
        self.open.insert(
            symbol.clone(),
            PaperPosition {
                side,
                entry_price: price,
                quantity,
                margin,
            },
        );
        Ok(EntryFill {
            price: Some(price),
            quantity,
            fee,
        })
    }

    fn close_position(&mut self, symbol: &SymbolId, side: Side) -> Result<CloseFill, CollaboratorError> {
        let mark = self.last_mark(symbol)?;
        let position = match self.open.get(symbol) {
            Some(p) if p.side == side => p.clone(),
            _ => {
                return Err(CollaboratorError::Order {
                    symbol: symbol.to_string(),
                    message: format!("no open {side} position"),
                })
            }
        };
        let price = self.fill_price(mark, side == Side::Short);
        let fee = price * position.quantity * self.config.fee_rate;
        self.equity += position.pnl_at(price) - fee;
        self.fees_paid += fee;
        self.open.remove(symbol);
        Ok(CloseFill { price, fee })
    }

    fn unrealized_pnl(&self, symbol: &SymbolId) -> Result<f64, CollaboratorError> {
        match self.open.get(symbol) {
            None => Ok(0.0),
            Some(p) => Ok(p.pnl_at(self.last_mark(symbol)?)),
        }
    }

    fn roe(&self, symbol: &SymbolId) -> Result<f64, CollaboratorError> {
        match self.open.get(symbol) {
            None => Ok(0.0),
            Some(p) if p.margin <= 0.0 => Ok(0.0),
            Some(p) => Ok(p.pnl_at(self.last_mark(symbol)?) / p.margin * 100.0),
        }
    }

    fn observe_price(&mut self, symbol: &SymbolId, price: f64) {
        self.mark(symbol, price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym() -> SymbolId {
        SymbolId::from("BTCUSDT")
    }

    fn broker(config: PaperConfig) -> PaperBroker {
        let mut b = PaperBroker::new(config);
        b.mark(&sym(), 100.0);
        b
    }

    #[test]
    fn sizing_uses_equity_and_leverage() {
        let mut b = broker(PaperConfig::default());
        let fill = b.enter_position(&sym(), Side::Long, 10.0).unwrap();
        assert_eq!(fill.price, Some(100.0));
        assert_eq!(fill.quantity, 100.0); // 1000 * 10 / 100
        assert!(b.has_position(&sym()));
    }

    #[test]
    fn roe_is_pnl_over_margin() {
        let mut b = broker(PaperConfig::default());
        b.enter_position(&sym(), Side::Long, 10.0).unwrap();
        b.mark(&sym(), 101.0);
        // pnl = 1 * 100 = 100, margin = 1000 → 10%
        assert!((b.roe(&sym()).unwrap() - 10.0).abs() < 1e-9);
        assert!((b.unrealized_pnl(&sym()).unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn short_close_realizes_profit() {
        let mut b = broker(PaperConfig::default());
        b.enter_position(&sym(), Side::Short, 2.0).unwrap();
        b.mark(&sym(), 90.0);
        let fill = b.close_position(&sym(), Side::Short).unwrap();
        assert_eq!(fill.price, 90.0);
        // qty = 2000 / 100 = 20, pnl = 20 * 10 = 200
        assert!((b.equity() - 1_200.0).abs() < 1e-9);
        assert!(!b.has_position(&sym()));
    }

    #[test]
    fn below_min_notional_is_unfilled_not_error() {
        let mut b = broker(PaperConfig {
            min_notional: 50_000.0,
            ..PaperConfig::default()
        });
        let fill = b.enter_position(&sym(), Side::Long, 10.0).unwrap();
        assert!(!fill.is_filled());
        assert!(!b.has_position(&sym()));
    }

    #[test]
    fn fees_and_slippage_cost_money() {
        let mut b = broker(PaperConfig {
            fee_rate: 0.001,
            slippage_rate: 0.001,
            ..PaperConfig::default()
        });
        b.enter_position(&sym(), Side::Long, 1.0).unwrap();
        b.close_position(&sym(), Side::Long).unwrap();
        assert!(b.equity() < 1_000.0);
        assert!(b.fees_paid() > 0.0);
    }

    #[test]
    fn missing_mark_is_an_error() {
        let mut b = PaperBroker::new(PaperConfig::default());
        let err = b.enter_position(&sym(), Side::Long, 1.0).unwrap_err();
        assert_eq!(err, CollaboratorError::MissingData("BTCUSDT".into()));
    }

    #[test]
    fn closing_wrong_side_is_an_error() {
        let mut b = broker(PaperConfig::default());
        b.enter_position(&sym(), Side::Long, 1.0).unwrap();
        assert!(b.close_position(&sym(), Side::Short).is_err());
        assert!(b.has_position(&sym()));
    }

    #[test]
    fn open_margin_is_not_sized_twice() {
        let eth = SymbolId::from("ETHUSDT");
        let mut b = broker(PaperConfig {
            allocation: 0.5,
            ..PaperConfig::default()
        });
        b.mark(&eth, 50.0);
        let first = b.enter_position(&sym(), Side::Long, 10.0).unwrap();
        assert_eq!(first.quantity, 50.0); // 500 margin * 10 / 100
        assert_eq!(b.available(), 500.0);
        let second = b.enter_position(&eth, Side::Short, 10.0).unwrap();
        assert_eq!(second.quantity, 50.0); // 250 margin * 10 / 50
        assert_eq!(b.available(), 250.0);

        b.close_position(&sym(), Side::Long).unwrap();
        assert_eq!(b.available(), 750.0);
    }

    #[test]
    fn full_allocation_leaves_nothing_for_a_second_symbol() {
        let eth = SymbolId::from("ETHUSDT");
        let mut b = broker(PaperConfig::default());
        b.mark(&eth, 50.0);
        assert!(b.enter_position(&sym(), Side::Long, 10.0).unwrap().is_filled());
        let second = b.enter_position(&eth, Side::Long, 10.0).unwrap();
        assert!(!second.is_filled());
        assert!(!b.has_position(&eth));
    }

    #[test]
    fn config_validation() {
        assert!(PaperConfig::default().validate().is_ok());
        let bad = PaperConfig {
            allocation: 1.5,
            ..PaperConfig::default()
        };
        assert!(bad.validate().is_err());
    }
}

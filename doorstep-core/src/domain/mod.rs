//! Domain types for the doorstep state machine.

pub mod candle;
pub mod ids;
pub mod position;
pub mod reading;
pub mod trade;

pub use candle::{BarId, Candle};
pub use ids::{Interval, SymbolId};
pub use position::{Position, PositionSide, Side};
pub use reading::{IndicatorReading, MarketSnapshot};
pub use trade::{ExitReason, TradeRecord, TransitionRecord};

//! Engine — drives the per-symbol state machine one cycle at a time.
//!
//! The same `Engine::step` serves the live poll loop and the backtest: a
//! backtest is just a deterministic sequence of snapshots with a paper broker.

pub mod state;
pub mod step;

pub use state::{EngineSettings, SymbolState};
pub use step::{CycleError, CycleOutcome, Engine, Transition};

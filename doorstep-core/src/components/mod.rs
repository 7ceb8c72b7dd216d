//! Components — the per-symbol state machine, one small piece per file.
//!
//! - `BarClock`: new-bar detection by bar id
//! - `LevelTracker` (+ `Ratchet`): arm on a switch, capture the extreme
//! - `EntryTrigger`: doorstep retrace entry and its guards
//! - `PositionManager`: FLAT/LONG/SHORT transitions through the broker
//! - `ExitPolicy`: SL → TP → XC, at most one exit per cycle
//! - `CooldownState` and `ReentryBlock`: entry gating after fills
//! - `SignalModel`: which arming scheme drives entries
//!
//! Plus the indicator trait for precomputed numeric series.

pub mod bar_clock;
pub mod cooldown;
pub mod exit;
pub mod factory;
pub mod indicator;
pub mod position;
pub mod ratchet;
pub mod reentry;
pub mod signal;
pub mod tracker;
pub mod trigger;

pub use bar_clock::BarClock;
pub use cooldown::CooldownState;
pub use exit::{ExitInputs, ExitPolicy, TakeProfitPolicy, TakeProfitState};
pub use factory::{build_model, ModelError, SignalConfig};
pub use indicator::Indicator;
pub use position::{EntryOutcome, PositionManager};
pub use ratchet::{Direction, Ratchet};
pub use reentry::{PivotSide, ReentryBlock};
pub use signal::{SignalModel, SignalState};
pub use tracker::{ArmState, LevelTracker, TrackerMode};
pub use trigger::{AllowedSides, EntryCandidates, EntryGuards, EntryShape, EntryTrigger};

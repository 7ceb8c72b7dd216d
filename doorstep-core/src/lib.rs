//! Doorstep Core — the indicator-driven position state machine.
//!
//! This crate contains:
//! - Domain types (candles, readings, positions, trades)
//! - Indicators (RSI, EMA pair, stochastic %K/%D)
//! - Components: level trackers, doorstep entry trigger, exit policy,
//!   cooldown, reentry block, position manager and signal models
//! - The per-symbol `Engine::step` cycle
//! - Collaborator traits (`IndicatorSource`, `Broker`) with paper/replay
//!   implementations
//! - Config fingerprinting and a deterministic RNG hierarchy

pub mod broker;
pub mod components;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod rng;

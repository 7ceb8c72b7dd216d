//! Property tests for state-machine invariants.
//!
//! Uses proptest to verify:
//! 1. Arm monotonicity — a captured extreme only moves away from neutral
//! 2. Doorstep correctness — a one-sided trigger fires exactly at/after the doorstep
//! 3. Stop-loss precedence — SL wins over TP and XC whenever its threshold is met
//! 4. Cooldown gating — no entry while bars remain on the cooldown
//! 5. Mutual exclusivity — a side change always passes through FLAT
//! 6. ROE sign symmetry — LONG and SHORT ROE mirror each other

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use doorstep_core::broker::{PaperBroker, PaperConfig};
use doorstep_core::components::signal::LadderConfig;
use doorstep_core::components::{
    ArmState, Direction, EntryShape, EntryTrigger, ExitInputs, ExitPolicy, LevelTracker,
    SignalConfig, TakeProfitPolicy, TakeProfitState, TrackerMode,
};
use doorstep_core::domain::{
    ExitReason, IndicatorReading, MarketSnapshot, Position, Side, SymbolId,
};
use doorstep_core::engine::{Engine, EngineSettings, Transition};
use doorstep_core::indicators::IndicatorSpec;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_reading() -> impl Strategy<Value = f64> {
    (0.0..100.0_f64).prop_map(|v| (v * 10.0).round() / 10.0)
}

fn arb_mode() -> impl Strategy<Value = TrackerMode> {
    prop_oneof![
        Just(TrackerMode::Continuous),
        Just(TrackerMode::Ladder {
            levels: vec![70.0, 75.0, 80.0, 84.0]
        }),
    ]
}

fn arb_side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::Long), Just(Side::Short)]
}

/// A bar: price, reading, and whether it repeats the previous bar id.
fn arb_bar() -> impl Strategy<Value = (f64, f64, bool)> {
    (95.0..105.0_f64, arb_reading(), prop::bool::weighted(0.2))
}

fn snapshot(bar_id: i64, price: f64, value: f64) -> MarketSnapshot {
    MarketSnapshot {
        bar_id,
        time: Utc.timestamp_millis_opt(bar_id * 60_000).unwrap(),
        price,
        reading: IndicatorReading::Single(value),
        prev_reading: None,
    }
}

// ── 1. Arm monotonicity ──────────────────────────────────────────────

proptest! {
    /// While armed, a peak extreme never decreases; extreme is present iff armed.
    #[test]
    fn peak_extreme_only_rises(mode in arb_mode(), values in prop::collection::vec(arb_reading(), 1..60)) {
        let mut tracker = LevelTracker::new(Direction::Peak, 72.0, mode).unwrap();
        let mut prev: Option<f64> = None;
        for v in values {
            let ArmState { armed, extreme_level } = tracker.on_reading(v);
            prop_assert_eq!(armed, extreme_level.is_some());
            if let (Some(p), Some(now)) = (prev, extreme_level) {
                prop_assert!(now >= p, "extreme fell from {} to {}", p, now);
            }
            prev = extreme_level.or(prev);
        }
    }

    /// Mirror for troughs, continuous mode: the extreme is the running minimum
    /// since arming.
    #[test]
    fn trough_extreme_is_running_min(values in prop::collection::vec(arb_reading(), 1..60)) {
        let mut tracker = LevelTracker::new(Direction::Trough, 28.0, TrackerMode::Continuous).unwrap();
        let mut running: Option<f64> = None;
        for v in values {
            if running.is_some() || v <= 28.0 {
                running = Some(running.map_or(v, |m: f64| m.min(v)));
            }
            prop_assert_eq!(tracker.on_reading(v).extreme_level, running);
        }
    }
}

// ── 2. Doorstep correctness ──────────────────────────────────────────

proptest! {
    #[test]
    fn one_sided_trigger_fires_iff_past_doorstep(
        extreme in 60.0..100.0_f64,
        doorstep in 0.0..10.0_f64,
        value in 0.0..100.0_f64,
    ) {
        let trigger = EntryTrigger::new(doorstep, EntryShape::default()).unwrap();
        let arm = ArmState { armed: true, extreme_level: Some(extreme) };
        prop_assert_eq!(trigger.fires(Direction::Peak, arm, value), value <= extreme - doorstep);
        prop_assert_eq!(
            trigger.fires(Direction::Trough, ArmState { armed: true, extreme_level: Some(100.0 - extreme) }, value),
            value >= 100.0 - extreme + doorstep
        );
        prop_assert!(!trigger.fires(Direction::Peak, ArmState::default(), value));
    }
}

// ── 3. Stop-loss precedence ──────────────────────────────────────────

proptest! {
    #[test]
    fn stop_loss_beats_everything(
        sl in 1.0..50.0_f64,
        excess in 0.0..50.0_f64,
        side in arb_side(),
        value in arb_reading(),
        opposite in any::<bool>(),
    ) {
        let policy = ExitPolicy {
            stop_loss_roe: Some(sl),
            // A TP threshold the losing ROE always satisfies.
            take_profit: TakeProfitPolicy::Immediate { roe: -1_000.0 },
        };
        let inputs = ExitInputs {
            side,
            roe: -sl - excess,
            value,
            opposite_signal: opposite,
            in_favour_zone: false,
            pivot: None,
        };
        let mut tp = TakeProfitState::default();
        prop_assert_eq!(policy.evaluate(&mut tp, &inputs), Some(ExitReason::StopLoss));
    }
}

// ── 4 & 5. Engine-level invariants ───────────────────────────────────

fn engine(cooldown_bars: u32, reverse_on_exit: bool) -> Engine {
    let signal = SignalConfig::LadderDoorstep(LadderConfig {
        close_doorstep: Some(6.0),
        ..LadderConfig::default()
    });
    let exit = ExitPolicy {
        stop_loss_roe: Some(25.0),
        take_profit: TakeProfitPolicy::Trailing {
            roe: 20.0,
            doorstep_close: 5.0,
        },
    };
    let settings = EngineSettings {
        cooldown_bars,
        reverse_on_exit,
        ..EngineSettings::default()
    };
    Engine::build(&signal, exit, settings, &IndicatorSpec::Rsi { period: 14 }).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn no_entry_while_cooling_down(
        cooldown in 0u32..4,
        bars in prop::collection::vec(arb_bar(), 1..120),
    ) {
        let engine = engine(cooldown, false);
        let mut state = engine.new_state();
        let mut broker = PaperBroker::new(PaperConfig::default());
        let symbol = SymbolId::from("BTCUSDT");
        let mut bar_id = 0i64;

        for (price, value, repeat) in bars {
            if !repeat {
                bar_id += 1;
            }
            let is_new = state.clock.last_bar_id() != Some(bar_id);
            let remaining = state.cooldown.bars_remaining().saturating_sub(u32::from(is_new));
            let out = engine.step(&symbol, &mut state, &snapshot(bar_id, price, value), &mut broker).unwrap();
            if remaining > 0 {
                prop_assert!(out.entry_side().is_none(), "entered with {} bars of cooldown left", remaining);
            }
        }
    }

    #[test]
    fn side_changes_pass_through_flat(
        reverse in any::<bool>(),
        bars in prop::collection::vec(arb_bar(), 1..120),
    ) {
        let engine = engine(0, reverse);
        let mut state = engine.new_state();
        let mut broker = PaperBroker::new(PaperConfig::default());
        let symbol = SymbolId::from("BTCUSDT");
        let mut bar_id = 0i64;

        for (price, value, repeat) in bars {
            if !repeat {
                bar_id += 1;
            }
            let before = state.position().map(|p| p.side);
            let out = engine.step(&symbol, &mut state, &snapshot(bar_id, price, value), &mut broker).unwrap();

            let exits = out.transitions.iter().filter(|t| matches!(t, Transition::Exited(_))).count();
            let entries = out.transitions.iter().filter(|t| matches!(t, Transition::Entered { .. })).count();
            prop_assert!(exits <= 1 && entries <= 1);

            if let Some(side) = out.entry_side() {
                // Either flat before, or the position was closed earlier this cycle.
                prop_assert!(before.is_none() || exits == 1);
                if let Some(prev) = before {
                    prop_assert_eq!(side, prev.opposite());
                }
                let last_is_entered = matches!(out.transitions.last(), Some(Transition::Entered { .. }));
                prop_assert!(last_is_entered);
            }
            if let Some(trade) = out.exit() {
                prop_assert_eq!(Some(trade.side), before);
            }
            prop_assert_eq!(state.position().map(|p| p.side), out.entry_side().or(if exits == 1 { None } else { before }));
        }
    }
}

// ── 6. ROE sign symmetry ─────────────────────────────────────────────

proptest! {
    #[test]
    fn roe_mirrors_between_sides(
        entry in 10.0..1_000.0_f64,
        exit in 10.0..1_000.0_f64,
        qty in 0.01..100.0_f64,
        leverage in 1.0..50.0_f64,
    ) {
        let position = |side| Position {
            side,
            entry_price: entry,
            quantity: qty,
            initial_margin: entry * qty / leverage,
            opened_at_bar: 0,
            opened_at: Utc.timestamp_millis_opt(0).unwrap(),
        };
        let long = position(Side::Long).roe_at(exit);
        let short = position(Side::Short).roe_at(exit);
        prop_assert!((long + short).abs() < 1e-6);
        prop_assert_eq!(long > 0.0, exit > entry);
    }
}

//! Doorstep CLI — backtest, sweep, replay and config tooling.
//!
//! Commands:
//! - `check` — validate a TOML config and list the symbols it would run
//! - `backtest` — backtest every configured symbol and save artifacts
//! - `sweep` — evaluate the config's `[sweep]` grid for one symbol
//! - `replay` — drive the poll loop over stored candles with the paper broker
//! - `synth` — write a seeded synthetic candle CSV

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use doorstep_core::broker::{PaperBroker, ReplaySource};
use doorstep_core::domain::{Candle, Interval, SymbolId};
use doorstep_runner::{
    load_candles, run_backtest, run_poll_loop, run_sweep, save_artifacts, save_candles,
    synthetic_candles, AppConfig, BacktestResult, PollContext, SweepResults, SymbolSetup,
    SyntheticSpec, ValidatedConfig,
};

#[derive(Parser)]
#[command(
    name = "doorstep",
    about = "Doorstep — indicator-extreme retrace trading engine"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where candles come from: CSV files named `{SYMBOL}.csv`, or a seeded
/// synthetic walk.
#[derive(Args, Clone)]
struct DataArgs {
    /// Directory holding one `{SYMBOL}.csv` per symbol.
    #[arg(long, conflicts_with = "synthetic")]
    data_dir: Option<PathBuf>,

    /// Generate this many synthetic bars per symbol instead of reading CSVs.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed for synthetic data.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config and list the symbols it would run.
    Check {
        #[arg(long)]
        config: PathBuf,
    },
    /// Backtest every configured symbol (or just one) and save artifacts.
    Backtest {
        #[arg(long)]
        config: PathBuf,

        /// Only this symbol.
        #[arg(long)]
        symbol: Option<String>,

        #[command(flatten)]
        data: DataArgs,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        out: PathBuf,
    },
    /// Evaluate the config's `[sweep]` grid for one symbol.
    Sweep {
        #[arg(long)]
        config: PathBuf,

        #[arg(long)]
        symbol: String,

        #[command(flatten)]
        data: DataArgs,

        /// Rows to print, best first.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Run the poll loop over stored candles, one bar per pass.
    Replay {
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Stop after this many passes (default: until every series is exhausted).
        #[arg(long)]
        passes: Option<usize>,

        /// Sleep `engine.poll_interval_secs` between passes.
        #[arg(long, default_value_t = false)]
        realtime: bool,
    },
    /// Write a seeded synthetic candle CSV.
    Synth {
        #[arg(long)]
        out: PathBuf,

        #[arg(long, default_value = "BTCUSDT")]
        symbol: String,

        #[arg(long, default_value = "15m")]
        interval: String,

        #[arg(long, default_value_t = 1_440)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Check { config } => run_check(&config),
        Commands::Backtest {
            config,
            symbol,
            data,
            out,
        } => run_backtest_cmd(&config, symbol.as_deref(), &data, &out),
        Commands::Sweep {
            config,
            symbol,
            data,
            top,
        } => run_sweep_cmd(&config, &symbol, &data, top),
        Commands::Replay {
            config,
            data,
            passes,
            realtime,
        } => run_replay_cmd(&config, &data, passes, realtime),
        Commands::Synth {
            out,
            symbol,
            interval,
            bars,
            seed,
        } => run_synth(&out, &symbol, &interval, bars, seed),
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load_config(path: &Path) -> Result<(AppConfig, ValidatedConfig)> {
    let config = AppConfig::from_file(path)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    let validated = config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    if validated.setups.is_empty() {
        bail!("no valid symbols in {}", path.display());
    }
    Ok((config, validated))
}

fn load_series(setup: &SymbolSetup, data: &DataArgs) -> Result<Vec<Candle>> {
    match (&data.data_dir, data.synthetic) {
        (Some(dir), _) => {
            let path = dir.join(format!("{}.csv", setup.symbol));
            load_candles(&path).with_context(|| format!("failed to load {}", path.display()))
        }
        (None, Some(bars)) => {
            let bar = setup
                .interval
                .duration()
                .with_context(|| format!("bad interval '{}'", setup.interval))?;
            let spec = SyntheticSpec {
                bars,
                ..SyntheticSpec::default()
            };
            warn!(symbol = %setup.symbol, seed = data.seed, "using SYNTHETIC data");
            Ok(synthetic_candles(&spec, &setup.symbol, bar, data.seed))
        }
        (None, None) => bail!("one of --data-dir or --synthetic is required"),
    }
}

fn run_check(path: &Path) -> Result<()> {
    let (config, validated) = load_config(path)?;

    println!("Config: {}", path.display());
    println!(
        "Engine: leverage {}x, cooldown {} bar(s), poll every {}s",
        config.engine.settings.leverage,
        config.engine.settings.cooldown_bars,
        config.engine.poll_interval_secs
    );
    println!();
    println!("{:<12} {:<6} {:<18} {:<16}", "Symbol", "TF", "Indicator", "Signal");
    println!("{}", "-".repeat(54));
    for setup in &validated.setups {
        println!(
            "{:<12} {:<6} {:<18} {:<16}",
            setup.symbol,
            setup.interval,
            setup.strategy.indicator.label(),
            setup.strategy.signal.kind()
        );
    }
    for rejected in &validated.rejected {
        println!("REJECTED {}: {}", rejected.symbol, rejected.error);
    }
    if let Some(grid) = &config.sweep {
        println!();
        println!("Sweep grid: {} point(s)", grid.size());
    }
    Ok(())
}

fn run_backtest_cmd(
    path: &Path,
    symbol: Option<&str>,
    data: &DataArgs,
    out: &Path,
) -> Result<()> {
    let (config, validated) = load_config(path)?;

    let setups: Vec<&SymbolSetup> = match symbol {
        Some(s) => {
            let id = SymbolId::from(s);
            let setup = validated
                .setup(&id)
                .with_context(|| format!("symbol {s} is not configured (or was rejected)"))?;
            vec![setup]
        }
        None => validated.setups.iter().collect(),
    };

    for setup in setups {
        let candles = load_series(setup, data)?;
        let mut result = run_backtest(setup, &candles, &config.broker)
            .with_context(|| format!("backtest failed for {}", setup.symbol))?;
        if data.data_dir.is_none() {
            result.fingerprint.seed = Some(data.seed);
        }
        print_summary(&result);
        let run_dir = save_artifacts(&result, out)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_sweep_cmd(path: &Path, symbol: &str, data: &DataArgs, top: usize) -> Result<()> {
    let (config, validated) = load_config(path)?;
    let Some(grid) = &config.sweep else {
        bail!("{} has no [sweep] section", path.display());
    };
    let setup = validated
        .setup(&SymbolId::from(symbol))
        .with_context(|| format!("symbol {symbol} is not configured (or was rejected)"))?;

    let candles = load_series(setup, data)?;
    let results = run_sweep(setup, &candles, &config.broker, grid)?;
    print_sweep(&results, top);
    Ok(())
}

fn run_replay_cmd(
    path: &Path,
    data: &DataArgs,
    passes: Option<usize>,
    realtime: bool,
) -> Result<()> {
    let (config, validated) = load_config(path)?;

    let mut source = ReplaySource::new();
    for setup in &validated.setups {
        source.insert(setup.symbol.clone(), load_series(setup, data)?);
    }

    let interval = if realtime {
        std::time::Duration::from_secs(config.engine.poll_interval_secs)
    } else {
        std::time::Duration::ZERO
    };
    let mut ctx = PollContext::from_config(&validated, interval)?;
    let mut broker = PaperBroker::new(config.broker.clone());

    // Unbounded by default: the loop ends once every series has drained.
    let summary = run_poll_loop(&mut ctx, &mut source, &mut broker, passes);
    info!(
        passes = summary.passes,
        transitions = summary.transitions,
        "replay finished"
    );

    println!();
    println!("=== Replay ===");
    println!("Passes:         {}", summary.passes);
    println!("Cycles:         {}", summary.cycles);
    println!("Transitions:    {}", summary.transitions);
    println!("Skipped cycles: {}", summary.errors);
    println!("Equity (MTM):   {:.2}", broker.mark_to_market());
    println!("Fees paid:      {:.2}", broker.fees_paid());
    println!();
    for (symbol, slot) in &ctx.slots {
        println!("{:<12} {:<6} failures {}", symbol, slot.state.side(), slot.failures);
    }
    Ok(())
}

fn run_synth(out: &Path, symbol: &str, interval: &str, bars: usize, seed: u64) -> Result<()> {
    let interval = Interval::new(interval);
    let Some(bar) = interval.duration() else {
        bail!("bad interval '{interval}'");
    };
    let spec = SyntheticSpec {
        bars,
        ..SyntheticSpec::default()
    };
    let candles = synthetic_candles(&spec, &SymbolId::from(symbol), bar, seed);
    save_candles(out, &candles).with_context(|| format!("failed to write {}", out.display()))?;
    println!("Wrote {} synthetic {interval} bars to {}", candles.len(), out.display());
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {} ({})", result.symbol, result.timeframe);
    println!(
        "Strategy:       {} / {}",
        result.fingerprint.strategy.indicator.label(),
        result.fingerprint.strategy.signal.kind()
    );
    if let (Some(first), Some(last)) = (result.fingerprint.first_bar, result.fingerprint.last_bar) {
        println!("Period:         {first} to {last}");
    }
    println!(
        "Bars:           {} ({} evaluated)",
        result.bars, result.evaluated_bars
    );
    println!(
        "Trades:         {} (SL {}, TP {}, XC {})",
        m.trade_count, m.exits.stop_loss, m.exits.take_profit, m.exits.opposite_signal
    );
    println!();
    println!("--- Performance ---");
    println!("Total ROE:      {:.2}%", m.total_roe);
    println!("Avg ROE:        {:.2}%", m.avg_roe);
    println!("Total PnL:      {:.2}", m.total_pnl);
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    if let Some(p) = &result.open_position {
        println!();
        println!("Open at end:    {} @ {:.4}", p.side, p.entry_price);
    }
    if result.failed_cycles > 0 {
        println!("WARNING: {} cycle(s) failed", result.failed_cycles);
    }
    if let Some(seed) = result.fingerprint.seed {
        println!("WARNING: Results based on SYNTHETIC data (seed {seed})");
    }
    println!();
}

fn print_sweep(results: &SweepResults, top: usize) {
    println!();
    println!(
        "=== Sweep: {} point(s), {} skipped ===",
        results.len(),
        results.skipped()
    );
    println!(
        "{:<10} {:<10} {:<10} {:<8} {:>8} {:>10} {:>8}",
        "Doorstep", "EntryBand", "TP Close", "Cooldown", "Trades", "TotalROE", "WinRate"
    );
    println!("{}", "-".repeat(70));
    let cell = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{x}"));
    for row in results.top_n(top) {
        println!(
            "{:<10} {:<10} {:<10} {:<8} {:>8} {:>9.2}% {:>7.1}%",
            cell(row.point.doorstep),
            cell(row.point.entry_band),
            cell(row.point.doorstep_close),
            row.point
                .cooldown_bars
                .map_or_else(|| "-".to_string(), |c| c.to_string()),
            row.metrics.trade_count,
            row.metrics.total_roe,
            row.metrics.win_rate * 100.0
        );
    }
    println!();
}

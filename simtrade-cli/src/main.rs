//! simtrade CLI — backtest, paper-trading and config commands.
//!
//! Commands:
//! - `backtest` — replay a tick file (or a synthetic walk) and save artifacts
//! - `paper` — feed a synthetic walk through a live session tick by tick
//! - `config` — print the effective configuration as TOML

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use simtrade_core::strategy::{Idle, MovingAverageCross, Strategy};
use simtrade_core::SimConfig;
use simtrade_runner::{
    load_ticks_csv, run_backtest, run_paper, run_parallel, save_artifacts, spawn_feed,
    split_by_symbol, synthetic_ticks, BacktestJob, BacktestResult, LoadedTicks, PerformanceMetrics,
    SyntheticOptions,
};

#[derive(Parser)]
#[command(name = "simtrade", about = "simtrade — trade execution and risk simulator")]
struct Cli {
    /// Log filter (e.g. info, debug, simtrade_core=trace). RUST_LOG wins if set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyKind {
    /// Long-only fast/slow moving-average crossover.
    MaCross,
    /// Never trades; useful as a baseline.
    Idle,
}

#[derive(clap::Args)]
struct StrategyArgs {
    /// Strategy to run.
    #[arg(long, value_enum, default_value = "ma-cross")]
    strategy: StrategyKind,

    /// Fast moving-average window (ma-cross).
    #[arg(long, default_value_t = 10)]
    fast: usize,

    /// Slow moving-average window (ma-cross).
    #[arg(long, default_value_t = 30)]
    slow: usize,
}

#[derive(clap::Args)]
struct SyntheticArgs {
    /// Symbol for synthetic ticks.
    #[arg(long, default_value = "SPY")]
    symbol: String,

    /// RNG seed for synthetic ticks.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay ticks through a session and report metrics.
    Backtest {
        /// CSV tick file (timestamp,symbol,price[,volume]).
        #[arg(long, conflicts_with = "synthetic", required_unless_present = "synthetic")]
        ticks: Option<PathBuf>,

        /// Generate N synthetic ticks instead of reading a file.
        #[arg(long)]
        synthetic: Option<usize>,

        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Run each symbol as an independent session in parallel
        /// instead of one shared-capital session.
        #[arg(long, default_value_t = false)]
        per_symbol: bool,

        /// Directory for result.json, trades.csv, equity.csv, orders.csv.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        synth: SyntheticArgs,
    },
    /// Paper-trade a synthetic feed tick by tick.
    Paper {
        /// Number of synthetic ticks to stream.
        #[arg(long)]
        synthetic: usize,

        /// Delay between ticks in milliseconds.
        #[arg(long, default_value_t = 0)]
        interval_ms: u64,

        /// TOML config file. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        strategy: StrategyArgs,

        #[command(flatten)]
        synth: SyntheticArgs,
    },
    /// Print the effective configuration as TOML.
    Config {
        /// Validate and echo this file instead of the defaults.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Backtest {
            ticks,
            synthetic,
            config,
            per_symbol,
            output_dir,
            strategy,
            synth,
        } => run_backtest_cmd(
            ticks,
            synthetic,
            config.as_deref(),
            per_symbol,
            output_dir,
            &strategy,
            &synth,
        ),
        Commands::Paper {
            synthetic,
            interval_ms,
            config,
            strategy,
            synth,
        } => run_paper_cmd(synthetic, interval_ms, config.as_deref(), &strategy, &synth),
        Commands::Config { config } => {
            let config = load_config(config.as_deref())?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<SimConfig> {
    match path {
        Some(p) => SimConfig::load(p).with_context(|| format!("loading {}", p.display())),
        None => Ok(SimConfig::default()),
    }
}

fn build_strategy(args: &StrategyArgs) -> Result<Box<dyn Strategy>> {
    match args.strategy {
        StrategyKind::MaCross => match MovingAverageCross::new(args.fast, args.slow) {
            Some(s) => Ok(Box::new(s)),
            None => bail!(
                "invalid ma-cross windows: need 0 < fast < slow, got fast={} slow={}",
                args.fast,
                args.slow
            ),
        },
        StrategyKind::Idle => Ok(Box::new(Idle)),
    }
}

fn synthetic(synth: &SyntheticArgs, count: usize) -> Result<LoadedTicks> {
    let opts = SyntheticOptions::new(synth.symbol.clone(), count).with_seed(synth.seed);
    Ok(synthetic_ticks(&opts)?)
}

fn run_backtest_cmd(
    ticks: Option<PathBuf>,
    synthetic_count: Option<usize>,
    config_path: Option<&Path>,
    per_symbol: bool,
    output_dir: Option<PathBuf>,
    strategy_args: &StrategyArgs,
    synth: &SyntheticArgs,
) -> Result<()> {
    let config = load_config(config_path)?;
    let data = match (ticks, synthetic_count) {
        (Some(path), None) => load_ticks_csv(&path)?,
        (None, Some(n)) => synthetic(synth, n)?,
        _ => bail!("exactly one of --ticks or --synthetic is required"),
    };
    info!(ticks = data.ticks.len(), symbols = ?data.symbols(), "ticks loaded");

    let results: Vec<BacktestResult> = if per_symbol {
        let jobs = split_by_symbol(&data.ticks)
            .into_values()
            .map(|ticks| -> Result<BacktestJob> {
                Ok(BacktestJob {
                    config: config.clone(),
                    strategy: build_strategy(strategy_args)?,
                    data: LoadedTicks {
                        dataset_hash: simtrade_runner::data_loader::dataset_hash(&ticks),
                        ticks,
                        has_synthetic: data.has_synthetic,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;
        run_parallel(jobs)
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?
    } else {
        vec![run_backtest(&config, build_strategy(strategy_args)?, &data)?]
    };

    let multiple = results.len() > 1;
    for result in &results {
        print_summary(result);
        if let Some(dir) = &output_dir {
            let dir = if multiple {
                dir.join(result.symbols.join("_"))
            } else {
                dir.clone()
            };
            save_artifacts(result, &dir)?;
            println!("Artifacts saved to: {}", dir.display());
        }
    }

    if let Some(aborted) = results.iter().find(|r| !r.complete) {
        bail!(
            "replay aborted: {}",
            aborted.abort.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn run_paper_cmd(
    count: usize,
    interval_ms: u64,
    config_path: Option<&Path>,
    strategy_args: &StrategyArgs,
    synth: &SyntheticArgs,
) -> Result<()> {
    let config = load_config(config_path)?;
    let strategy = build_strategy(strategy_args)?;
    let data = synthetic(synth, count)?;

    let cancel = Arc::new(AtomicBool::new(false));
    let (rx, feed) = spawn_feed(data.ticks, Duration::from_millis(interval_ms), cancel.clone())
        .context("spawning tick feed")?;

    let result = run_paper(&config, strategy, rx, &cancel, |snap| {
        println!(
            "{}  equity {:>12.2}  cash {:>12.2}  exposure {:>10.2}",
            snap.timestamp.to_rfc3339(),
            snap.total_value,
            snap.cash,
            snap.gross_exposure
        );
    })?;

    if feed.join().is_err() {
        bail!("tick feed thread panicked");
    }

    println!();
    println!("=== Paper Session ===");
    println!("Ticks:          {}", result.report.ticks_processed);
    print_metrics(&result.metrics);

    if !result.report.complete {
        bail!(
            "paper session aborted: {}",
            result.report.abort.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", result.strategy);
    println!("Symbols:        {}", result.symbols.join(", "));
    if let (Some(start), Some(end)) = (result.start, result.end) {
        println!("Period:         {} to {}", start.to_rfc3339(), end.to_rfc3339());
    }
    println!("Ticks:          {}", result.report.ticks_processed);
    println!("Orders:         {}", result.report.orders.len());
    println!("Rejections:     {}", result.report.rejections.len());
    println!("Run id:         {}", result.run_id);
    print_metrics(&result.metrics);
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    if !result.complete {
        println!(
            "WARNING: run INCOMPLETE ({})",
            result.abort.as_deref().unwrap_or("aborted")
        );
    }
}

fn print_metrics(m: &PerformanceMetrics) {
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}% (${:.2})", m.total_return_pct, m.total_return);
    println!("Annualized:     {}", m.annualized_return_pct);
    println!("Sharpe:         {}", m.sharpe_ratio);
    println!("Sortino:        {}", m.sortino_ratio);
    println!("Calmar:         {}", m.calmar_ratio);
    println!("Max Drawdown:   {:.2}% (${:.2})", m.max_drawdown_pct, m.max_drawdown);
    println!("Trades:         {}", m.total_trades);
    println!("Win Rate:       {}", m.win_rate);
    println!("Profit Factor:  {}", m.profit_factor);
    println!("Expectancy:     {}", m.expectancy);
    println!("Commission:     {:.2}", m.total_commission);
    println!("Slippage:       {:.2}", m.total_slippage);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn backtest_requires_a_source() {
        assert!(Cli::try_parse_from(["simtrade", "backtest"]).is_err());
        assert!(Cli::try_parse_from(["simtrade", "backtest", "--synthetic", "100"]).is_ok());
        assert!(Cli::try_parse_from([
            "simtrade",
            "backtest",
            "--synthetic",
            "100",
            "--ticks",
            "t.csv"
        ])
        .is_err());
    }

    #[test]
    fn ma_cross_windows_validated() {
        let args = StrategyArgs {
            strategy: StrategyKind::MaCross,
            fast: 30,
            slow: 10,
        };
        assert!(build_strategy(&args).is_err());
    }
}

//! ScoreLab CLI: backtest scored candidates, inspect the regime, manage the cache.
//!
//! Commands:
//! - `run`: backtest a candidate CSV at a reference date
//! - `regime`: classify the market at a date
//! - `cache status`: list cached price snapshots

mod logging;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use scorelab_core::data::{
    CircuitBreaker, ParquetCache, PriceProvider, ReadThroughProvider, SyntheticProvider,
    YahooProvider,
};
use scorelab_core::domain::Trade;
use scorelab_core::regime::{RegimeCache, RegimeGate};
use scorelab_runner::{
    load_candidates, run_backtest, BacktestConfig, BacktestRun, PortfolioReport, ReferenceDate,
    RegimePolicy, RunContext,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Level around which the synthetic volatility index wanders.
const SYNTHETIC_VOLATILITY_LEVEL: f64 = 18.0;

#[derive(Parser)]
#[command(
    name = "scorelab",
    about = "ScoreLab CLI: backtest scored stock candidates against history"
)]
struct Cli {
    /// Path to a TOML config file. Every field has a default.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (overridden by RUST_LOG).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DataArgs {
    /// Offline mode: serve only from the snapshot cache.
    #[arg(long, default_value_t = false)]
    offline: bool,

    /// Use deterministic synthetic prices instead of Yahoo Finance.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Snapshot cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a candidate table.
    Run {
        /// Candidate CSV (ticker, composite_score or score, tier, timing_convergence).
        #[arg(long)]
        candidates: PathBuf,

        /// Reference date (YYYY-MM-DD).
        #[arg(long, conflicts_with = "lookback_days")]
        date: Option<String>,

        /// Reference date as days before today.
        #[arg(long)]
        lookback_days: Option<u32>,

        /// Minimum score, replacing both per-column defaults.
        #[arg(long)]
        min_score: Option<f64>,

        /// Simulate even when the regime is BEAR or CHOPPY.
        #[arg(long, default_value_t = false)]
        no_regime_gate: bool,

        /// Abort if the regime cannot be determined.
        #[arg(long, default_value_t = false)]
        fail_fast: bool,

        #[command(flatten)]
        data: DataArgs,

        /// Write the full run (report, trades, drops) as JSON.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write closed trades as CSV.
        #[arg(long)]
        trades_csv: Option<PathBuf>,
    },
    /// Classify the market regime at a date.
    Regime {
        /// Date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        date: Option<String>,

        #[command(flatten)]
        data: DataArgs,
    },
    /// Cache management commands.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached price snapshots.
    Status {
        /// Snapshot cache directory.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BacktestConfig::load(path)?,
        None => BacktestConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    logging::init_logging(&config.logging.level, config.logging.format);

    match cli.command {
        Commands::Run {
            candidates,
            date,
            lookback_days,
            min_score,
            no_regime_gate,
            fail_fast,
            data,
            output,
            trades_csv,
        } => {
            if let Some(date) = date {
                match date.parse::<ReferenceDate>()? {
                    ReferenceDate::On(d) => config.backtest.reference_date = Some(d),
                    ReferenceDate::DaysAgo(days) => config.backtest.lookback_days = days,
                }
            }
            if let Some(days) = lookback_days {
                config.backtest.reference_date = None;
                config.backtest.lookback_days = days;
            }
            if min_score.is_some() {
                config.backtest.min_score = min_score;
            }
            if no_regime_gate {
                config.backtest.respect_regime_gate = false;
            }
            if fail_fast {
                config.backtest.regime_policy = RegimePolicy::FailFast;
            }
            apply_data_args(&mut config, &data);
            config.validate()?;
            run_command(&config, &candidates, output.as_deref(), trades_csv.as_deref())
        }
        Commands::Regime { date, data } => {
            apply_data_args(&mut config, &data);
            run_regime(&config, date.as_deref())
        }
        Commands::Cache {
            action: CacheAction::Status { cache_dir },
        } => {
            let dir = cache_dir.unwrap_or_else(|| config.data.cache_dir.clone());
            run_cache_status(&dir)
        }
    }
}

fn apply_data_args(config: &mut BacktestConfig, args: &DataArgs) {
    config.data.offline |= args.offline;
    config.data.synthetic |= args.synthetic;
    if let Some(dir) = &args.cache_dir {
        config.data.cache_dir = dir.clone();
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Read-through provider over the configured upstream.
///
/// Synthetic series are never written to the snapshot cache.
fn build_provider(config: &BacktestConfig) -> Result<ReadThroughProvider> {
    let data = &config.data;
    if data.synthetic {
        let synthetic = SyntheticProvider::new().with_level(
            &config.regime.settings.volatility_ticker,
            SYNTHETIC_VOLATILITY_LEVEL,
        );
        tracing::warn!("using synthetic prices; results are not market data");
        return Ok(ReadThroughProvider::new(Some(Box::new(synthetic)), None));
    }

    let snapshots = Some(ParquetCache::new(&data.cache_dir));
    if data.offline {
        return Ok(ReadThroughProvider::new(None, snapshots));
    }
    let yahoo = YahooProvider::new(
        Arc::new(CircuitBreaker::default_provider()),
        Duration::from_secs(data.fetch_timeout_secs),
    )?
    .with_max_retries(data.max_retries);
    let upstream: Box<dyn PriceProvider> = Box::new(yahoo);
    Ok(ReadThroughProvider::new(Some(upstream), snapshots))
}

fn load_regime_cache(config: &BacktestConfig) -> RegimeCache {
    let Some(path) = &config.regime.cache_path else {
        return RegimeCache::new();
    };
    RegimeCache::load(path).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable regime cache");
        RegimeCache::new()
    })
}

fn save_regime_cache(config: &BacktestConfig, cache: &RegimeCache) {
    if let Some(path) = &config.regime.cache_path {
        if let Err(e) = cache.save(path) {
            tracing::warn!(path = %path.display(), error = %e, "failed to save regime cache");
        }
    }
}

fn run_command(
    config: &BacktestConfig,
    candidates: &Path,
    output: Option<&Path>,
    trades_csv: Option<&Path>,
) -> Result<()> {
    let table = load_candidates(candidates)
        .with_context(|| format!("loading candidates from {}", candidates.display()))?;
    let provider = build_provider(config)?;
    let regime_cache = load_regime_cache(config);
    let ctx = RunContext {
        provider: &provider,
        regime_cache: &regime_cache,
        today: today(),
    };

    let run = run_backtest(&table, config, &ctx)?;
    save_regime_cache(config, &regime_cache);
    print_report(&run);

    if let Some(path) = output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &run)?;
        println!("\nRun written to {}", path.display());
    }
    if let Some(path) = trades_csv {
        write_trades_csv(path, &run.trades)?;
        println!("Trades written to {}", path.display());
    }
    Ok(())
}

fn print_report(run: &BacktestRun) {
    let r: &PortfolioReport = &run.report;
    println!();
    match r.reference_date {
        Some(date) => println!("Reference date: {date}"),
        None => println!("Reference date: (unresolved)"),
    }
    match &r.regime_metadata {
        Some(meta) => println!(
            "Market regime:  {} (confidence {:.1}) {}",
            r.market_regime, meta.confidence, meta.description
        ),
        None => println!("Market regime:  {}", r.market_regime),
    }
    println!();

    if let Some(reason) = r.reason {
        println!("No trades: {reason}");
    } else {
        println!("Trades:         {}", r.total_trades);
        println!("Win rate:       {:.1}%", r.win_rate);
        println!("Avg return:     {:+.2}%", r.avg_return);
        println!("Avg win/loss:   {:+.2}% / {:+.2}%", r.avg_win, r.avg_loss);
        println!("Profit factor:  {}", r.profit_factor);
        println!("Sharpe:         {:.2}", r.sharpe_ratio);
        println!("Best/worst:     {:+.2}% / {:+.2}%", r.max_return, r.max_loss);
        println!("Avg hold:       {:.1} days", r.avg_hold_days);
        println!("Avg drawdown:   {:.2}% (worst {:.2}%)", r.avg_max_drawdown_pct, r.worst_drawdown_pct);
        println!(
            "Stops hit:      {} ({:.1}%)",
            r.stop_triggered_count, r.stop_triggered_rate
        );
        println!();
        println!("{:<15} {:>6}", "Exit reason", "Count");
        println!("{}", "-".repeat(22));
        for (reason, count) in &r.exit_reason_histogram {
            println!("{:<15} {:>6}", reason.as_str(), count);
        }
    }

    let s = &r.skipped;
    if s.total() > 0 {
        println!();
        println!(
            "Skipped: {} below threshold, {} no data, {} insufficient history, {} invalid",
            s.below_threshold, s.no_data, s.insufficient_history, s.invalid
        );
    }
}

fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;
    w.write_record([
        "ticker",
        "tier",
        "score",
        "entry_date",
        "exit_date",
        "entry_price",
        "exit_price",
        "return_pct",
        "hold_days",
        "bars_held",
        "exit_reason",
        "max_drawdown_pct",
        "market_regime",
    ])?;
    for t in trades {
        w.write_record([
            t.ticker.clone(),
            t.tier.to_string(),
            t.score.value.to_string(),
            t.entry_date.to_string(),
            t.exit_date.to_string(),
            format!("{:.4}", t.entry_price),
            format!("{:.4}", t.exit_price),
            format!("{:.4}", t.return_pct),
            t.hold_days.to_string(),
            t.bars_held.to_string(),
            t.exit_reason.to_string(),
            format!("{:.4}", t.max_drawdown_pct),
            t.market_regime.to_string(),
        ])?;
    }
    w.flush()?;
    Ok(())
}

fn run_regime(config: &BacktestConfig, date: Option<&str>) -> Result<()> {
    let date = match date {
        Some(s) => s.parse::<ReferenceDate>()?.resolve(today())?,
        None => today(),
    };
    let provider = build_provider(config)?;
    let cache = load_regime_cache(config);
    let gate = RegimeGate::new(&provider, &cache, &config.regime.settings);
    let snap = gate
        .try_classify(date)
        .with_context(|| format!("classifying market regime at {date}"))?;
    save_regime_cache(config, &cache);

    println!("Date:        {}", snap.date);
    println!("Regime:      {} (confidence {:.1})", snap.regime, snap.confidence);
    println!("             {}", snap.description);
    if let (Some(close), Some(ma), Some(vol)) = (snap.index_close, snap.index_ma, snap.volatility) {
        println!(
            "Index:       {} {:.2} vs SMA{} {:.2}",
            config.regime.settings.index_ticker, close, config.regime.settings.ma_period, ma
        );
        println!("Volatility:  {} {:.2}", config.regime.settings.volatility_ticker, vol);
    }
    println!(
        "Weights:     pattern {:.2}, momentum {:.2}, fundamental {:.2}",
        snap.weights.pattern, snap.weights.momentum, snap.weights.fundamental
    );
    Ok(())
}

fn run_cache_status(cache_dir: &Path) -> Result<()> {
    if !cache_dir.exists() {
        println!("Cache directory does not exist: {}", cache_dir.display());
        return Ok(());
    }
    let cache = ParquetCache::new(cache_dir);
    let metas = cache.list()?;
    if metas.is_empty() {
        println!("Cache is empty: {}", cache.cache_dir().display());
        return Ok(());
    }

    let symbols: std::collections::BTreeSet<&str> = metas.iter().map(|m| m.symbol.as_str()).collect();
    println!("Cache: {}", cache.cache_dir().display());
    println!("Symbols: {}  Snapshots: {}", symbols.len(), metas.len());
    println!();
    println!("{:<8} {:<25} {:>6}  {:<14} Cached at", "Symbol", "Range", "Bars", "Source");
    println!("{}", "-".repeat(78));
    for m in &metas {
        println!(
            "{:<8} {:<25} {:>6}  {:<14} {}",
            m.symbol,
            format!("{} to {}", m.start, m.end),
            m.bar_count,
            m.source,
            m.cached_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

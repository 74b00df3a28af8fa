//! HA-Trend Trader CLI: run, check and one-shot signal commands.
//!
//! Commands:
//! - `run`: connect, then control the strategy from stdin (`start`, `stop`, `status`, `quit`)
//! - `check`: validate the config and print its fingerprint
//! - `signal`: fetch the latest candles once and print the decision without trading

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

use hatrader_core::exchange::{BinanceClient, CircuitBreaker, Credentials, Exchange, PaperExchange};
use hatrader_core::executor::{CycleOutcome, Snapshot};
use hatrader_core::indicators::IndicatorEngine;
use hatrader_core::journal::TradeJournal;
use hatrader_core::scheduler::{Scheduler, SchedulerState, WorkerEvent};
use hatrader_core::signal::Signal;
use hatrader_core::{TradeExecutor, TraderConfig};

#[derive(Parser)]
#[command(
    name = "hatrader",
    about = "HA-Trend Trader: Heikin-Ashi trend-following spot trading bot"
)]
struct Cli {
    /// Path to a TOML config file. Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter (error, warn, info, debug, trace, or a tracing directive).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the exchange and control the strategy from stdin.
    Run {
        /// Simulate fills against an in-memory balance; no credentials needed.
        #[arg(long, default_value_t = false)]
        paper: bool,

        /// Start the strategy immediately instead of waiting for `start`.
        #[arg(long, default_value_t = false)]
        autostart: bool,
    },
    /// Validate the config and print its fingerprint.
    Check,
    /// Evaluate the latest bar once and print the decision. Never trades.
    Signal,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_file.as_deref())?;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { paper, autostart } => run_cmd(config, paper, autostart),
        Commands::Check => check_cmd(&config),
        Commands::Signal => signal_cmd(&config),
    }
}

fn init_logging(level: &str, file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level: {level}"))?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TraderConfig> {
    match path {
        Some(path) => TraderConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            let config = TraderConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn binance(config: &TraderConfig, credentials: Option<Credentials>) -> Result<BinanceClient> {
    let breaker = Arc::new(CircuitBreaker::default_exchange());
    BinanceClient::new(config.exchange.clone(), credentials, breaker)
        .context("failed to create exchange client")
}

// ─── run ────────────────────────────────────────────────────────────

fn run_cmd(config: TraderConfig, paper: bool, autostart: bool) -> Result<()> {
    tracing::info!(
        symbol = %config.symbol,
        timeframe = %config.timeframe,
        fingerprint = %config.fingerprint(),
        paper,
        "starting trader"
    );

    if paper {
        let mut balances = HashMap::new();
        balances.insert(config.symbol.quote.clone(), config.paper.starting_quote);
        let exchange = PaperExchange::new(binance(&config, None)?, balances, config.paper.fee_rate);
        run_with(exchange, config, autostart)
    } else {
        let credentials = Credentials::from_env()
            .context("live trading needs BINANCE_API_KEY and BINANCE_SECRET_KEY (or use --paper)")?;
        run_with(binance(&config, Some(credentials))?, config, autostart)
    }
}

fn run_with<E: Exchange + 'static>(exchange: E, config: TraderConfig, autostart: bool) -> Result<()> {
    let mut executor = TradeExecutor::new(exchange, &config);
    executor
        .connect()
        .with_context(|| format!("failed to connect to {}", config.symbol))?;
    if let Some(path) = &config.journal_path {
        executor = executor.with_journal(TradeJournal::open(path)?);
    }

    let (mut scheduler, events) = Scheduler::new(executor, config.timing());
    let last_event = spawn_event_listener(events);

    if autostart {
        scheduler.start()?;
    }
    println!("commands: start, stop, status, quit");

    let mut quit = false;
    for line in std::io::stdin().lock().lines() {
        let line = line.context("failed to read stdin")?;
        let result = match line.trim().to_ascii_lowercase().as_str() {
            "start" => scheduler.start().map(drop),
            "stop" => scheduler.stop().map(drop),
            "status" => {
                print_status(&scheduler, &last_event);
                Ok(())
            }
            "quit" | "exit" => {
                quit = true;
                break;
            }
            "" => Ok(()),
            other => {
                println!("unknown command: {other} (expected start, stop, status, quit)");
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::error!(error = %e, "scheduler command failed");
            println!("error: {e}");
        }
    }

    // Detached stdin (service, nohup): keep trading until the process is killed.
    if !quit && scheduler.state() == SchedulerState::Running {
        tracing::info!("stdin closed; strategy keeps running");
        scheduler.wait()?;
    }

    scheduler.shutdown()?;
    tracing::info!("trader shut down");
    Ok(())
}

/// Keep the most recent worker event for `status`.
fn spawn_event_listener(events: Receiver<WorkerEvent>) -> Arc<Mutex<Option<String>>> {
    let last = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&last);
    // Detached: exits when the scheduler drops its sender.
    let _ = std::thread::Builder::new()
        .name("hatrader-events".into())
        .spawn(move || {
            for event in events {
                let summary = match event {
                    WorkerEvent::Started => "worker started".to_string(),
                    WorkerEvent::CycleCompleted { cycle, outcome } => {
                        format!("cycle {cycle}: {}", describe(&outcome))
                    }
                    WorkerEvent::CycleFailed { cycle, error } => format!("cycle {cycle} failed: {error}"),
                    WorkerEvent::Stopped { cycles } => format!("worker stopped after {cycles} cycles"),
                };
                if let Ok(mut slot) = sink.lock() {
                    *slot = Some(summary);
                }
            }
        });
    last
}

fn describe(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::FetchFailed { reason } => format!("fetch failed ({reason})"),
        CycleOutcome::InsufficientData { bars, required } => {
            format!("insufficient data ({bars} of {required} bars)")
        }
        CycleOutcome::Held { close, trailing_stop } => match trailing_stop {
            Some(stop) => format!("holding long, close {close}, stop {stop}"),
            None => format!("flat, close {close}"),
        },
        CycleOutcome::Entered {
            receipt,
            entry_price,
            initial_stop,
        } => format!(
            "bought {} at {entry_price}, stop {initial_stop} (order {})",
            receipt.amount, receipt.order_id
        ),
        CycleOutcome::Exited { receipt, close, stop } => format!(
            "sold {} at {close}, stop {stop} (order {})",
            receipt.amount, receipt.order_id
        ),
        CycleOutcome::Skipped { side, reason } => format!("{side} skipped: {reason}"),
        CycleOutcome::OrderFailed { side, error } => format!("{side} failed: {error}"),
    }
}

fn print_status<E: Exchange + 'static>(
    scheduler: &Scheduler<TradeExecutor<E>>,
    last_event: &Arc<Mutex<Option<String>>>,
) {
    let state = scheduler.state();
    println!("strategy: {state:?}");
    if let (SchedulerState::Idle, Some(executor)) = (state, scheduler.cycle()) {
        let position = executor.state();
        println!(
            "position: in_trade={} entry={:?} stop={:?} last_signal={:?}",
            position.in_trade(),
            position.entry_price(),
            position.trailing_stop(),
            position.last_signal()
        );
    }
    let last = last_event.lock().ok().and_then(|slot| slot.clone());
    println!("last event: {}", last.as_deref().unwrap_or("none"));
}

// ─── check ──────────────────────────────────────────────────────────

fn check_cmd(config: &TraderConfig) -> Result<()> {
    let engine = IndicatorEngine::new(config.indicators);
    println!("config OK");
    println!("  symbol:       {}", config.symbol);
    println!("  timeframe:    {}", config.timeframe);
    println!("  fetch limit:  {}", config.fetch_limit);
    println!("  min bars:     {}", engine.min_bars());
    println!("  fingerprint:  {}", config.fingerprint());
    Ok(())
}

// ─── signal ─────────────────────────────────────────────────────────

fn signal_cmd(config: &TraderConfig) -> Result<()> {
    let mut executor = TradeExecutor::new(binance(config, None)?, config);
    executor
        .connect()
        .with_context(|| format!("failed to connect to {}", config.symbol))?;

    match executor.snapshot().context("failed to fetch candles")? {
        Snapshot::NoData => println!("no candles returned for {}", config.symbol),
        Snapshot::Insufficient { bars, required } => {
            println!("insufficient data: {bars} bars, need {required}")
        }
        Snapshot::Ready {
            row,
            conditions,
            evaluation,
        } => {
            println!("{} {} bar at {}", config.symbol, config.timeframe, row.bar.timestamp);
            println!("  close {}  HA close {}  trend MA {}", row.bar.close, row.ha_close, row.trend_ma);
            println!("  SMA fast {}  SMA slow {}", row.sma_fast, row.sma_slow);
            println!("  ATR {}  ATR SMA {}", row.atr, row.atr_sma);
            println!("  volume {}  volume SMA {}", row.bar.volume, row.volume_sma);
            match evaluation.signal {
                Signal::EnterLong {
                    entry_price,
                    initial_stop,
                } => println!("decision: BUY at {entry_price}, initial stop {initial_stop}"),
                Signal::ExitLong { close, stop } => println!("decision: SELL at {close}, stop {stop}"),
                Signal::Hold => println!("decision: HOLD (failed: {})", conditions.failed().join(", ")),
            }
        }
    }
    Ok(())
}

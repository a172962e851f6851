use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

use rust_decimal::Decimal;
use zero_dte_core::{AlertSignal, ConfigLoader, SessionClock};
use zero_dte_exec::{
    DailyRiskLedger, EngineAlert, ExecutionGateway, ManagerSettings, MarketData, OrderManager,
    PaperGateway, PaperMarketData, PositionTracker, ProcessOutcome, SignalProcessor,
    TrackerSettings,
};
use zero_dte_suggest::risk::RiskParams;
use zero_dte_suggest::suggester::{SuggesterConfig, TradeSuggester};

#[derive(Parser)]
#[command(name = "zero-dte")]
#[command(about = "Signal-to-order lifecycle engine for 0DTE index options", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine: signals in on stdin (one JSON object per line)
    Run {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
    /// Show the session phase table and the current phase
    Session {
        /// Config file path
        #[arg(short, long, default_value = "config/Config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Run { config } => run_engine(&config).await?,
        Commands::Session { config } => show_session(&config)?,
    }

    Ok(())
}

async fn run_engine(config_path: &str) -> anyhow::Result<()> {
    tracing::info!("Starting 0DTE engine with config: {}", config_path);

    let config = ConfigLoader::load(config_path)?;
    let clock = SessionClock::from_config(&config.session)?;

    let daily_fraction = Decimal::try_from(config.account.max_daily_risk)
        .map_err(|e| anyhow::anyhow!("invalid max_daily_risk: {e}"))?;
    let loss_limit = config.account.account_size * daily_fraction;
    let ledger = Arc::new(Mutex::new(DailyRiskLedger::new(
        clock.trading_day(),
        loss_limit,
    )));

    let gateway: Arc<dyn ExecutionGateway> = Arc::new(PaperGateway::new());
    let market: Arc<dyn MarketData> = Arc::new(PaperMarketData::new());

    let manager = Arc::new(OrderManager::new(
        ManagerSettings::from_config(&config)?,
        clock.clone(),
        Arc::clone(&gateway),
        Arc::clone(&ledger),
    ));

    let suggester = TradeSuggester::new(
        SuggesterConfig::from_config(&config.trading),
        RiskParams::from_config(&config.account, &config.trading),
    );
    let processor = SignalProcessor::new(
        config.gateway.webhook_passphrase.clone(),
        clock.clone(),
        suggester,
        Arc::clone(&market),
        Arc::clone(&manager),
        Duration::from_secs(config.tracker.price_timeout_secs),
    );

    let (alert_tx, mut alert_rx) = mpsc::channel::<EngineAlert>(32);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tracker = PositionTracker::new(
        Arc::clone(&manager),
        Arc::clone(&gateway),
        Arc::clone(&market),
        Arc::clone(&ledger),
        clock.clone(),
        TrackerSettings::from_config(&config),
        alert_tx,
    );
    let tracker_handle = tokio::spawn(tracker.run(shutdown_rx));

    tracing::info!(
        phase = %clock.phase_now(),
        mode = %config.gateway.mode,
        "Engine ready, reading signals from stdin"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim().is_empty() => {}
                    Some(line) => handle_line(&processor, &line).await,
                    None => {
                        tracing::info!("Signal input closed");
                        break;
                    }
                }
            }
            Some(alert) = alert_rx.recv() => {
                tracing::warn!(%alert, "ENGINE ALERT");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
                break;
            }
        }
    }

    let _ = shutdown_tx.send(true);
    tracker_handle.await?;

    let summary = manager.daily_summary();
    tracing::info!(
        realized_pnl = %summary.realized_pnl,
        wins = summary.wins,
        losses = summary.losses,
        halted = summary.halted,
        "Engine stopped"
    );
    Ok(())
}

async fn handle_line(processor: &SignalProcessor, line: &str) {
    let signal: AlertSignal = match serde_json::from_str(line) {
        Ok(signal) => signal,
        Err(e) => {
            tracing::warn!(error = %e, "Unparseable signal line");
            return;
        }
    };
    match processor.handle(signal).await {
        Ok(ProcessOutcome::OrderCreated(order)) => {
            tracing::info!(
                order_id = %order.id,
                state = %order.state,
                quantity = order.quantity,
                limit = %order.limit_price,
                "Signal produced an order"
            );
        }
        Ok(ProcessOutcome::NoTrade(reason)) => {
            tracing::info!(%reason, "Signal produced no trade");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Signal rejected");
        }
    }
}

fn show_session(config_path: &str) -> anyhow::Result<()> {
    let config = ConfigLoader::load(config_path)?;
    let clock = SessionClock::from_config(&config.session)?;
    let policy = clock.policy();

    println!("Session phases (market time):");
    println!("  pre_market       until {}", policy.market_open);
    println!(
        "  prime_time       {} - {}",
        policy.market_open, policy.prime_time_end
    );
    println!(
        "  lunch_doldrums   {} - {}",
        policy.prime_time_end, policy.lunch_end
    );
    println!(
        "  mid_session      {} - {}",
        policy.lunch_end, policy.danger_zone_start
    );
    println!(
        "  danger_zone      {} - {}",
        policy.danger_zone_start, policy.market_close
    );
    println!("  after_hours      from {}", policy.market_close);
    println!();

    let now = clock.now_market();
    let phase = clock.phase_now();
    println!("Now: {} -> {}", now.format("%H:%M:%S"), phase);
    println!("  {}", phase.description());
    println!(
        "  entries: {}",
        if clock.entry_gate(phase).is_allowed() {
            "open"
        } else {
            "closed"
        }
    );
    println!(
        "  minutes to close: {}",
        clock.minutes_to_close(now.time())
    );
    Ok(())
}

//! Command Line Interface for the AlphaPulse order automation engine.
mod config;
mod output;

use crate::config::{AppConfig, load_jobs};
use alphapulse_data::{BinancePriceSource, Database, HttpSignalGenerator, WebhookNotifier};
use alphapulse_domain::entities::{OrderId, SignalParams};
use alphapulse_domain::enums::{KlineInterval, OrderStatus};
use alphapulse_domain::value_objects::JobCadence;
use alphapulse_execution::prelude::*;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "alphapulse")]
#[command(about = "Signal-driven order automation with stop-loss / take-profit tracking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run profit tracking and the configured signal jobs until Ctrl-C
    Run,
    /// List orders
    Orders {
        /// Only orders in this status (OPEN, STOP_LOSS, TAKE_PROFIT_T1, ...)
        #[arg(long)]
        status: Option<OrderStatus>,

        /// Only orders for this symbol
        #[arg(long)]
        symbol: Option<String>,

        /// Maximum number of orders
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },
    /// Show the profit tracking history of an order
    History {
        /// Order id
        order_id: i64,
    },
    /// Re-evaluate one order, or every open order, at the current price
    Recompute {
        /// Order id; all open orders when omitted
        order_id: Option<i64>,
    },
    /// Close an order manually
    Close {
        /// Order id
        order_id: i64,

        /// Exit price; the current market price when omitted
        #[arg(long)]
        price: Option<Decimal>,
    },
    /// Configure realtime tracking of an order
    Realtime {
        #[command(subcommand)]
        action: RealtimeAction,
    },
    /// Show win/loss statistics per symbol
    Stats {
        /// Only this symbol
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Run one signal analysis and open an order if it qualifies
    Analyze {
        /// Symbol, e.g. BTCUSDT
        symbol: String,

        /// Kline interval analyzed by the signal service
        #[arg(short, long, default_value = "1h")]
        interval: KlineInterval,

        /// Signal service backend
        #[arg(long, default_value = "guiji")]
        service: String,

        /// Model override
        #[arg(long)]
        model: Option<String>,
    },
    /// Create the database schema
    Migrate,
}

#[derive(Subcommand)]
enum RealtimeAction {
    /// Opt an order into realtime tracking
    Enable { order_id: i64 },
    /// Opt an order out of realtime tracking
    Disable { order_id: i64 },
    /// Set the realtime kline interval of an order
    Interval {
        order_id: i64,
        interval: KlineInterval,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    init_tracing(&config)?;

    match cli.command {
        Commands::Migrate => migrate(&config).await,
        command => execute(command, &config).await,
    }
}

async fn migrate(config: &AppConfig) -> Result<()> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;
    let database = Database::connect(url, config.database_max_connections)
        .await
        .context("failed to connect to database")?;
    database.migrate().await.context("migration failed")?;
    println!("✅ Schema is up to date");
    Ok(())
}

async fn execute(command: Commands, config: &AppConfig) -> Result<()> {
    let engine = build_engine(config).await?;

    match command {
        Commands::Run => run(&engine, config).await?,
        Commands::Orders {
            status,
            symbol,
            limit,
        } => {
            let filter = OrderFilter {
                status,
                symbol,
                limit: Some(limit),
            };
            let orders = engine.orders(&filter).await?;
            if orders.is_empty() {
                println!("No orders found.");
            } else {
                output::orders_table(&orders).printstd();
            }
        }
        Commands::History { order_id } => {
            let order = engine.order(OrderId(order_id)).await?;
            let samples = engine.order_history(order.id).await?;
            println!(
                "{} {} {} entry {} ({})",
                order.id, order.symbol, order.direction, order.entry_price, order.status
            );
            output::history_table(&samples).printstd();
        }
        Commands::Recompute { order_id: Some(id) } => {
            let tracked = engine.recompute_order(OrderId(id)).await?;
            println!(
                "{} at {}: {} ({:+.2}%)",
                tracked.order_id,
                tracked.evaluation.price,
                tracked.evaluation.trigger,
                tracked.evaluation.profit_percentage
            );
            if tracked.outcome.is_transitioned() {
                println!("🔔 Order closed by this evaluation");
            }
        }
        Commands::Recompute { order_id: None } => {
            let report = engine.recompute_open_orders().await?;
            output::sweep_table(&report).printstd();
        }
        Commands::Close { order_id, price } => {
            let closed = engine.close_order(OrderId(order_id), price).await?;
            println!(
                "✅ {} closed at {} ({:+.2}%)",
                closed.order_id, closed.closed_price, closed.profit_percentage
            );
        }
        Commands::Realtime { action } => {
            let realtime = match action {
                RealtimeAction::Enable { order_id } => {
                    engine.enable_realtime(OrderId(order_id)).await?
                }
                RealtimeAction::Disable { order_id } => {
                    engine.disable_realtime(OrderId(order_id)).await?
                }
                RealtimeAction::Interval { order_id, interval } => {
                    engine
                        .set_realtime_interval(OrderId(order_id), interval)
                        .await?
                }
            };
            println!(
                "{} realtime tracking {} at {}",
                realtime.order_id,
                if realtime.enabled { "enabled" } else { "disabled" },
                realtime.interval
            );
        }
        Commands::Stats { symbol } => {
            let stats = engine.statistics(symbol.as_deref()).await?;
            if stats.is_empty() {
                println!("No orders found.");
            } else {
                output::stats_table(&stats).printstd();
            }
        }
        Commands::Analyze {
            symbol,
            interval,
            service,
            model,
        } => {
            let params = SignalParams {
                service,
                model,
                interval,
                ..SignalParams::default()
            };
            // One-off job, registered paused so the timer never fires it.
            let spec = SignalJobSpec::new(symbol, JobCadence::hours(1)?, params);
            let job_id = engine.add_signal_job(spec).await?;
            engine.pause_signal_job(&job_id).await?;
            let run = engine.run_signal_job_now(&job_id).await?;
            engine.remove_signal_job(&job_id).await?;
            println!(
                "{job_id}: {} in {:.1}s",
                output::outcome(&run.outcome),
                run.elapsed.as_secs_f64()
            );
        }
        Commands::Migrate => migrate(config).await?,
    }

    Ok(())
}

fn init_tracing(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)
        .with_context(|| format!("invalid LOG_LEVEL {:?}", config.log_level))?;
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

async fn build_engine(config: &AppConfig) -> Result<TradingEngine> {
    let store: Arc<dyn OrderStore> = match &config.database_url {
        Some(url) => {
            let database = Database::connect(url, config.database_max_connections)
                .await
                .context("failed to connect to database")?;
            Arc::new(database.orders())
        }
        None => {
            warn!("DATABASE_URL not set, orders are kept in memory only");
            Arc::new(InMemoryOrderStore::new())
        }
    };

    let prices = BinancePriceSource::new(&config.binance_base_url, config.call_timeout)
        .context("failed to create market data client")?;
    let generator = HttpSignalGenerator::new(&config.signal_service_url, config.signal_timeout)
        .context("failed to create signal service client")?;

    let mut notifier = MultiNotifier::new().with(Arc::new(ConsoleNotifier));
    if let Some(url) = &config.notify_webhook_url {
        let mut webhook = WebhookNotifier::new(url, config.call_timeout)
            .context("failed to create webhook notifier")?;
        if let Some(secret) = &config.notify_webhook_secret {
            webhook = webhook.with_secret(secret);
        }
        notifier = notifier.with(Arc::new(webhook));
    }

    Ok(TradingEngine::new(
        store,
        Arc::new(prices),
        Arc::new(generator),
        Arc::new(notifier),
        config.engine_config(),
    ))
}

async fn run(engine: &TradingEngine, config: &AppConfig) -> Result<()> {
    if let Some(path) = &config.jobs_file {
        for spec in load_jobs(path)? {
            let job_id = engine.add_signal_job(spec).await?;
            info!(job_id = %job_id, "Signal job registered");
        }
    }

    engine.start().await;
    output::tasks_table(&engine.tracker_status().await).printstd();
    let jobs = engine.signal_jobs().await;
    if !jobs.is_empty() {
        output::jobs_table(&jobs).printstd();
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Shutdown requested");
    engine.stop();
    Ok(())
}

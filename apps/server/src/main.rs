//! Price Alert Bot - Headless Server
//!
//! Watches crypto prices for user-defined alerts and talks to users over Telegram.

mod config;

use alertbot_alerts::{
    AlertMonitor, AlertStore, AnalystConfig, CommandHandler, LogNotifier, MarketAnalyst,
    MonitorConfig, Notifier, StorageConfig, TechnicalAnalyst, TelegramBot,
};
use alertbot_feeds::{BinanceRestFetcher, CachedPriceSource, PriceSource, RestConfig};
use clap::Parser;
use config::AppConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// How often the stats line is logged.
const STATS_INTERVAL: Duration = Duration::from_secs(300);

/// Price Alert Bot CLI
#[derive(Parser, Debug)]
#[command(name = "alertbot")]
#[command(about = "Crypto price alert bot for Telegram", long_about = None)]
struct Args {
    /// Configuration file path (defaults are used when it does not exist)
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Directory for alert, history and portfolio files
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Seconds between price checks
    #[arg(short, long)]
    poll_interval: Option<u64>,

    /// Run without Telegram (notifications are logged)
    #[arg(long, default_value_t = false)]
    no_telegram: bool,
}

fn parse_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn init_logging(level: &str) {
    // RUST_LOG wins over --log-level when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::default().add_directive(LevelFilter::from_level(parse_level(level)).into())
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// CLI flags override the configuration file.
fn apply_args(config: &mut AppConfig, args: &Args) {
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(secs) = args.poll_interval {
        config.monitor.poll_interval_secs = secs;
    }
}

async fn run_stats_reporter(
    monitor: Arc<AlertMonitor>,
    store: Arc<AlertStore>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Starting stats reporter");

    let mut interval = tokio::time::interval(STATS_INTERVAL);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Stats reporter stopped");
                    return;
                }
                continue;
            }
        }

        let stats = monitor.stats();
        info!(
            "📊 Stats | Uptime: {}s | Active alerts: {} | Ticks: {} | Triggers: {} | Fetch failures: {} | Notify failures: {}",
            stats.uptime.as_secs(),
            store.active_count().await,
            stats.ticks,
            stats.triggers,
            stats.fetch_failures,
            stats.notify_failures
        );
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    init_logging(&args.log_level);

    let mut config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return;
        }
    };
    config.apply_env();
    apply_args(&mut config, &args);

    let telegram_token = if args.no_telegram {
        None
    } else {
        config.bot_token().map(str::to_string)
    };

    info!("🚀 Price Alert Bot starting...");
    info!("  Config: {}", args.config.display());
    info!("  Data dir: {}", config.storage.data_dir.display());
    info!("  Poll interval: {}s", config.monitor.poll_interval_secs);
    info!("  Price cache TTL: {}s", config.monitor.price_cache_ttl_secs);
    info!("  Exchange: {} ({})", config.binance.base_url, config.binance.quote_asset);
    info!("  Telegram: {}", if telegram_token.is_some() { "enabled" } else { "disabled" });

    let store = match AlertStore::open(&StorageConfig::from(&config.storage)).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Failed to open alert store: {}", e);
            return;
        }
    };
    info!("  Active alerts: {}", store.active_count().await);

    let fetcher = match BinanceRestFetcher::new(RestConfig::from(&config.binance)) {
        Ok(fetcher) => fetcher,
        Err(e) => {
            error!("Failed to create price fetcher: {}", e);
            return;
        }
    };
    let source: Arc<dyn PriceSource> = Arc::new(CachedPriceSource::new(
        Arc::new(fetcher),
        config.monitor.price_cache_ttl(),
    ));

    let analyst: Arc<dyn MarketAnalyst> = Arc::new(TechnicalAnalyst::new(
        source.clone(),
        AnalystConfig::from(&config.analyst),
    ));
    let handler = Arc::new(CommandHandler::new(store.clone(), source.clone(), analyst));

    let bot = telegram_token.map(|token| {
        Arc::new(TelegramBot::new(
            &token,
            handler,
            config.telegram.allowed_chat_ids.clone(),
        ))
    });
    let notifier: Arc<dyn Notifier> = match &bot {
        Some(bot) => Arc::new(bot.notifier()),
        None => {
            if !args.no_telegram {
                warn!("No Telegram bot token configured (set {})", config::BOT_TOKEN_ENV);
            }
            warn!("Notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    // Spawn background tasks
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let monitor = Arc::new(AlertMonitor::new(
        store.clone(),
        source,
        notifier,
        MonitorConfig::from(&config.monitor),
    ));
    let monitor_handle = tokio::spawn(Arc::clone(&monitor).run(shutdown_rx.clone()));
    let stats_handle = tokio::spawn(run_stats_reporter(
        monitor.clone(),
        store.clone(),
        shutdown_rx,
    ));
    let bot_handle = bot.map(|bot| tokio::spawn(bot.run()));

    // Handle shutdown
    info!("Press Ctrl+C to stop...");

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }

    warn!("Shutdown signal received");
    let _ = shutdown_tx.send(true);

    // Wait for tasks with timeout, then abort
    let _ = tokio::time::timeout(Duration::from_secs(2), monitor_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), stats_handle).await;
    if let Some(handle) = bot_handle {
        let abort = handle.abort_handle();
        if tokio::time::timeout(Duration::from_secs(3), handle).await.is_err() {
            abort.abort();
        }
    }

    if let Err(e) = store.flush().await {
        error!("Failed to persist pending alert changes: {}", e);
    }

    // Final stats
    let stats = monitor.stats();
    info!("📈 Final Stats:");
    info!("  Total uptime: {} seconds", stats.uptime.as_secs());
    info!("  Poll ticks: {}", stats.ticks);
    info!("  Alerts triggered: {}", stats.triggers);
    info!("  Fetch failures: {}", stats.fetch_failures);
    info!("  Notification failures: {}", stats.notify_failures);
    info!("  Active alerts: {}", store.active_count().await);

    info!("👋 Price Alert Bot stopped");
}

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::time::Duration;

use notedue::clock::SystemClock;
use notedue::config::Config;
use notedue::db::NoteStore;
use notedue::engine::Engine;
use notedue::ipc;
use notedue::notify::{DesktopDispatcher, Dispatcher, LogDispatcher};

const MIN_TICK_MS: u64 = 100;

#[derive(Parser)]
#[command(name = "noted")]
#[command(about = "Reminder daemon for notedue", long_about = None)]
struct Cli {
    /// Database path (defaults to user data directory)
    #[arg(short, long)]
    db_path: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log notifications instead of showing them
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 设置日志
    let log_level = if cli.debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load(cli.config.as_deref()).context("Failed to load config")?;
    let db_path = config.resolve_db_path(cli.db_path)?;
    tracing::info!("Using database: {:?}", db_path);

    let store = NoteStore::open(&db_path).context("Failed to open database")?;
    let dispatcher: Box<dyn Dispatcher> = if cli.dry_run {
        Box::new(LogDispatcher)
    } else {
        Box::new(DesktopDispatcher::new(
            config.notifications.clone(),
            Handle::current(),
        ))
    };

    let engine = Engine::new(store, dispatcher, Arc::new(SystemClock));
    let tick_every = Duration::from_millis(config.daemon.tick_interval_ms.max(MIN_TICK_MS));
    let (handle, task) = engine.spawn(tick_every);

    ipc::spawn_listener(&config.daemon.socket_name, handle.clone())
        .context("Failed to start IPC listener (is another daemon running?)")?;

    tracing::info!("Reminder daemon started");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received Ctrl-C");

    handle.shutdown().await?;
    task.await?;
    Ok(())
}

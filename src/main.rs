use alerter::{run_alerter_service, TelegramAlerter};
use clap::Parser;
use engine::{scheduler, Engine};
use events::EngineEvent;
use gateway::{BinanceFuturesGateway, Gateway};
use persistence::StopStore;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// A leveraged perpetual-futures position lifecycle engine.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config/vigil.toml")]
    config: PathBuf,

    /// Path to the trailing-stop state file.
    #[arg(long, default_value = "data/stops.json")]
    stops: PathBuf,

    /// Trade against production instead of the testnet.
    #[arg(long)]
    live: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Secrets (API keys, Telegram token) come from .env; absent is fine in dev.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let settings = configuration::load_settings(&cli.config)?;
    info!(config = %cli.config.display(), live = cli.live, "configuration loaded");
    if cli.live {
        warn!("LIVE mode: orders will reach the production exchange");
    }

    let gateway: Arc<dyn Gateway> =
        Arc::new(BinanceFuturesGateway::new(cli.live, &settings.api));
    let store = StopStore::open(&cli.stops);
    info!(stops = %cli.stops.display(), records = store.len(), "stop store opened");

    let (event_tx, _) = broadcast::channel::<EngineEvent>(256);
    if let Some(telegram) = TelegramAlerter::new(&settings.telegram) {
        tokio::spawn(run_alerter_service(telegram, event_tx.subscribe()));
    }

    let engine = Arc::new(Engine::new(settings, gateway, store, event_tx));
    engine.start().await?;

    scheduler::run(engine).await;
    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use opensea_tracker::api::OpenSeaClient;
use opensea_tracker::config::{AppConfig, CONFIG_PATH};
use opensea_tracker::notifier::DiscordNotifier;
use opensea_tracker::scheduler::{PollScheduler, initialize_trackers};

#[derive(Parser)]
#[command(
    name = "opensea-tracker",
    about = "Forward new OpenSea bids and sales to a Discord channel"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Load and validate the config, print it, then exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Failed to read .env: {e}");
        }
    }

    let args = Args::parse();

    // Load config
    let config = AppConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());
    config.log_summary();
    if args.check_config {
        return Ok(());
    }

    let http = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;

    let source = OpenSeaClient::new(http.clone(), config.opensea.events_url.clone())
        .with_api_key(config.opensea.api_key.clone())
        .with_bid_event_type(config.opensea.bid_event_type.clone())
        .with_duplicate_policy(config.settings.duplicate_policy);
    let notifier = DiscordNotifier::new(
        http,
        config.discord.bot_token.clone(),
        config.discord.channel_id,
    );

    // --- Baseline ---
    info!(
        "Fetching baseline for {} collection(s)...",
        config.settings.asset_contracts.len()
    );
    let trackers = initialize_trackers(&source, &config.settings.asset_contracts)
        .await
        .context("failed to fetch baseline events")?;

    // --- Polling loop ---
    let scheduler = PollScheduler::new(
        source,
        notifier,
        trackers,
        config.ping_interval(),
        &config.settings,
    );
    info!("Press Ctrl+C to stop.");
    scheduler
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl+C: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
        .context("Discord session failed")?;

    Ok(())
}

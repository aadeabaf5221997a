//! Vigil bot server.
//!
//! Connects to the Discord gateway and serves the ticket and scan
//! subsystems for every guild the bot is in.

use anyhow::{Context, Result};
use clap::Parser;
use serenity::Client;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vigil::social::{SerenityPlatform, intents};
use vigil::{LogFormat, Services, VigilConfig};

/// Command-line arguments for the bot server.
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(about = "Vigil - Support tickets and file scanning for Discord")]
#[command(version)]
struct Args {
    /// Path to the configuration file (defaults to ./vigil.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the data directory from the configuration
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: Option<String>,

    /// Validate configuration and exit without connecting
    #[arg(long)]
    dry_run: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal in production.
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = VigilConfig::load(args.config.as_deref()).context("Loading configuration")?;
    if let Some(data_dir) = args.data_dir {
        config = config.with_data_dir(data_dir);
        config.validate().context("Validating configuration")?;
    }
    if args.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }
    init_tracing(*config.log().format());

    info!("Starting Vigil");
    info!(
        data_dir = %config.data_dir().display(),
        prefix = %config.prefix(),
        tickets = config.tickets().enabled(),
        scan = config.scan().enabled(),
        reaper_interval_secs = config.reaper_interval_secs(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("DRY RUN MODE - Not connecting to Discord");
        info!("Configuration validation complete");
        return Ok(());
    }

    let token = args
        .discord_token
        .context("DISCORD_TOKEN not provided")?;

    let platform = SerenityPlatform::connect(&token)
        .await
        .context("Connecting to Discord")?;
    let services = Services::build(config, Arc::new(platform))
        .await
        .context("Building services")?;

    let reaper = services.spawn_reaper();

    let mut client = Client::builder(&token, intents())
        .event_handler(services.handler())
        .await
        .context("Creating gateway client")?;

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shard_manager.shutdown_all().await;
            }
            Err(e) => warn!(error = %e, "Could not listen for shutdown signal"),
        }
    });

    info!("Connecting to gateway");
    if let Err(e) = client.start_autosharded().await {
        error!(error = %e, "Gateway client stopped with an error");
        reaper.abort();
        return Err(e).context("Running gateway client");
    }

    reaper.abort();
    info!("Vigil stopped");
    Ok(())
}

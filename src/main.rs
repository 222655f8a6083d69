//! CLI for hass-announcer
//!
//! Subcommands:
//! - `announce`: publish a single image update, then go offline
//! - `serve`: read update events as JSON lines from stdin and publish each one

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hass_announcer::config::{Settings, load_config_from};
use hass_announcer::notifier::{HomeAssistant, UpdateEvent};
use hass_announcer::transport::{Connector, MemoryConnector, MqttConnector};
use hass_announcer::utils::logging;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "hass-announcer", version)]
struct Cli {
    /// Configuration file (defaults to config/default.* when present)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log the MQTT messages instead of sending them to a broker
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Announce one image update
    Announce {
        /// Image reference, e.g. docker.io/library/nginx:latest
        #[arg(long)]
        image: String,
        /// Digest of the new manifest
        #[arg(long)]
        digest: String,
        /// Digest of the previously seen manifest, if any
        #[arg(long, default_value = "")]
        previous_digest: String,
    },
    /// Announce every update event read from stdin (one JSON object per line)
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let settings = match load_config_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            logging::init("info");
            error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    logging::init(&settings.log.level);

    let result = if cli.dry_run {
        run(&settings, MemoryConnector::new(), cli.command).await
    } else {
        run(&settings, MqttConnector::new(), cli.command).await
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run<C: Connector>(
    settings: &Settings,
    connector: C,
    command: Command,
) -> Result<(), Box<dyn std::error::Error>> {
    let notifier = HomeAssistant::new(settings, connector)?;

    let outcome = match command {
        Command::Announce {
            image,
            digest,
            previous_digest,
        } => notifier
            .announce(&UpdateEvent::new(image, digest, previous_digest))
            .await
            .map_err(Into::into),
        Command::Serve => serve(&notifier).await,
    };

    if let Err(e) = notifier.shutdown().await {
        warn!("Clean shutdown failed: {}", e);
    }
    outcome
}

async fn serve<C: Connector>(
    notifier: &HomeAssistant<C>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("Reading update events from stdin");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("End of input. Exiting.");
                    return Ok(());
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<UpdateEvent>(&line) {
                    Ok(event) => {
                        if let Err(e) = notifier.announce(&event).await {
                            error!(image = %event.image, "{} notification failed: {}", notifier.name(), e);
                        }
                    }
                    Err(e) => warn!("Invalid update event: {} | {}", e, line),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received. Exiting gracefully.");
                return Ok(());
            }
        }
    }
}

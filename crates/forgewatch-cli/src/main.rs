//! forgewatch CLI - printer status monitor
//!
//! Polls a FlashForge printer and prints its status.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forgewatch::{Config, PollSettings, PollingCoordinator, PrinterEndpoint, TcpTransport};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(name = "forgewatch")]
#[command(about = "Status monitor for FlashForge printers", long_about = None)]
struct Cli {
    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Printer host (overrides the config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Printer command port (overrides the config file)
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Poll once and print the snapshot
    Status {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Poll continuously, printing each update
    Watch,
    /// Print the camera stream URL
    Camera,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    match cli.command {
        Commands::Status { json } => status(config, json).await?,
        Commands::Watch => watch(config).await?,
        Commands::Camera => println!("{}", config.printer.camera_url()),
    }

    Ok(())
}

/// Merge the config file (if any) with command-line overrides.
fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            let host = cli
                .host
                .clone()
                .context("no printer configured: pass --host or --config")?;
            Config {
                printer: PrinterEndpoint::new(host, forgewatch::endpoint::DEFAULT_PORT),
                polling: PollSettings::default(),
            }
        }
    };

    if cli.host.is_some() || cli.port.is_some() {
        let host = cli
            .host
            .clone()
            .unwrap_or_else(|| config.printer.host().to_string());
        let port = cli.port.unwrap_or(config.printer.port());
        config.printer = PrinterEndpoint::new(host, port);
    }

    Ok(config)
}

async fn status(config: Config, json: bool) -> Result<()> {
    let printer = PollingCoordinator::new(config.printer, TcpTransport::new(), config.polling);
    printer.refresh().await;
    let cached = printer.current_status();

    if json {
        println!("{}", serde_json::to_string_pretty(&cached)?);
    } else {
        print!("{}", render::render(printer.endpoint(), &cached));
    }

    if !cached.available {
        anyhow::bail!("printer {} is unavailable", printer.endpoint());
    }
    Ok(())
}

async fn watch(config: Config) -> Result<()> {
    let settings = config.polling;
    let printer = PollingCoordinator::new(config.printer, TcpTransport::new(), settings);
    let mut updates = printer.subscribe();
    printer.start(settings.interval(), settings.cycle_timeout())?;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let cached = updates.borrow_and_update().clone();
                print!("{}", render::render(printer.endpoint(), &cached));
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    printer.stop().await;
    Ok(())
}

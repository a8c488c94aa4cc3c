//! EV booking service - CLI server
//!
//! Headless booking and payment reconciliation server suitable for
//! deployment as a systemd service, Docker container, or standalone process.
//!
//! ```sh
//! # Run with default config (~/.config/ev-booking/config.toml)
//! evbook
//!
//! # Custom config path
//! evbook --config /etc/ev-booking/config.toml
//!
//! # Override port, run on in-memory storage
//! evbook --api-port 9090 --memory
//!
//! # Validate config without starting
//! evbook --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use evbook::config::AppConfig;
use evbook::server::{init_tracing, ServerHandle, ServerOptions};

/// EV charger slot booking and payment reconciliation server.
#[derive(Parser, Debug)]
#[command(
    name = "evbook",
    version,
    about = "Slot booking and payment reconciliation for EV charging stations",
    long_about = "REST API server for booking EV charger slots, settling sessions \
                  and reconciling gateway payments.\n\n\
                  Default config: ~/.config/ev-booking/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "EVBOOK_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Use in-memory storage instead of the configured database.
    #[arg(long)]
    memory: bool,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(evbook::default_config_path);

    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Invalid configuration {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    // ── Apply CLI overrides ────────────────────────────────────
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }
    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());

    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
        config.server.api_port = port;
    }
    if cli.memory {
        info!("CLI override: in-memory storage");
        config.database.url = "memory".to_string();
    }

    // ── Config validation mode ─────────────────────────────────
    if cli.check {
        if let Err(e) = config.validate() {
            error!("Configuration is invalid: {}", e);
            std::process::exit(1);
        }
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.api_host, config.server.api_port);
        println!("   Database    : {}", config.database.url);
        println!("   Stations    : {}", config.stations.len());
        println!("   Payments    : {:?}", config.payment.mode);
        println!("   Log level   : {}", config.logging.level);
        return Ok(());
    }

    // ── Start server ───────────────────────────────────────────
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}

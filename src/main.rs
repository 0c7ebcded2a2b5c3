//! host-router
//!
//! Reverse proxy front-end that picks a backend group from the request host.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌───────────────────────────────────────────────┐
//!                     │                  HOST ROUTER                   │
//!   Client Request    │  ┌─────────┐    ┌──────────────┐               │
//!   ──────────────────┼─▶│  http   │───▶│   routing    │               │
//!                     │  │ server  │    │ table (snap) │               │
//!                     │  └─────────┘    └──────┬───────┘               │
//!                     │                        ▼                       │
//!                     │                 ┌──────────────┐               │
//!   Client Response   │                 │load_balancer │   Backend     │
//!   ◀─────────────────┼─────────────────│ group + pool │◀──────────────┼──
//!                     │                 └──────────────┘               │
//!                     │  ┌─────────────────────────────────────────┐   │
//!                     │  │ config: rule file → reload → publish    │   │
//!                     │  │         watcher (notify) drives reloads │   │
//!                     │  └─────────────────────────────────────────┘   │
//!                     └───────────────────────────────────────────────┘
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use host_router::config::loader::load_config;
use host_router::config::reload::load_file;
use host_router::config::ProxyConfig;
use host_router::lifecycle::{signals, startup, Shutdown};
use host_router::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "host-router")]
#[command(about = "Routes HTTP requests to backend groups by host name", long_about = None)]
struct Cli {
    /// Settings file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Rule file, overriding the settings.
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Listen address, overriding the settings.
    #[arg(long)]
    bind: Option<String>,

    /// Do not reload the rule file when it changes.
    #[arg(long)]
    no_watch: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a rule file and print its domains in match order
    Check {
        /// Rule file to check.
        rules: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(Commands::Check { rules }) = &cli.command {
        let table = load_file(rules, config.rules.group_options())?;
        for (priority, rule) in table.rules().iter().enumerate() {
            let backends: Vec<String> = rule
                .backend_group()
                .backends()
                .iter()
                .map(|b| b.authority.to_string())
                .collect();
            println!("{:>3}  {:<30} {}", priority, rule.domain(), backends.join(", "));
        }
        return Ok(());
    }

    if let Some(rules) = cli.rules {
        config.rules.path = rules.display().to_string();
    }
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if cli.no_watch {
        config.rules.watch = false;
    }

    init_logging(&config.observability)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rules = %config.rules.path,
        watch = config.rules.watch,
        request_timeout_secs = config.timeouts.request_secs,
        "host-router v0.1.0 starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    startup::run(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

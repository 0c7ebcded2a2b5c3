//! Startup orchestration.
//!
//! # Responsibilities
//! - Load the rule file and publish the first routing table
//! - Start background tasks (rule watcher, metrics)
//! - Bind the listener and serve until shutdown
//!
//! # Design Decisions
//! - Fail fast: a startup error is fatal
//! - Listeners start last (traffic only when a table exists)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use crate::config::{ConfigError, ConfigReloader, ProxyConfig};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::SharedRoutingTable;

/// Error that stops the router from starting or serving.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("initial rule load failed: {0}")]
    Rules(#[from] ConfigError),

    #[error("cannot bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Build the reloader described by the settings.
pub fn reloader_for(config: &ProxyConfig, table: SharedRoutingTable) -> ConfigReloader {
    ConfigReloader::new(&config.rules.path, table)
        .with_options(config.rules.group_options())
        .with_debounce(Duration::from_millis(config.rules.debounce_ms))
}

/// Run the router until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let table = SharedRoutingTable::new();
    let reloader = Arc::new(reloader_for(&config, table.clone()));

    // 1. Rules: without a table there is nothing safe to serve
    reloader.reload()?;

    // 2. Rule watcher
    let watch_task = if config.rules.watch {
        Some(tokio::spawn(reloader.clone().watch_and_reload(shutdown.subscribe())))
    } else {
        tracing::info!("Rule file watching disabled");
        None
    };

    // 3. Metrics
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // 4. Listener
    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let server = HttpServer::new(&config, table);
    let served = server.run(listener, shutdown.subscribe()).await;

    // The server may also stop on its own; make sure the watcher follows.
    shutdown.trigger();
    tracing::debug!(pending = shutdown.receiver_count(), "Waiting for background tasks");
    if let Some(task) = watch_task {
        let _ = task.await;
    }

    served.map_err(StartupError::Serve)
}

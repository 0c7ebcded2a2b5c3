//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and drain on shutdown
//! - Resolve the request host against the current routing table
//! - Forward requests to the matched backend group

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::request::{request_host, request_id, MakeRequestUuid};
use crate::http::response;
use crate::load_balancer::{pool::upstream_client, DispatchError, UpstreamClient};
use crate::observability::metrics;
use crate::routing::SharedRoutingTable;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub table: SharedRoutingTable,
    pub client: UpstreamClient,
}

/// HTTP server for the router.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server reading routes from `table`.
    pub fn new(config: &ProxyConfig, table: SharedRoutingTable) -> Self {
        let state = AppState {
            table,
            client: upstream_client(Duration::from_secs(config.timeouts.connect_secs)),
        };

        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving or driving in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Resolves the host, then hands the request to the backend group.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let method = request.method().to_string();
    let request_id = request_id(&request).to_string();

    // 1. Host
    let host = match request_host(&request) {
        Some(host) => host.to_string(),
        None => {
            tracing::debug!(request_id = %request_id, "Request without host");
            metrics::record_request(&method, 400, "none", start_time);
            return response::missing_host();
        }
    };

    // 2. Resolve against the current snapshot
    let matched = state.table.snapshot().and_then(|table| {
        table
            .resolve_rule(&host)
            .map(|rule| (rule.domain().to_string(), Arc::clone(rule.backend_group())))
    });

    let (domain, group) = match matched {
        Some(found) => found,
        None => {
            tracing::debug!(request_id = %request_id, host = %host, "No rule matched");
            metrics::record_request(&method, 404, "none", start_time);
            return response::not_found();
        }
    };

    tracing::debug!(request_id = %request_id, host = %host, domain = %domain, "Proxying request");

    // 3. Forward
    match group.dispatch(&state.client, request).await {
        Ok(upstream) => {
            metrics::record_request(&method, upstream.status().as_u16(), &domain, start_time);
            upstream.into_response()
        }
        Err(DispatchError::NoAvailableBackend) => {
            tracing::warn!(request_id = %request_id, domain = %domain, "No available backend");
            metrics::record_request(&method, 503, &domain, start_time);
            response::no_backend()
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, domain = %domain, error = %e, "Upstream error");
            metrics::record_request(&method, 502, &domain, start_time);
            response::bad_gateway()
        }
    }
}

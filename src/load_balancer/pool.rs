//! Backend group management.
//!
//! # Responsibilities
//! - Build a group of backends from the endpoints of one rule
//! - Apply the configured load balancing algorithm to select a backend
//! - Forward a request to the selected backend

use axum::body::Body;
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;

use crate::load_balancer::{
    backend::{Backend, BackendConnectionGuard, BackendError},
    Balancing, LoadBalancer,
};

/// HTTP client shared by every group for upstream requests.
pub type UpstreamClient = Client<HttpConnector, Body>;

/// Shared handle to a backend group, as stored in routing rules.
pub type BackendGroupHandle = Arc<BackendGroup>;

/// Build the upstream client with the given connect timeout.
pub fn upstream_client(connect_timeout: Duration) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Settings applied to every group built from a rule file.
#[derive(Debug, Clone, Copy)]
pub struct GroupOptions {
    pub balancing: Balancing,
    pub max_connections: usize,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            balancing: Balancing::RoundRobin,
            max_connections: 100,
        }
    }
}

/// Error forwarding a request to a group.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("no backend available in group")]
    NoAvailableBackend,

    #[error("invalid upstream uri: {0}")]
    InvalidUri(#[from] axum::http::uri::InvalidUriParts),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

/// An ordered set of backends behind one domain rule.
#[derive(Debug)]
pub struct BackendGroup {
    backends: Vec<Arc<Backend>>,
    balancer: Box<dyn LoadBalancer>,
}

impl BackendGroup {
    /// Create a group from endpoint strings. Fails on the first bad endpoint.
    pub fn new<S: AsRef<str>>(endpoints: &[S], options: GroupOptions) -> Result<Self, BackendError> {
        if endpoints.is_empty() {
            return Err(BackendError::NoEndpoints);
        }

        let backends = endpoints
            .iter()
            .map(|endpoint| Backend::parse(endpoint.as_ref(), options.max_connections).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            backends,
            balancer: options.balancing.build(),
        })
    }

    /// Backends in declaration order.
    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    /// Select a backend.
    /// Returns a guard that decrements the connection count on drop.
    pub fn select(&self) -> Option<BackendConnectionGuard> {
        match self.balancer.next_server(&self.backends) {
            Some(backend) => backend.try_create_guard(),
            None => {
                tracing::debug!(backend_count = self.backends.len(), "No backend with spare capacity");
                None
            }
        }
    }

    /// Forward a request to one of the group's backends.
    ///
    /// The request URI is retargeted at the chosen backend; headers, including
    /// the original `Host`, are passed through unchanged.
    pub async fn dispatch(
        &self,
        client: &UpstreamClient,
        request: Request<Body>,
    ) -> Result<Response<Body>, DispatchError> {
        let backend = self.select().ok_or(DispatchError::NoAvailableBackend)?;

        let (mut parts, body) = request.into_parts();
        let mut uri_parts = parts.uri.into_parts();
        uri_parts.scheme = Some(Scheme::HTTP);
        uri_parts.authority = Some(backend.authority.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        parts.uri = Uri::from_parts(uri_parts)?;
        parts.version = Version::HTTP_11;

        tracing::debug!(backend = %backend.base_url, uri = %parts.uri, "Forwarding request");

        let response = client.request(Request::from_parts(parts, body)).await?;
        Ok(response.map(Body::new))
    }
}

//! Backend abstraction.
//!
//! # Responsibilities
//! - Parse a backend endpoint string into a forwarding target
//! - Track active connections (for Least Connections LB)
//! - Enforce max connection limits

use axum::http::uri::Authority;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Error building a backend or a backend group.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// A group was declared without any endpoint.
    #[error("backend list is empty")]
    NoEndpoints,

    /// The endpoint could not be parsed as a URL.
    #[error("parse {endpoint}: {source}")]
    InvalidAddress {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    /// Only plain HTTP upstreams are supported.
    #[error("unsupported scheme {scheme:?} in {endpoint}")]
    UnsupportedScheme { endpoint: String, scheme: String },

    /// The endpoint has no usable host or port.
    #[error("missing host in {0}")]
    MissingHost(String),
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    /// Host and port requests are forwarded to.
    pub authority: Authority,
    /// Normalized URL of the backend, as shown in logs.
    pub base_url: Url,
    /// Maximum concurrent connections allowed.
    pub max_connections: usize,
    /// Number of currently active connections.
    pub active_connections: AtomicUsize,
}

impl Backend {
    /// Parse an endpoint such as `localhost:3000` or `http://10.0.0.1:8080`.
    ///
    /// Endpoints without a scheme are treated as `http://`.
    pub fn parse(endpoint: &str, max_connections: usize) -> Result<Self, BackendError> {
        let candidate = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{}", endpoint)
        };

        let base_url = Url::parse(&candidate).map_err(|source| BackendError::InvalidAddress {
            endpoint: candidate.clone(),
            source,
        })?;

        if base_url.scheme() != "http" {
            return Err(BackendError::UnsupportedScheme {
                endpoint: endpoint.to_string(),
                scheme: base_url.scheme().to_string(),
            });
        }

        let host = base_url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| BackendError::MissingHost(endpoint.to_string()))?;
        let port = base_url
            .port_or_known_default()
            .ok_or_else(|| BackendError::MissingHost(endpoint.to_string()))?;

        let authority = Authority::from_str(&format!("{}:{}", host, port))
            .map_err(|_| BackendError::MissingHost(endpoint.to_string()))?;

        Ok(Self {
            authority,
            base_url,
            max_connections,
            active_connections: AtomicUsize::new(0),
        })
    }

    /// Get the current number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Increment active connection count.
    pub fn inc_connections(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement active connection count.
    pub fn dec_connections(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Try to create a connection guard that increments count.
    pub fn try_create_guard(self: &Arc<Self>) -> Option<BackendConnectionGuard> {
        let mut prev = self.active_connections.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_connections {
                return None;
            }
            match self.active_connections.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(BackendConnectionGuard {
            backend: self.clone(),
        })
    }

    /// Whether another connection fits under the limit.
    pub fn has_capacity(&self) -> bool {
        self.connection_count() < self.max_connections
    }
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    pub backend: Arc<Backend>,
}

impl Deref for BackendConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        self.backend.dec_connections();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_without_scheme() {
        let backend = Backend::parse("localhost:3232", 10).unwrap();
        assert_eq!(backend.authority.as_str(), "localhost:3232");
        assert_eq!(backend.base_url.scheme(), "http");
    }

    #[test]
    fn test_parse_default_port() {
        let backend = Backend::parse("http://10.10.10.10", 10).unwrap();
        assert_eq!(backend.authority.as_str(), "10.10.10.10:80");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            Backend::parse("%%%%", 10),
            Err(BackendError::InvalidAddress { .. })
        ));
        assert!(matches!(
            Backend::parse("localhost:notaport", 10),
            Err(BackendError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_https() {
        assert!(matches!(
            Backend::parse("https://example.com", 10),
            Err(BackendError::UnsupportedScheme { .. })
        ));
    }

    #[test]
    fn test_guard_respects_limit() {
        let backend = Arc::new(Backend::parse("127.0.0.1:8080", 1).unwrap());

        let guard = backend.try_create_guard().unwrap();
        assert_eq!(backend.connection_count(), 1);
        assert!(backend.try_create_guard().is_none());

        drop(guard);
        assert_eq!(backend.connection_count(), 0);
        assert!(backend.try_create_guard().is_some());
    }
}

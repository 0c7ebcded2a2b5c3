//! Host-based routing front-end for a reverse proxy.
//!
//! Requests are routed by the first rule whose domain pattern occurs in the
//! request host. Rules live in a file that is reloaded while the proxy runs;
//! a broken file never replaces the rules already in service.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod routing;

pub use config::{ConfigError, ConfigReloader, ProxyConfig};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{RoutingTable, SharedRoutingTable};

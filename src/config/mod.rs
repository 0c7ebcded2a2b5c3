//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable, read once at startup)
//!
//! rule file (JSON or TOML)
//!     → reload.rs (parse, build backend groups, RoutingTable)
//!     → routing::SharedRoutingTable (atomic publish)
//!
//! On change:
//!     watcher.rs detects change
//!     → reload.rs loads new rules
//!     → on success: atomic swap of Arc<RoutingTable>
//!     → on failure: log, keep serving the previous table
//! ```
//!
//! # Design Decisions
//! - Rule tables are immutable once loaded; changes require full reload
//! - All settings fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod reload;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use reload::{ConfigError, ConfigReloader, RuleFormat};
pub use schema::ProxyConfig;
pub use schema::ListenerConfig;
pub use schema::RulesConfig;
pub use schema::RuleRecord;
pub use watcher::{ConfigWatcher, WatchError, WatchEvent};

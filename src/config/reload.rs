//! Rule file loading and live reload.
//!
//! # Responsibilities
//! - Turn rule file bytes into a validated `RoutingTable`
//! - Publish new tables to the shared holder
//! - Drive reloads from file change events until shutdown
//!
//! # Design Decisions
//! - Loading is all-or-nothing: one bad record discards the whole file
//! - A failed reload never touches the published table
//! - Reload attempts are serialized; readers are never blocked by them
//! - File I/O runs on the blocking pool, never on a request path

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use crate::config::schema::{RuleRecord, TomlRuleFile};
use crate::config::watcher::{ConfigWatcher, WatchEvent};
use crate::load_balancer::{BackendGroup, GroupOptions};
use crate::observability::metrics;
use crate::routing::{Rule, RoutingTable, SharedRoutingTable};

/// Error loading a rule file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The bytes do not have the rule file shape.
    #[error("invalid rule file: {0}")]
    Malformed(String),

    /// A record lists a backend that cannot be used.
    #[error("invalid backend in rule file: {0}")]
    InvalidBackend(String),

    /// The rule file could not be read.
    #[error("cannot read rule file {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigError::Malformed(_) => "malformed",
            ConfigError::InvalidBackend(_) => "invalid_backend",
            ConfigError::SourceUnavailable { .. } => "source_unavailable",
        }
    }
}

/// Encoding of a rule file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuleFormat {
    /// A JSON array of `{"Domain": ..., "Backends": [...]}` records.
    #[default]
    Json,
    /// A TOML document of `[[rule]]` tables.
    Toml,
}

impl RuleFormat {
    /// TOML for a `.toml` extension, JSON for anything else.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => RuleFormat::Toml,
            _ => RuleFormat::Json,
        }
    }
}

/// Build a routing table from JSON rule file bytes with default group options.
pub fn load_from_source(raw: &[u8]) -> Result<RoutingTable, ConfigError> {
    load_from_source_as(raw, RuleFormat::Json, GroupOptions::default())
}

/// Build a routing table from rule file bytes.
///
/// Records keep their file order. Any malformed record or unusable backend
/// fails the whole load.
pub fn load_from_source_as(
    raw: &[u8],
    format: RuleFormat,
    options: GroupOptions,
) -> Result<RoutingTable, ConfigError> {
    let records = parse_records(raw, format)?;

    let mut rules = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if record.domain.is_empty() {
            return Err(ConfigError::Malformed(format!(
                "rule {}: domain must not be empty",
                index
            )));
        }

        let group = BackendGroup::new(record.backends.as_slice(), options).map_err(|e| {
            ConfigError::InvalidBackend(format!("rule {} ({}): {}", index, record.domain, e))
        })?;

        rules.push(Rule::new(record.domain, Arc::new(group)));
    }

    Ok(RoutingTable::new(rules))
}

fn parse_records(raw: &[u8], format: RuleFormat) -> Result<Vec<RuleRecord>, ConfigError> {
    match format {
        RuleFormat::Json => {
            serde_json::from_slice(raw).map_err(|e| ConfigError::Malformed(e.to_string()))
        }
        RuleFormat::Toml => {
            let text = std::str::from_utf8(raw).map_err(|e| ConfigError::Malformed(e.to_string()))?;
            let file: TomlRuleFile =
                toml::from_str(text).map_err(|e| ConfigError::Malformed(e.to_string()))?;
            Ok(file.rules)
        }
    }
}

/// Read and build the rule file at `path`. Does not publish.
pub fn load_file(path: &Path, options: GroupOptions) -> Result<RoutingTable, ConfigError> {
    let raw = std::fs::read(path).map_err(|source| ConfigError::SourceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_source_as(&raw, RuleFormat::from_path(path), options)
}

/// Make `table` the current table of `holder`.
pub fn publish(table: RoutingTable, holder: &SharedRoutingTable) -> Arc<RoutingTable> {
    let table = holder.publish(table);
    metrics::set_routing_table(table.len(), table.version());
    table
}

/// Load the rule file at `path` with default group options and publish it.
///
/// On error the holder keeps whatever table it had.
pub fn reload_from(path: &Path, holder: &SharedRoutingTable) -> Result<Arc<RoutingTable>, ConfigError> {
    reload_from_with(path, holder, GroupOptions::default())
}

/// Load the rule file at `path` and publish it, recording the outcome.
///
/// On error the holder keeps whatever table it had.
pub fn reload_from_with(
    path: &Path,
    holder: &SharedRoutingTable,
    options: GroupOptions,
) -> Result<Arc<RoutingTable>, ConfigError> {
    match load_file(path, options) {
        Ok(table) => {
            metrics::record_reload("success");
            Ok(publish(table, holder))
        }
        Err(e) => {
            metrics::record_reload(e.kind());
            Err(e)
        }
    }
}

/// Owns the rule file path and keeps the shared table in sync with it.
#[derive(Debug)]
pub struct ConfigReloader {
    path: PathBuf,
    holder: SharedRoutingTable,
    options: GroupOptions,
    debounce: Duration,
    // Serializes whole reload attempts (read, build, publish).
    reload_lock: Mutex<()>,
}

impl ConfigReloader {
    pub fn new(path: impl Into<PathBuf>, holder: SharedRoutingTable) -> Self {
        Self {
            path: path.into(),
            holder,
            options: GroupOptions::default(),
            debounce: Duration::from_millis(50),
            reload_lock: Mutex::new(()),
        }
    }

    /// Options for the backend groups built on each reload.
    pub fn with_options(mut self, options: GroupOptions) -> Self {
        self.options = options;
        self
    }

    /// Quiet period between a change event and the reload it triggers.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn holder(&self) -> &SharedRoutingTable {
        &self.holder
    }

    /// Load the rule file and publish it. Blocking.
    pub fn reload(&self) -> Result<Arc<RoutingTable>, ConfigError> {
        let _serialized = self
            .reload_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let table = reload_from_with(&self.path, &self.holder, self.options)?;
        tracing::info!(
            path = %self.path.display(),
            version = table.version(),
            rules = table.len(),
            "Routing rules loaded"
        );
        Ok(table)
    }

    /// Reload on every change of the rule file until `shutdown` fires.
    ///
    /// Failed reloads are logged and the current table stays in service. If
    /// the file cannot be watched at all this logs a warning and returns.
    pub async fn watch_and_reload(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let (watcher, mut events) = match ConfigWatcher::subscribe(&self.path) {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Rule file is not watched for changes; serving the loaded rules until restart"
                );
                return;
            }
        };

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(WatchEvent::Modified) => {
                        self.settle(&mut events).await;
                        self.reload_blocking().await;
                    }
                    Some(WatchEvent::Removed) => {
                        tracing::warn!(path = %self.path.display(), "Rule file removed; keeping current rules");
                    }
                    Some(WatchEvent::Error(e)) => {
                        tracing::error!(error = %e, "Rule file watch error");
                    }
                    None => {
                        tracing::warn!("Rule file watch stream closed");
                        break;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Rule watcher received shutdown signal, exiting loop");
                    break;
                }
            }
        }

        drop(watcher);
    }

    /// Wait out the debounce period and drop events queued meanwhile.
    async fn settle(&self, events: &mut mpsc::UnboundedReceiver<WatchEvent>) {
        if !self.debounce.is_zero() {
            tokio::time::sleep(self.debounce).await;
        }
        while events.try_recv().is_ok() {}
    }

    async fn reload_blocking(self: &Arc<Self>) {
        tracing::info!(path = %self.path.display(), "Rule file change detected, reloading...");

        let reloader = Arc::clone(self);
        match tokio::task::spawn_blocking(move || reloader.reload()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::error!("Failed to reload rules: {}. Keeping current rules.", e);
            }
            Err(e) => {
                tracing::error!(error = %e, "Reload task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::Balancing;
    use std::io::Write;

    const RULES: &str = r#"[
        {"Domain": "souza.cc", "Backends": ["localhost:3232"]},
        {"Domain": "golang.org", "Backends": ["localhost:3131"]},
        {"Domain": "globo.com", "Backends": ["localhost:3030", "localhost:2929", "localhost:2121"]}
    ]"#;

    fn rules_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_keeps_file_order() {
        let table = load_from_source(RULES.as_bytes()).unwrap();

        assert_eq!(table.domains().collect::<Vec<_>>(), vec!["souza.cc", "golang.org", "globo.com"]);
        assert_eq!(table.rules()[2].backend_group().backends().len(), 3);
        assert_eq!(table.version(), 0);
    }

    #[test]
    fn test_lowercase_field_names() {
        let table = load_from_source(br#"[{"domain": "souza.cc", "backends": ["localhost:1"]}]"#).unwrap();
        assert!(table.resolve("souza.cc").is_some());
    }

    #[test]
    fn test_malformed_json() {
        let err = load_from_source(b"[{\"Domain\": \"souza.cc\",}]").unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
        assert!(err.to_string().starts_with("invalid rule file: "));

        assert!(matches!(load_from_source(b"------"), Err(ConfigError::Malformed(_))));
        assert!(matches!(load_from_source(b""), Err(ConfigError::Malformed(_))));
        assert!(matches!(
            load_from_source(br#"[{"Domain": "souza.cc"}]"#),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn test_empty_domain_is_malformed() {
        let err = load_from_source(br#"[{"Domain": "", "Backends": ["localhost:1"]}]"#).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn test_invalid_backend_fails_whole_load() {
        let raw = br#"[
            {"Domain": "souza.cc", "Backends": ["localhost:3232"]},
            {"Domain": "broken.com", "Backends": ["http://%%%%"]}
        ]"#;
        let err = load_from_source(raw).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBackend(_)));
        assert!(err.to_string().contains("broken.com"));
    }

    #[test]
    fn test_empty_backend_list_is_invalid() {
        let err = load_from_source(br#"[{"Domain": "souza.cc", "Backends": []}]"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBackend(_)));
    }

    #[test]
    fn test_toml_rules() {
        let raw = br#"
            [[rule]]
            domain = "souza.cc"
            backends = ["localhost:3232"]

            [[rule]]
            domain = "globo.com"
            backends = ["localhost:3030", "localhost:2929"]
        "#;
        let table = load_from_source_as(raw, RuleFormat::Toml, GroupOptions::default()).unwrap();
        assert_eq!(table.domains().collect::<Vec<_>>(), vec!["souza.cc", "globo.com"]);
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(RuleFormat::from_path(Path::new("rules.toml")), RuleFormat::Toml);
        assert_eq!(RuleFormat::from_path(Path::new("rules.json")), RuleFormat::Json);
        assert_eq!(RuleFormat::from_path(Path::new("rules")), RuleFormat::Json);
    }

    #[test]
    fn test_reload_from_missing_file() {
        let holder = SharedRoutingTable::new();
        let err = reload_from(Path::new("/nonexistent/rules.json"), &holder).unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
        assert!(!holder.is_initialized());
    }

    #[test]
    fn test_reload_applies_group_options() {
        let file = rules_file(RULES);
        let holder = SharedRoutingTable::new();
        let options = GroupOptions {
            balancing: Balancing::LeastConnections,
            max_connections: 7,
        };

        let table = reload_from_with(file.path(), &holder, options).unwrap();
        for rule in table.rules() {
            for backend in rule.backend_group().backends() {
                assert_eq!(backend.max_connections, 7);
            }
        }

        let defaults = reload_from(file.path(), &holder).unwrap();
        assert_eq!(defaults.rules()[0].backend_group().backends()[0].max_connections, 100);
        assert_eq!(defaults.version(), 2);
    }

    #[test]
    fn test_bad_reload_keeps_previous_table() {
        let file = rules_file(RULES);
        let holder = SharedRoutingTable::new();
        let before = reload_from(file.path(), &holder).unwrap();

        std::fs::write(file.path(), "------").unwrap();
        let err = reload_from(file.path(), &holder).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));

        let after = holder.snapshot().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(holder.resolve("f.souza.cc").is_some());
        assert!(holder.resolve("rust-lang.org").is_none());
    }

    #[test]
    fn test_reloader_publishes_new_versions() {
        let file = rules_file(RULES);
        let reloader = ConfigReloader::new(file.path(), SharedRoutingTable::new());

        assert_eq!(reloader.reload().unwrap().version(), 1);
        assert!(reloader.holder().resolve("rust-lang.org").is_none());

        std::fs::write(
            file.path(),
            r#"[{"Domain": "rust-lang.org", "Backends": ["10.10.10.10:8080"]}]"#,
        )
        .unwrap();
        let table = reloader.reload().unwrap();
        assert_eq!(table.version(), 2);
        assert!(reloader.holder().resolve("www.rust-lang.org").is_some());
    }

    #[tokio::test]
    async fn test_watch_without_subscription_returns() {
        let holder = SharedRoutingTable::new();
        let reloader = Arc::new(ConfigReloader::new("/nonexistent-dir/rules.json", holder));
        let (_tx, rx) = broadcast::channel(1);

        tokio::time::timeout(Duration::from_secs(5), reloader.watch_and_reload(rx))
            .await
            .expect("watch should give up immediately");
    }
}

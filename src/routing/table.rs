//! Immutable routing table.
//!
//! # Responsibilities
//! - Store domain rules in file order
//! - Resolve a host to the backend group of the first matching rule
//!
//! # Design Decisions
//! - A rule matches when its pattern occurs anywhere in the host
//!   (case-sensitive substring, no wildcards), so `example.com` also
//!   matches `www.example.com`
//! - First match wins; file order is the priority order
//! - Never mutated after construction, so snapshots are shared freely

use crate::load_balancer::BackendGroupHandle;

/// One domain pattern mapped to a backend group.
#[derive(Debug, Clone)]
pub struct Rule {
    domain: String,
    backend_group: BackendGroupHandle,
}

impl Rule {
    pub fn new(domain: impl Into<String>, backend_group: BackendGroupHandle) -> Self {
        Self {
            domain: domain.into(),
            backend_group,
        }
    }

    /// The substring matched against request hosts.
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn backend_group(&self) -> &BackendGroupHandle {
        &self.backend_group
    }

    fn matches(&self, host: &str) -> bool {
        host.contains(self.domain.as_str())
    }
}

/// Ordered, immutable set of rules.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    rules: Vec<Rule>,
    version: u64,
}

impl RoutingTable {
    /// Build a table from rules that were already validated.
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules, version: 0 }
    }

    /// Backend group of the first rule whose pattern occurs in `host`.
    pub fn resolve(&self, host: &str) -> Option<&BackendGroupHandle> {
        self.resolve_rule(host).map(Rule::backend_group)
    }

    /// Like [`resolve`](Self::resolve) but returns the whole rule.
    pub fn resolve_rule(&self, host: &str) -> Option<&Rule> {
        if host.is_empty() {
            return None;
        }
        self.rules.iter().find(|rule| rule.matches(host))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Domain patterns in priority order.
    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(Rule::domain)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Publish sequence number; 0 until the table has been published.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::{BackendGroup, GroupOptions};
    use std::sync::Arc;

    fn group(addr: &str) -> BackendGroupHandle {
        Arc::new(BackendGroup::new(&[addr], GroupOptions::default()).unwrap())
    }

    #[test]
    fn test_first_match_wins() {
        let x = group("127.0.0.1:1001");
        let y = group("127.0.0.1:1002");
        let table = RoutingTable::new(vec![
            Rule::new("a.com", x.clone()),
            Rule::new("a.com.evil.com", y.clone()),
        ]);

        let resolved = table.resolve("sub.a.com.evil.com").unwrap();
        assert!(Arc::ptr_eq(resolved, &x));
        assert!(!Arc::ptr_eq(resolved, &y));
    }

    #[test]
    fn test_substring_semantics() {
        let x = group("127.0.0.1:1001");
        let table = RoutingTable::new(vec![Rule::new("example.com", x.clone())]);

        assert!(Arc::ptr_eq(table.resolve("www.example.com").unwrap(), &x));
        assert!(Arc::ptr_eq(table.resolve("example.com").unwrap(), &x));
        assert!(table.resolve("example.org").is_none());
        assert!(table.resolve("").is_none());
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let table = RoutingTable::new(vec![Rule::new("example.com", group("127.0.0.1:1001"))]);
        assert!(table.resolve("WWW.EXAMPLE.COM").is_none());
    }

    #[test]
    fn test_cross_matches_are_kept() {
        let table = RoutingTable::new(vec![Rule::new("a.com", group("127.0.0.1:1001"))]);
        assert_eq!(table.resolve_rule("not-a.comrade.org").unwrap().domain(), "a.com");
    }

    #[test]
    fn test_subdomains_resolve_to_their_group() {
        let souza = group("127.0.0.1:1001");
        let globo = group("127.0.0.1:1002");
        let table = RoutingTable::new(vec![
            Rule::new("souza.cc", souza.clone()),
            Rule::new("globo.com", globo.clone()),
        ]);

        for host in ["souza.cc", "f.souza.cc"] {
            assert!(Arc::ptr_eq(table.resolve(host).unwrap(), &souza));
        }
        for host in ["globo.com", "www.globo.com", "g1.globo.com"] {
            assert!(Arc::ptr_eq(table.resolve(host).unwrap(), &globo));
        }
    }

    #[test]
    fn test_empty_table() {
        let table = RoutingTable::default();
        assert!(table.is_empty());
        assert_eq!(table.version(), 0);
        assert!(table.resolve("anything").is_none());
    }
}

//! Domain name normalization and WHOIS server lookup
//!
//! The server for a domain is picked by its TLD label. Labels may span more
//! than one DNS label (`co.uk`), so resolution walks the domain's suffixes
//! from longest to shortest and takes the first configured one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from TLD label to WHOIS server host
///
/// Labels are stored lowercase without a leading dot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct WhoisServerMap {
    servers: BTreeMap<String, String>,
}

impl WhoisServerMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the server for a label, returning the previous host
    pub fn insert(&mut self, label: impl AsRef<str>, server: impl Into<String>) -> Option<String> {
        self.servers
            .insert(normalize_label(label.as_ref()), server.into().trim().to_string())
    }

    /// Remove the server for a label
    pub fn remove(&mut self, label: &str) -> Option<String> {
        self.servers.remove(&normalize_label(label))
    }

    /// Server configured for exactly this label
    pub fn get(&self, label: &str) -> Option<&str> {
        self.servers.get(&normalize_label(label)).map(String::as_str)
    }

    /// Number of configured labels
    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Whether no label is configured
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Iterate over `(label, server)` pairs in label order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.servers.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Resolve the WHOIS server for a domain
    ///
    /// Returns the matched label and the server host. The longest configured
    /// suffix wins: with both `uk` and `co.uk` present, `example.co.uk`
    /// resolves through `co.uk`.
    ///
    /// This is not a public-suffix lookup: with only `uk` configured,
    /// `example.co.uk` still resolves through the `uk` server.
    pub fn resolve(&self, domain: &str) -> Option<(&str, &str)> {
        let domain = domain.trim_end_matches('.');
        let lowered;
        let domain = if domain.bytes().any(|b| b.is_ascii_uppercase()) {
            lowered = domain.to_ascii_lowercase();
            lowered.as_str()
        } else {
            domain
        };

        domain
            .match_indices('.')
            .map(|(idx, _)| &domain[idx + 1..])
            .find_map(|suffix| {
                self.servers
                    .get_key_value(suffix)
                    .map(|(label, server)| (label.as_str(), server.as_str()))
            })
    }
}

impl From<BTreeMap<String, String>> for WhoisServerMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

impl From<WhoisServerMap> for BTreeMap<String, String> {
    fn from(map: WhoisServerMap) -> Self {
        map.servers
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for WhoisServerMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (label, server) in iter {
            map.insert(label, server);
        }
        map
    }
}

fn normalize_label(label: &str) -> String {
    label.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Normalize a configured domain name
///
/// Trims whitespace, lowercases, and drops a trailing root dot. Returns
/// `None` for entries that cannot be a registrable name (empty, or without
/// any dot).
pub fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().trim_end_matches('.').to_ascii_lowercase();
    if domain.is_empty() || !domain.contains('.') || domain.starts_with('.') {
        return None;
    }
    Some(domain)
}

/// Normalize a whole list, dropping invalid entries and later duplicates
pub fn normalize_domain_list<S: AsRef<str>>(domains: &[S]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    domains
        .iter()
        .filter_map(|d| normalize_domain(d.as_ref()))
        .filter(|d| seen.insert(d.clone()))
        .collect()
}

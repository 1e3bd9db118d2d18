// # Memory Sources
//
// In-memory domain list and WHOIS server map.
//
// ## When to Use
//
// - Embedding the monitor in an application that owns its own configuration
// - Testing environments

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::tld::{WhoisServerMap, normalize_domain};
use crate::traits::{DomainListProvider, WhoisServerProvider};
use crate::Error;

/// In-memory implementation of both list providers
///
/// Cloning yields another handle to the same lists, so a caller can keep one
/// handle for edits while the monitor reads through another.
#[derive(Debug, Clone, Default)]
pub struct MemorySources {
    inner: Arc<RwLock<SourcesInner>>,
}

#[derive(Debug, Default)]
struct SourcesInner {
    domains: Vec<String>,
    servers: WhoisServerMap,
}

impl MemorySources {
    /// Create empty sources
    pub fn new() -> Self {
        Self::default()
    }

    /// Create sources pre-filled with domains and servers
    pub fn with_lists<I, S>(domains: I, servers: WhoisServerMap) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner: Arc::new(RwLock::new(SourcesInner {
                domains: domains.into_iter().map(Into::into).collect(),
                servers,
            })),
        }
    }

    /// Append a domain; returns `false` if it was already listed
    pub async fn add_domain(&self, domain: &str) -> Result<bool, Error> {
        let domain = normalize_domain(domain)
            .ok_or_else(|| Error::invalid_input(format!("Not a domain name: '{}'", domain)))?;

        let mut guard = self.inner.write().await;
        if guard.domains.contains(&domain) {
            return Ok(false);
        }
        guard.domains.push(domain);
        Ok(true)
    }

    /// Remove a domain; returns `false` if it was not listed
    pub async fn remove_domain(&self, domain: &str) -> bool {
        let needle = normalize_domain(domain).unwrap_or_else(|| domain.to_string());
        let mut guard = self.inner.write().await;
        let before = guard.domains.len();
        guard.domains.retain(|d| *d != needle);
        guard.domains.len() != before
    }

    /// Replace the whole domain list
    pub async fn set_domains<I, S>(&self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.write().await.domains = domains.into_iter().map(Into::into).collect();
    }

    /// Add or replace the WHOIS server for a TLD label
    pub async fn add_whois_server(&self, label: &str, server: &str) {
        self.inner.write().await.servers.insert(label, server);
    }

    /// Remove the WHOIS server for a TLD label
    pub async fn remove_whois_server(&self, label: &str) -> bool {
        self.inner.write().await.servers.remove(label).is_some()
    }

    /// Current domain list
    pub async fn domains(&self) -> Vec<String> {
        self.inner.read().await.domains.clone()
    }
}

#[async_trait]
impl DomainListProvider for MemorySources {
    async fn load_domains(&self) -> Result<Vec<String>, Error> {
        Ok(self.inner.read().await.domains.clone())
    }
}

#[async_trait]
impl WhoisServerProvider for MemorySources {
    async fn load_whois_servers(&self) -> Result<WhoisServerMap, Error> {
        Ok(self.inner.read().await.servers.clone())
    }
}

// # File Sources
//
// YAML-file implementation of the domain list and WHOIS server providers.
//
// ## Files
//
// Both files live in one configuration directory and are created with
// defaults on first open:
//
// ```yaml
// # list.yml
// domains:
//   - example.com
//   - example.net
// ```
//
// ```yaml
// # whois.yml
// whois_servers:
//   cn: whois.cnnic.cn
//   com: whois.verisign-grs.com
// ```
//
// ## Writes
//
// Edits are read-modify-write under a process-local lock and land on disk
// through write-then-rename, so a concurrent reader sees either the old or
// the new file, never a torn one.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;

use crate::store::export::write_atomic;
use crate::tld::{WhoisServerMap, normalize_domain};
use crate::traits::{DomainListProvider, WhoisServerProvider};
use crate::Error;

/// Name of the domain list file
pub const DOMAIN_LIST_FILE: &str = "list.yml";

/// Name of the WHOIS server map file
pub const WHOIS_SERVERS_FILE: &str = "whois.yml";

#[derive(Debug, Default, Serialize, Deserialize)]
struct DomainListFile {
    #[serde(default)]
    domains: Option<Vec<String>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WhoisServersFile {
    #[serde(default)]
    whois_servers: Option<WhoisServerMap>,
}

/// WHOIS servers written to a fresh `whois.yml`
pub fn default_whois_servers() -> WhoisServerMap {
    [
        ("cn", "whois.cnnic.cn"),
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
    ]
    .into_iter()
    .collect()
}

/// File-backed list sources
///
/// # Example
///
/// ```rust,no_run
/// use puff_core::sources::FileSources;
/// use puff_core::traits::DomainListProvider;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sources = FileSources::open("./data").await?;
///     sources.add_domain("example.com").await?;
///
///     let domains = sources.load_domains().await?;
///     assert!(domains.contains(&"example.com".to_string()));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSources {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSources {
    /// Open (and initialize if needed) the configuration directory
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.exists() {
            fs::create_dir_all(&dir).await.map_err(|e| {
                Error::source(format!(
                    "Failed to create config directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        let sources = Self {
            dir,
            write_lock: Mutex::new(()),
        };
        sources.ensure_defaults().await?;
        Ok(sources)
    }

    /// Path of the domain list file
    pub fn domain_list_path(&self) -> PathBuf {
        self.dir.join(DOMAIN_LIST_FILE)
    }

    /// Path of the WHOIS server file
    pub fn whois_servers_path(&self) -> PathBuf {
        self.dir.join(WHOIS_SERVERS_FILE)
    }

    async fn ensure_defaults(&self) -> Result<(), Error> {
        let list_path = self.domain_list_path();
        if !list_path.exists() {
            tracing::info!("Creating default domain list at {}", list_path.display());
            self.save_domains(Vec::new()).await?;
        }

        let servers_path = self.whois_servers_path();
        if !servers_path.exists() {
            tracing::info!("Creating default WHOIS server map at {}", servers_path.display());
            self.save_whois_servers(default_whois_servers()).await?;
        }

        Ok(())
    }

    /// Append a domain; returns `false` if it was already listed
    pub async fn add_domain(&self, domain: &str) -> Result<bool, Error> {
        let domain = normalize_domain(domain)
            .ok_or_else(|| Error::invalid_input(format!("Not a domain name: '{}'", domain)))?;

        let _guard = self.write_lock.lock().await;
        let mut domains = self.read_domains().await?;
        if domains.contains(&domain) {
            return Ok(false);
        }
        domains.push(domain);
        self.save_domains(domains).await?;
        Ok(true)
    }

    /// Remove a domain; returns `false` if it was not listed
    pub async fn remove_domain(&self, domain: &str) -> Result<bool, Error> {
        let needle = normalize_domain(domain).unwrap_or_else(|| domain.to_string());

        let _guard = self.write_lock.lock().await;
        let mut domains = self.read_domains().await?;
        let before = domains.len();
        domains.retain(|d| normalize_domain(d).as_deref() != Some(needle.as_str()));
        if domains.len() == before {
            return Ok(false);
        }
        self.save_domains(domains).await?;
        Ok(true)
    }

    /// Add or replace the WHOIS server for a TLD label
    pub async fn add_whois_server(&self, label: &str, server: &str) -> Result<(), Error> {
        if label.trim().trim_start_matches('.').is_empty() || server.trim().is_empty() {
            return Err(Error::invalid_input(
                "TLD label and WHOIS server must both be non-empty",
            ));
        }

        let _guard = self.write_lock.lock().await;
        let mut servers = self.read_whois_servers().await?;
        servers.insert(label, server);
        self.save_whois_servers(servers).await
    }

    /// Remove the WHOIS server for a TLD label; returns `false` if absent
    pub async fn remove_whois_server(&self, label: &str) -> Result<bool, Error> {
        let _guard = self.write_lock.lock().await;
        let mut servers = self.read_whois_servers().await?;
        if servers.remove(label).is_none() {
            return Ok(false);
        }
        self.save_whois_servers(servers).await?;
        Ok(true)
    }

    async fn read_domains(&self) -> Result<Vec<String>, Error> {
        let path = self.domain_list_path();
        let content = read_file(&path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let file: DomainListFile = serde_yaml::from_str(&content).map_err(|e| {
            Error::source(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(file.domains.unwrap_or_default())
    }

    async fn read_whois_servers(&self) -> Result<WhoisServerMap, Error> {
        let path = self.whois_servers_path();
        let content = read_file(&path).await?;
        if content.trim().is_empty() {
            return Ok(WhoisServerMap::new());
        }
        let file: WhoisServersFile = serde_yaml::from_str(&content).map_err(|e| {
            Error::source(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(file.whois_servers.unwrap_or_default())
    }

    async fn save_domains(&self, domains: Vec<String>) -> Result<(), Error> {
        let yaml = serde_yaml::to_string(&DomainListFile {
            domains: Some(domains),
        })?;
        write_atomic(&self.domain_list_path(), yaml.as_bytes()).await
    }

    async fn save_whois_servers(&self, servers: WhoisServerMap) -> Result<(), Error> {
        let yaml = serde_yaml::to_string(&WhoisServersFile {
            whois_servers: Some(servers),
        })?;
        write_atomic(&self.whois_servers_path(), yaml.as_bytes()).await
    }
}

async fn read_file(path: &Path) -> Result<String, Error> {
    fs::read_to_string(path)
        .await
        .map_err(|e| Error::source(format!("Failed to read {}: {}", path.display(), e)))
}

#[async_trait]
impl DomainListProvider for FileSources {
    async fn load_domains(&self) -> Result<Vec<String>, Error> {
        self.read_domains().await
    }
}

#[async_trait]
impl WhoisServerProvider for FileSources {
    async fn load_whois_servers(&self) -> Result<WhoisServerMap, Error> {
        self.read_whois_servers().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn test_open_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let sources = FileSources::open(dir.path()).await.unwrap();

        assert!(sources.domain_list_path().exists());
        assert!(sources.load_domains().await.unwrap().is_empty());

        let servers = sources.load_whois_servers().await.unwrap();
        assert_eq!(servers.get("com"), Some("whois.verisign-grs.com"));
        assert_eq!(servers.len(), 4);
    }

    #[tokio::test]
    async fn test_open_keeps_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DOMAIN_LIST_FILE),
            "domains:\n  - example.com\n  - example.org\n",
        )
        .unwrap();
        std::fs::write(dir.path().join(WHOIS_SERVERS_FILE), "whois_servers:\n  IO: whois.nic.io\n")
            .unwrap();

        let sources = FileSources::open(dir.path()).await.unwrap();
        assert_eq!(
            sources.load_domains().await.unwrap(),
            vec!["example.com".to_string(), "example.org".to_string()]
        );
        let servers = sources.load_whois_servers().await.unwrap();
        assert_eq!(servers.get("io"), Some("whois.nic.io"));
        assert_eq!(servers.len(), 1);
    }

    #[tokio::test]
    async fn test_domain_edits_persist() {
        let dir = tempfile::tempdir().unwrap();
        let sources = FileSources::open(dir.path()).await.unwrap();

        assert!(assert_ok!(sources.add_domain("Example.com").await));
        assert!(!assert_ok!(sources.add_domain("example.com").await));
        assert_err!(sources.add_domain("   ").await);

        let reopened = FileSources::open(dir.path()).await.unwrap();
        assert_eq!(reopened.load_domains().await.unwrap(), vec!["example.com".to_string()]);

        assert!(assert_ok!(reopened.remove_domain("example.com").await));
        assert!(!assert_ok!(reopened.remove_domain("example.com").await));
        assert!(reopened.load_domains().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_whois_server_edits_persist() {
        let dir = tempfile::tempdir().unwrap();
        let sources = FileSources::open(dir.path()).await.unwrap();

        assert_ok!(sources.add_whois_server(".io", "whois.nic.io").await);
        assert_err!(sources.add_whois_server("dev", " ").await);
        assert!(assert_ok!(sources.remove_whois_server("cn").await));
        assert!(!assert_ok!(sources.remove_whois_server("cn").await));

        let servers = sources.load_whois_servers().await.unwrap();
        assert_eq!(servers.get("io"), Some("whois.nic.io"));
        assert_eq!(servers.get("cn"), None);
    }

    #[tokio::test]
    async fn test_null_lists_load_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DOMAIN_LIST_FILE), "domains:\n").unwrap();
        std::fs::write(dir.path().join(WHOIS_SERVERS_FILE), "").unwrap();

        let sources = FileSources::open(dir.path()).await.unwrap();
        assert!(sources.load_domains().await.unwrap().is_empty());
        assert!(sources.load_whois_servers().await.unwrap().is_empty());
    }
}

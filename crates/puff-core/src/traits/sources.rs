// # List Provider Traits
//
// Interfaces for the two pieces of configuration the monitor reloads at the
// start of every cycle: the domains to watch and the WHOIS server per TLD.
//
// ## Implementations
//
// - In-memory: [`crate::sources::MemorySources`]
// - YAML files: [`crate::sources::FileSources`]

use async_trait::async_trait;

use crate::tld::WhoisServerMap;

/// Source of the ordered list of domains to watch
///
/// The list is not assumed static. It is reloaded at every cycle and the
/// status store is re-synced against it.
#[async_trait]
pub trait DomainListProvider: Send + Sync {
    /// Load the current domain list
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<String>)`: Domains in configured order (may contain
    ///   duplicates or unnormalized names; the orchestrator cleans them up)
    /// - `Err(Error)`: The list could not be obtained
    async fn load_domains(&self) -> Result<Vec<String>, crate::Error>;
}

/// Source of the TLD label → WHOIS server mapping
#[async_trait]
pub trait WhoisServerProvider: Send + Sync {
    /// Load the current WHOIS server map
    async fn load_whois_servers(&self) -> Result<WhoisServerMap, crate::Error>;
}

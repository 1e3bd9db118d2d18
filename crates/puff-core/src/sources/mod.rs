// # List Sources
//
// Implementations of `DomainListProvider` and `WhoisServerProvider`.

pub mod file;
pub mod memory;

pub use file::{DOMAIN_LIST_FILE, FileSources, WHOIS_SERVERS_FILE, default_whois_servers};
pub use memory::MemorySources;

// # WHOIS Probe
//
// This crate provides the port-43 WHOIS probe for the Puff domain watcher.
//
// ## Protocol
//
// WHOIS (RFC 3912) is a single request/response exchange: connect, send the
// query terminated by CRLF, read until the server closes the connection.
// There is no structured status field, so registration state is inferred from
// well-known phrases in the free-text answer (see [`classify`]).
//
// ## Limits
//
// - The whole exchange runs under the caller's timeout
// - Responses are capped at [`DEFAULT_MAX_RESPONSE_BYTES`]
// - No referral following; the configured server is authoritative

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use puff_core::traits::{ProbeAdapter, RegistrationObservation};
use puff_core::{Error, Result};

/// Standard WHOIS port
pub const WHOIS_PORT: u16 = 43;

/// Largest response read from a server
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 1024 * 1024;

/// Phrases meaning "this name is not registered"
const NOT_REGISTERED_PHRASES: &[&str] = &[
    "no match",
    "no object found",
    "not found",
    "no entries found",
    "no data found",
    "domain not found",
    "not exist",
    "is available",
];

/// Phrases meaning "registered, but in the redemption grace period"
const REDEMPTION_PHRASES: &[&str] = &["redemption period", "redemptionperiod", "status: redemption"];

/// Phrases meaning "registered, but queued for deletion"
const PENDING_DELETE_PHRASES: &[&str] = &["pending delete", "pendingdelete"];

/// Infer a registration observation from a raw WHOIS answer
///
/// Matching is case-insensitive. A pending-delete or redemption phrase always
/// implies the name is still registered, whatever else the answer says.
///
/// `.cc` registries answer in their own format and get a reduced rule set:
/// "no match" means available, "pendingdelete" means pending delete, anything
/// else means registered.
pub fn classify(domain: &str, response: &str) -> RegistrationObservation {
    let response = response.to_lowercase();
    let contains_any = |phrases: &[&str]| phrases.iter().any(|phrase| response.contains(phrase));

    if domain.to_ascii_lowercase().ends_with(".cc") {
        return if response.contains("no match") {
            RegistrationObservation::available()
        } else if response.contains("pendingdelete") {
            RegistrationObservation::pending_delete()
        } else {
            RegistrationObservation::registered()
        };
    }

    let pending_delete = contains_any(PENDING_DELETE_PHRASES);
    let redemption = contains_any(REDEMPTION_PHRASES);
    let not_registered = contains_any(NOT_REGISTERED_PHRASES);

    RegistrationObservation {
        registered: !not_registered || pending_delete || redemption,
        redemption,
        pending_delete,
    }
}

/// Port-43 WHOIS probe
///
/// Stateless apart from its settings; one instance is shared by every probe
/// task of a cycle.
#[derive(Debug, Clone)]
pub struct WhoisProbe {
    port: u16,
    max_response_bytes: usize,
}

impl WhoisProbe {
    /// Create a probe talking to the standard WHOIS port
    pub fn new() -> Self {
        Self {
            port: WHOIS_PORT,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Use a non-standard port (mostly useful against local test servers)
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Change the response size cap
    pub fn with_max_response_bytes(mut self, max: usize) -> Self {
        self.max_response_bytes = max;
        self
    }

    /// Send one query and return the raw answer
    ///
    /// The caller is responsible for bounding this with a timeout.
    pub async fn query(&self, domain: &str, server: &str) -> Result<String> {
        let mut stream = TcpStream::connect((server, self.port))
            .await
            .map_err(|e| Error::probe(format!("Failed to connect to {}:{}: {}", server, self.port, e)))?;

        stream
            .write_all(format!("{}\r\n", domain).as_bytes())
            .await
            .map_err(|e| Error::probe(format!("Failed to send query to {}: {}", server, e)))?;

        let mut buf = Vec::new();
        (&mut stream)
            .take(self.max_response_bytes as u64)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| Error::probe(format!("Failed to read answer from {}: {}", server, e)))?;

        if buf.len() >= self.max_response_bytes {
            debug!("Answer from {} for {} truncated at {} bytes", server, domain, buf.len());
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for WhoisProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProbeAdapter for WhoisProbe {
    async fn probe(
        &self,
        domain: &str,
        server: &str,
        timeout: Duration,
    ) -> Result<RegistrationObservation> {
        let response = tokio::time::timeout(timeout, self.query(domain, server))
            .await
            .map_err(|_| {
                Error::timeout(format!("{} did not answer for {} within {:?}", server, domain, timeout))
            })??;

        trace!("WHOIS answer for {} from {}:\n{}", domain, server, response);

        let observation = classify(domain, &response);
        debug!("{} classified as {}", domain, observation.status_label());
        Ok(observation)
    }

    fn probe_name(&self) -> &'static str {
        "whois"
    }
}

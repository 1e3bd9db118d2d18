// # Probe Adapter Trait
//
// Defines the interface for asking a WHOIS server about a domain.
//
// ## Implementations
//
// - Port 43 TCP: `puff-whois` crate
// - Tests: scripted probes in `tests/common`
//
// ## Usage
//
// ```rust,ignore
// use puff_core::ProbeAdapter;
// use std::time::Duration;
//
// let probe = /* ProbeAdapter implementation */;
// let observation = probe
//     .probe("example.com", "whois.verisign-grs.com", Duration::from_secs(10))
//     .await?;
//
// if observation.is_excursion() {
//     println!("{} is {}", "example.com", observation.status_label());
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registration state reported by one successful probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationObservation {
    /// The domain is held by someone
    pub registered: bool,
    /// The domain sits in its redemption grace period
    pub redemption: bool,
    /// The domain is scheduled for deletion
    pub pending_delete: bool,
}

impl RegistrationObservation {
    /// Registered, no redemption, no pending delete
    pub fn registered() -> Self {
        Self {
            registered: true,
            ..Self::default()
        }
    }

    /// Not registered by anyone
    pub fn available() -> Self {
        Self::default()
    }

    /// Registered but in the redemption period
    pub fn redemption() -> Self {
        Self {
            registered: true,
            redemption: true,
            pending_delete: false,
        }
    }

    /// Registered but pending deletion
    pub fn pending_delete() -> Self {
        Self {
            registered: true,
            redemption: false,
            pending_delete: true,
        }
    }

    /// Whether this observation deviates from the clean "registered" baseline
    pub fn is_excursion(&self) -> bool {
        !self.registered || self.redemption || self.pending_delete
    }

    /// Human-readable label used in notifications and status views
    pub fn status_label(&self) -> &'static str {
        if self.pending_delete {
            "pending delete"
        } else if self.redemption {
            "redemption period"
        } else if !self.registered {
            "available"
        } else {
            "registered"
        }
    }
}

/// Trait for WHOIS probe implementations
///
/// A probe answers one question: what registration state does `server`
/// report for `domain` right now. It holds no state between calls.
///
/// # Thread Safety
///
/// Probes are shared across the concurrent tasks of a refresh cycle and must
/// be safe to call from many tasks at once.
///
/// # Contract
///
/// - Must return within `timeout` (the orchestrator also enforces it)
/// - Must not retry internally; a failed probe is retried on the next cycle
/// - Must not touch domain status; interpreting the observation is the rule
///   engine's job
#[async_trait]
pub trait ProbeAdapter: Send + Sync {
    /// Query `server` for the registration state of `domain`
    ///
    /// # Parameters
    ///
    /// - `domain`: Normalized domain name (lowercase, no trailing dot)
    /// - `server`: WHOIS server host name
    /// - `timeout`: Upper bound for the whole exchange
    ///
    /// # Returns
    ///
    /// - `Ok(RegistrationObservation)`: The reported state
    /// - `Err(Error)`: Transport or timeout failure
    async fn probe(
        &self,
        domain: &str,
        server: &str,
        timeout: Duration,
    ) -> Result<RegistrationObservation, crate::Error>;

    /// Name used in log lines
    fn probe_name(&self) -> &'static str {
        "probe"
    }
}

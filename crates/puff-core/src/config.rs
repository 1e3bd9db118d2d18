//! Configuration types for the Puff domain watcher
//!
//! Only the monitor's own tuning knobs live here. Where the domain list and
//! WHOIS servers come from is decided by whoever constructs the providers.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Monitor configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between two refresh cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Hard per-probe ceiling (in seconds)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Consecutive excursion observations before the final notice fires
    #[serde(default = "default_notice_threshold")]
    pub notice_threshold: u32,

    /// Maximum number of WHOIS probes in flight during one cycle
    ///
    /// WHOIS registries rate-limit aggressively, so large lists should keep
    /// this well below the list size.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Capacity of the monitor event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl MonitorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            notice_threshold: default_notice_threshold(),
            max_concurrent_probes: default_max_concurrent_probes(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Set the refresh interval
    pub fn with_interval_secs(mut self, secs: u64) -> Self {
        self.interval_secs = secs;
        self
    }

    /// Set the per-probe timeout
    pub fn with_probe_timeout_secs(mut self, secs: u64) -> Self {
        self.probe_timeout_secs = secs;
        self
    }

    /// Set the notice threshold
    pub fn with_notice_threshold(mut self, threshold: u32) -> Self {
        self.notice_threshold = threshold;
        self
    }

    /// Set the probe concurrency cap
    pub fn with_max_concurrent_probes(mut self, max: usize) -> Self {
        self.max_concurrent_probes = max;
        self
    }

    /// Refresh interval as a [`Duration`]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Probe timeout as a [`Duration`]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Refresh interval must be > 0"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(crate::Error::config("Probe timeout must be > 0"));
        }
        if self.notice_threshold == 0 {
            return Err(crate::Error::config("Notice threshold must be >= 1"));
        }
        if self.max_concurrent_probes == 0 {
            return Err(crate::Error::config("Probe concurrency cap must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_interval_secs() -> u64 {
    300
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_notice_threshold() -> u32 {
    3
}

fn default_max_concurrent_probes() -> usize {
    16
}

fn default_event_channel_capacity() -> usize {
    1000
}

//! Error types for the Puff domain watcher
//!
//! Every crate in the workspace maps its failures into [`Error`] so the
//! orchestrator can tell soft skips from transient failures.

use thiserror::Error;

/// Result type alias for Puff operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the Puff domain watcher
#[derive(Error, Debug)]
pub enum Error {
    /// WHOIS probe transport errors (connect, read, protocol)
    #[error("Probe error: {0}")]
    Probe(String),

    /// A probe or delivery exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// No WHOIS server is configured for the domain's TLD label
    #[error("No WHOIS server configured for {0}")]
    NoWhoisServer(String),

    /// Notification delivery errors
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Domain list / WHOIS server map could not be loaded or saved
    #[error("Source error: {0}")]
    Source(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A schedule is already active for this monitor
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// `stop()` was called while no schedule was active
    #[error("Scheduler is not running")]
    NotRunning,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a probe error
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::Probe(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a "no WHOIS server" error for a domain
    pub fn no_whois_server(domain: impl Into<String>) -> Self {
        Self::NoWhoisServer(domain.into())
    }

    /// Create a dispatch error
    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }

    /// Create a source error
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the failure is expected to clear up on its own by the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Probe(_) | Self::Timeout(_) | Self::Io(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

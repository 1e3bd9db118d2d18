//! Core traits for the Puff domain watcher
//!
//! This module defines the seams between the monitor and its collaborators.
//!
//! - [`ProbeAdapter`]: Ask a WHOIS server about a domain
//! - [`NotificationDispatcher`]: Deliver notification batches
//! - [`DomainListProvider`] / [`WhoisServerProvider`]: Per-cycle configuration

pub mod dispatcher;
pub mod probe;
pub mod sources;

pub use dispatcher::{DomainNotification, NotificationDispatcher};
pub use probe::{ProbeAdapter, RegistrationObservation};
pub use sources::{DomainListProvider, WhoisServerProvider};

// # puff-core
//
// Core library for the Puff domain registration watcher.
//
// ## Architecture Overview
//
// This library watches a list of domains through WHOIS and raises a notice
// when one leaves the "registered, no redemption, no pending delete" state:
// - **ProbeAdapter**: Trait for asking a WHOIS server about a domain
// - **NotificationDispatcher**: Trait for delivering notification batches
// - **DomainListProvider / WhoisServerProvider**: Traits for per-cycle lists
// - **StatusStore**: The only owner of per-domain state
// - **NoticePolicy**: First/final notice rules
// - **MonitorEngine**: Orchestrates one refresh cycle
// - **Scheduler**: Runs cycles on a fixed interval
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from WHOIS and SMTP
// 2. **Library-First**: The daemon is a thin wrapper over this crate
// 3. **At-Least-Once**: Undelivered notices stay owed until a batch succeeds
// 4. **Isolation**: One domain's failure never affects another's status

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod rules;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod tld;
pub mod traits;

// Re-export core types for convenience
pub use config::MonitorConfig;
pub use dispatch::LogDispatcher;
pub use engine::{CycleReport, MonitorEngine, MonitorEvent};
pub use error::{Error, Result};
pub use rules::{Evaluation, NoticeKind, NoticePolicy};
pub use scheduler::Scheduler;
pub use sources::{FileSources, MemorySources};
pub use store::{DomainStatus, StatusStore, SyncSummary};
pub use tld::WhoisServerMap;
pub use traits::{
    DomainListProvider, DomainNotification, NotificationDispatcher, ProbeAdapter,
    RegistrationObservation, WhoisServerProvider,
};

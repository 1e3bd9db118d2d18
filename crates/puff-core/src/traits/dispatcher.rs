// # Notification Dispatcher Trait
//
// Defines the interface for delivering a batch of domain notifications.
//
// ## Implementations
//
// - SMTP: `puff-notifier-smtp` crate
// - Logging only: [`crate::dispatch::LogDispatcher`]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One entry of a notification batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainNotification {
    /// The domain whose state changed
    pub domain: String,
    /// Whether this is the terminal notice of the excursion
    pub is_final_notice: bool,
    /// Human-readable status, e.g. "available" or "pending delete"
    pub status_label: String,
}

impl DomainNotification {
    /// Create a notification entry
    pub fn new(
        domain: impl Into<String>,
        is_final_notice: bool,
        status_label: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            is_final_notice,
            status_label: status_label.into(),
        }
    }
}

/// Trait for notification delivery implementations
///
/// Dispatchers decide *how* a batch reaches a human. The orchestrator decides
/// *what* goes into the batch and *when*.
///
/// # Delivery Semantics
///
/// Delivery is at-least-once. A batch whose delivery failed is rebuilt and
/// handed over again on the next cycle, so implementations must tolerate
/// seeing the same entries twice.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Deliver a non-empty batch of notifications
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The whole batch was accepted for delivery
    /// - `Err(Error)`: Nothing should be considered delivered
    async fn deliver(&self, notifications: &[DomainNotification]) -> Result<(), crate::Error>;

    /// Name used in log lines
    fn dispatcher_name(&self) -> &'static str;
}

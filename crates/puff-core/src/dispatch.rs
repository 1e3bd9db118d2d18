//! Built-in dispatchers

use async_trait::async_trait;
use tracing::info;

use crate::traits::{DomainNotification, NotificationDispatcher};
use crate::Error;

/// Dispatcher that only writes notifications to the log
///
/// Used when no mail transport is configured. Delivery always succeeds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDispatcher;

impl LogDispatcher {
    /// Create a log dispatcher
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn deliver(&self, notifications: &[DomainNotification]) -> Result<(), Error> {
        for notification in notifications {
            info!(
                domain = %notification.domain,
                status = %notification.status_label,
                final_notice = notification.is_final_notice,
                "Domain status change"
            );
        }
        Ok(())
    }

    fn dispatcher_name(&self) -> &'static str {
        "log"
    }
}

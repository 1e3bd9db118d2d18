// # Domain Status Record
//
// Per-domain state tracked by the monitor between cycles.
//
// `first_flagged_at` is `Some` exactly while an excursion is being counted
// (`check_count > 0`). Once `final_noticed` is set the record is frozen until
// the domain leaves the configured list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::traits::{DomainNotification, RegistrationObservation};

/// State record for a monitored domain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainStatus {
    /// The domain name (identity key)
    pub domain: String,
    /// Last observed registration state
    pub registered: bool,
    /// Last observed redemption flag
    pub redemption: bool,
    /// Last observed pending-delete flag
    pub pending_delete: bool,
    /// Timestamp of the most recent successful probe
    pub last_checked: Option<DateTime<Utc>>,
    /// When the current excursion was first observed
    pub first_flagged_at: Option<DateTime<Utc>>,
    /// Consecutive observations confirming the current excursion
    pub check_count: u32,
    /// A notification is owed for this domain
    pub needs_notification: bool,
    /// The owed notification is the final one
    pub is_final_notice: bool,
    /// The final notice was raised; the domain is frozen
    pub final_noticed: bool,
}

impl DomainStatus {
    /// Create a zero-value record
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            ..Self::default()
        }
    }

    /// The last observed state as an observation
    pub fn observation(&self) -> RegistrationObservation {
        RegistrationObservation {
            registered: self.registered,
            redemption: self.redemption,
            pending_delete: self.pending_delete,
        }
    }

    /// Human-readable status label
    ///
    /// A record that was never probed reports "unknown".
    pub fn status_label(&self) -> &'static str {
        if self.last_checked.is_none() {
            "unknown"
        } else {
            self.observation().status_label()
        }
    }

    /// Excluded from probing and rule evaluation
    pub fn is_frozen(&self) -> bool {
        self.final_noticed
    }

    /// An excursion is currently being counted
    pub fn has_active_excursion(&self) -> bool {
        self.check_count > 0
    }

    /// The notification owed for this domain, if any
    pub fn notification(&self) -> Option<DomainNotification> {
        self.needs_notification.then(|| {
            DomainNotification::new(
                self.domain.clone(),
                self.is_final_notice,
                self.status_label(),
            )
        })
    }

    /// Mark an owed notification as delivered
    ///
    /// Final notices also drop the excursion bookkeeping; the domain stays
    /// frozen through `final_noticed`.
    pub fn acknowledge_delivery(&mut self) {
        self.needs_notification = false;
        if self.is_final_notice {
            self.is_final_notice = false;
            self.first_flagged_at = None;
            self.check_count = 0;
        }
    }
}

//! Notification rules
//!
//! Decides, from a domain's previous status and a fresh observation, what the
//! new status is and whether a notification is owed.
//!
//! ## State Machine
//!
//! ```text
//!              excursion                excursion            excursion (count == threshold)
//! ┌────────┐  ─────────────▶ ┌──────────┐ ──────────▶ ... ──────────────────▶ ┌────────┐
//! │ clean  │   first notice  │ flagged  │   (silent)            final notice  │ frozen │
//! └────────┘ ◀───────────── └──────────┘                                      └────────┘
//!               baseline (silent reset)
//! ```
//!
//! An *excursion* is any observation other than "registered, no redemption,
//! no pending delete". Frozen domains are never re-evaluated; they thaw only
//! by leaving the domain list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::DomainStatus;
use crate::traits::RegistrationObservation;
use crate::{Error, Result};

/// Which notification an evaluation raised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    /// First observation of a new excursion
    First,
    /// The excursion persisted for `threshold` consecutive observations
    Final,
}

/// Result of evaluating one observation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// The updated status
    pub status: DomainStatus,
    /// The notification raised by this observation, if any
    pub notice: Option<NoticeKind>,
}

/// Notice threshold policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoticePolicy {
    threshold: u32,
}

impl NoticePolicy {
    /// Consecutive observations before the final notice, unless configured
    pub const DEFAULT_THRESHOLD: u32 = 3;

    /// Create a policy with a custom threshold (must be >= 1)
    pub fn new(threshold: u32) -> Result<Self> {
        if threshold == 0 {
            return Err(Error::config("Notice threshold must be >= 1"));
        }
        Ok(Self { threshold })
    }

    /// The configured threshold
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Evaluate an observation against a previous status
    ///
    /// Pure: `previous` is not modified and no clock is read.
    pub fn evaluate(
        &self,
        previous: &DomainStatus,
        observation: RegistrationObservation,
        now: DateTime<Utc>,
    ) -> Evaluation {
        let mut status = previous.clone();
        let notice = self.apply(&mut status, observation, now);
        Evaluation { status, notice }
    }

    /// Evaluate an observation, updating `status` in place
    ///
    /// This is the form used inside [`StatusStore::upsert`](crate::StatusStore::upsert).
    pub fn apply(
        &self,
        status: &mut DomainStatus,
        observation: RegistrationObservation,
        now: DateTime<Utc>,
    ) -> Option<NoticeKind> {
        if status.final_noticed {
            return None;
        }

        status.registered = observation.registered;
        status.redemption = observation.redemption;
        status.pending_delete = observation.pending_delete;
        status.last_checked = Some(now);

        if !observation.is_excursion() {
            status.first_flagged_at = None;
            status.check_count = 0;
            status.final_noticed = false;
            status.needs_notification = false;
            status.is_final_notice = false;
            return None;
        }

        let starting = !status.has_active_excursion();
        if starting {
            status.first_flagged_at = Some(now);
        }
        status.check_count = status.check_count.saturating_add(1);

        if status.check_count >= self.threshold {
            status.needs_notification = true;
            status.is_final_notice = true;
            status.final_noticed = true;
            Some(NoticeKind::Final)
        } else if starting {
            status.needs_notification = true;
            status.is_final_notice = false;
            Some(NoticeKind::First)
        } else {
            // Still accumulating. An earlier notice that failed delivery
            // stays owed.
            None
        }
    }
}

impl Default for NoticePolicy {
    fn default() -> Self {
        Self {
            threshold: Self::DEFAULT_THRESHOLD,
        }
    }
}

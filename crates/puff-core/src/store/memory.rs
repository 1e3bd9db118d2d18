// # Status Store
//
// In-memory, concurrency-safe map from domain name to `DomainStatus`.
//
// ## Purpose
//
// The store is the only place domain state lives. Every mutation goes through
// `upsert`/`update`, which run the caller's closure under the write lock, so
// concurrent probe tasks can never lose each other's updates.
//
// ## Cycle Ownership
//
// Every handle also shares one cycle lock and one schedule claim. Engines
// built over clones of the same store therefore never run cycles at the same
// time, and at most one schedule can drive the store.
//
// ## Crash Behavior
//
// - All state is lost on restart
// - The first cycle after a restart re-observes every domain from zero
// - A domain that was frozen before the restart may therefore notify again

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard, RwLock};

use super::status::DomainStatus;
use crate::traits::DomainNotification;

/// Concurrency-safe domain status store
///
/// Cloning the store yields another handle to the same map. No handle ever
/// exposes the map itself; readers receive copies.
///
/// # Example
///
/// ```rust,no_run
/// use puff_core::StatusStore;
///
/// #[tokio::main]
/// async fn main() {
///     let store = StatusStore::new();
///     store.sync_domain_list(&["example.com", "example.net"]).await;
///
///     let (status, _) = store
///         .upsert("example.com", |status| status.registered = true)
///         .await;
///     assert!(status.registered);
///     assert_eq!(store.snapshot().await.len(), 2);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatusStore {
    inner: Arc<RwLock<StoreInner>>,
    /// Held for the whole duration of a refresh cycle
    cycle: Arc<Mutex<()>>,
    /// Set while a scheduler drives this store
    scheduled: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: HashMap<String, DomainStatus>,
    /// Snapshot order: last synced list, then domains upserted outside it
    order: Vec<String>,
}

/// Outcome of a domain list sync
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Domains that received a fresh zero-value record
    pub added: Vec<String>,
    /// Domains whose record was dropped
    pub removed: Vec<String>,
}

impl StatusStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a copy of the record for a domain
    pub async fn get(&self, domain: &str) -> Option<DomainStatus> {
        let guard = self.inner.read().await;
        guard.records.get(domain).cloned()
    }

    /// Atomically create-if-absent and mutate a record
    ///
    /// The closure runs under the write lock. Returns a copy of the updated
    /// record together with the closure's result.
    pub async fn upsert<F, R>(&self, domain: &str, mutate: F) -> (DomainStatus, R)
    where
        F: FnOnce(&mut DomainStatus) -> R,
    {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        if !inner.records.contains_key(domain) {
            inner.order.push(domain.to_string());
        }
        let record = inner
            .records
            .entry(domain.to_string())
            .or_insert_with(|| DomainStatus::new(domain));

        let result = mutate(record);
        (record.clone(), result)
    }

    /// Atomically mutate an existing record
    ///
    /// Unlike [`upsert`](Self::upsert), a missing domain is left missing and
    /// `None` is returned.
    pub async fn update<F, R>(&self, domain: &str, mutate: F) -> Option<R>
    where
        F: FnOnce(&mut DomainStatus) -> R,
    {
        let mut guard = self.inner.write().await;
        guard.records.get_mut(domain).map(mutate)
    }

    /// Reconcile the store with the configured domain list
    ///
    /// Records of domains missing from `domains` are dropped, new domains get
    /// a zero-value record, and records of domains present in both are left
    /// exactly as they were.
    pub async fn sync_domain_list<S: AsRef<str>>(&self, domains: &[S]) -> SyncSummary {
        let wanted: HashSet<&str> = domains.iter().map(AsRef::as_ref).collect();

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let mut summary = SyncSummary::default();

        inner.records.retain(|domain, _| {
            let keep = wanted.contains(domain.as_str());
            if !keep {
                summary.removed.push(domain.clone());
            }
            keep
        });
        summary.removed.sort();

        let mut order = Vec::with_capacity(domains.len());
        let mut seen = HashSet::with_capacity(domains.len());
        for domain in domains.iter().map(AsRef::as_ref) {
            if !seen.insert(domain) {
                continue;
            }
            if !inner.records.contains_key(domain) {
                inner
                    .records
                    .insert(domain.to_string(), DomainStatus::new(domain));
                summary.added.push(domain.to_string());
            }
            order.push(domain.to_string());
        }
        inner.order = order;

        summary
    }

    /// Ordered read-only copy of every record
    pub async fn snapshot(&self) -> Vec<DomainStatus> {
        let guard = self.inner.read().await;
        guard
            .order
            .iter()
            .filter_map(|domain| guard.records.get(domain).cloned())
            .collect()
    }

    /// The notification batch implied by the current `needs_notification` flags
    pub async fn pending_notifications(&self) -> Vec<DomainNotification> {
        let guard = self.inner.read().await;
        guard
            .order
            .iter()
            .filter_map(|domain| guard.records.get(domain))
            .filter_map(DomainStatus::notification)
            .collect()
    }

    /// Drop the record for a domain
    pub async fn remove(&self, domain: &str) -> Option<DomainStatus> {
        let mut guard = self.inner.write().await;
        guard.order.retain(|d| d != domain);
        guard.records.remove(domain)
    }

    /// Wait until no other cycle runs against this store
    pub(crate) async fn lock_cycle(&self) -> MutexGuard<'_, ()> {
        self.cycle.lock().await
    }

    /// Claim the store for a schedule; `false` if one already holds it
    pub(crate) fn claim_schedule(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give the schedule claim back
    pub(crate) fn release_schedule(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

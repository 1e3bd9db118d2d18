//! Refresh orchestrator
//!
//! The MonitorEngine is responsible for:
//! - Loading the domain list and WHOIS server map
//! - Syncing the status store against the list
//! - Probing every non-frozen domain concurrently
//! - Applying the notice rules to each observation
//! - Handing the resulting notification batch to the dispatcher
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐
//! │ DomainListProvider │──┐
//! │ WhoisServerProvider│  │ load
//! └────────────────────┘  ▼
//!                  ┌──────────────┐
//!                  │MonitorEngine │
//!                  └──────────────┘
//!                         │ fan out (JoinSet + Semaphore)
//!         ┌───────────────┼───────────────┐
//!         ▼               ▼               ▼
//!  ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!  │ ProbeAdapter│ │ ProbeAdapter│ │ ProbeAdapter│
//!  └─────────────┘ └─────────────┘ └─────────────┘
//!         │ NoticePolicy::apply via StatusStore::upsert
//!         ▼
//!  ┌─────────────┐  batch   ┌────────────────────────┐
//!  │ StatusStore │────────▶ │ NotificationDispatcher │
//!  └─────────────┘          └────────────────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Normalize the domain list and sync the store against it
//! 2. Skip frozen domains and domains without a WHOIS server
//! 3. Probe the rest, at most `max_concurrent_probes` at a time
//! 4. Wait for every probe task (barrier)
//! 5. Deliver every owed notification in one batch
//! 6. On success, acknowledge the delivered entries; on failure keep them owed

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::rules::{NoticeKind, NoticePolicy};
use crate::store::StatusStore;
use crate::tld::{WhoisServerMap, normalize_domain_list};
use crate::traits::{
    DomainListProvider, NotificationDispatcher, ProbeAdapter, WhoisServerProvider,
};

/// Events emitted by the MonitorEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorEvent {
    /// A refresh cycle started
    CycleStarted { domains_count: usize },

    /// A domain was not probed this cycle (e.g. no WHOIS server)
    ProbeSkipped { domain: String, reason: String },

    /// A probe failed; the domain's status was left untouched
    ProbeFailed { domain: String, error: String },

    /// An observation raised a notice
    NoticeRaised {
        domain: String,
        kind: NoticeKind,
        status_label: String,
    },

    /// A notification batch was delivered
    NotificationsDelivered { count: usize },

    /// A notification batch could not be delivered
    DeliveryFailed { count: usize, error: String },

    /// The domain list or WHOIS map could not be loaded
    CycleAborted { error: String },

    /// A refresh cycle completed
    CycleCompleted { report: CycleReport },

    /// The scheduler started
    SchedulerStarted { interval: Duration },

    /// The scheduler stopped
    SchedulerStopped { reason: String },
}

/// Summary of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Domains in the synced list
    pub domains: usize,
    /// Probes that returned an observation
    pub probed: usize,
    /// Records updated through the rule engine
    pub updated: usize,
    /// Domains skipped for lack of a WHOIS server
    pub skipped: usize,
    /// Probes that errored, timed out or panicked
    pub failed: usize,
    /// Domains excluded because their final notice was already raised
    pub frozen: usize,
    /// First notices raised this cycle
    pub first_notices: usize,
    /// Final notices raised this cycle
    pub final_notices: usize,
    /// Notifications handed to the dispatcher and acknowledged
    pub delivered: usize,
    /// Whether the dispatcher rejected the batch
    pub delivery_failed: bool,
    /// Wall time of the cycle
    pub duration: Duration,
}

impl CycleReport {
    /// Whether any notice was raised this cycle
    pub fn raised_notices(&self) -> bool {
        self.first_notices + self.final_notices > 0
    }
}

/// Bounded event sender shared by the engine and its probe tasks
#[derive(Debug, Clone)]
struct EventSink {
    tx: mpsc::Sender<MonitorEvent>,
}

impl EventSink {
    fn emit(&self, event: MonitorEvent) {
        if self.tx.try_send(event).is_err() {
            // Full or closed. A slow consumer never stalls a cycle.
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

/// What one probe task produced
enum ProbeOutcome {
    Updated(Option<NoticeKind>),
    Failed,
}

/// Everything a probe task needs, cloned into each task
#[derive(Clone)]
struct ProbeContext {
    probe: Arc<dyn ProbeAdapter>,
    store: StatusStore,
    policy: NoticePolicy,
    timeout: Duration,
    events: EventSink,
}

impl ProbeContext {
    async fn run(self, domain: String, server: String) -> ProbeOutcome {
        let result = tokio::time::timeout(
            self.timeout,
            self.probe.probe(&domain, &server, self.timeout),
        )
        .await
        .unwrap_or_else(|_| {
            Err(Error::timeout(format!(
                "{} did not answer for {} within {:?}",
                server, domain, self.timeout
            )))
        });

        let observation = match result {
            Ok(observation) => observation,
            Err(e) => {
                if e.is_transient() {
                    warn!("Probe {} failed for {}: {}", self.probe.probe_name(), domain, e);
                } else {
                    error!("Probe {} failed for {}: {}", self.probe.probe_name(), domain, e);
                }
                self.events.emit(MonitorEvent::ProbeFailed {
                    domain,
                    error: e.to_string(),
                });
                return ProbeOutcome::Failed;
            }
        };

        let now = Utc::now();
        let policy = self.policy;
        let (status, notice) = self
            .store
            .upsert(&domain, |status| policy.apply(status, observation, now))
            .await;

        debug!(
            "{} is {} (check_count={})",
            domain,
            status.status_label(),
            status.check_count
        );

        if let Some(kind) = notice {
            info!("{:?} notice raised for {}: {}", kind, domain, status.status_label());
            self.events.emit(MonitorEvent::NoticeRaised {
                domain,
                kind,
                status_label: status.status_label().to_string(),
            });
        }

        ProbeOutcome::Updated(notice)
    }
}

/// Core refresh orchestrator
///
/// ## Lifecycle
///
/// 1. Create with [`MonitorEngine::new()`]
/// 2. Drive cycles with [`MonitorEngine::run_cycle()`], or hand the engine to
///    a [`Scheduler`](crate::Scheduler)
/// 3. Read state through [`MonitorEngine::store()`]
///
/// ## Threading
///
/// Cycles are serialized by a lock shared through the [`StatusStore`], so a
/// manual refresh can never overlap a scheduled one, even from another engine
/// built over a clone of the same store. Within a cycle, probes run as separate tasks on
/// the runtime.
///
/// ## Load Resistance
///
/// - **Concurrency cap**: At most `max_concurrent_probes` WHOIS queries in flight
/// - **Per-probe deadline**: Enforced here, independent of the adapter
/// - **Bounded event channel**: Full channel drops events (logged)
pub struct MonitorEngine {
    /// Probe adapter shared by all probe tasks
    probe: Arc<dyn ProbeAdapter>,

    /// Notification dispatcher
    dispatcher: Arc<dyn NotificationDispatcher>,

    /// Domain list source, reloaded every cycle
    domains: Arc<dyn DomainListProvider>,

    /// WHOIS server map source, reloaded every cycle
    servers: Arc<dyn WhoisServerProvider>,

    /// Domain status store
    store: StatusStore,

    /// Notice threshold rules
    policy: NoticePolicy,

    /// Per-probe deadline
    probe_timeout: Duration,

    /// Maximum probes in flight
    max_concurrent_probes: usize,

    /// Event sender for external monitoring
    events: EventSink,
}

impl MonitorEngine {
    /// Create a new monitor engine
    ///
    /// # Parameters
    ///
    /// - `probe`: WHOIS probe implementation
    /// - `dispatcher`: Notification dispatcher implementation
    /// - `domains`: Domain list provider
    /// - `servers`: WHOIS server map provider
    /// - `store`: Status store (pass a clone to keep a read handle)
    /// - `config`: Monitor configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields monitor events
    pub fn new(
        probe: Arc<dyn ProbeAdapter>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        domains: Arc<dyn DomainListProvider>,
        servers: Arc<dyn WhoisServerProvider>,
        store: StatusStore,
        config: MonitorConfig,
    ) -> Result<(Self, mpsc::Receiver<MonitorEvent>)> {
        config.validate()?;
        let policy = NoticePolicy::new(config.notice_threshold)?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            probe,
            dispatcher,
            domains,
            servers,
            store,
            policy,
            probe_timeout: config.probe_timeout(),
            max_concurrent_probes: config.max_concurrent_probes,
            events: EventSink { tx },
        };

        Ok((engine, rx))
    }

    /// The status store this engine writes to
    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    /// Load the domain list and WHOIS server map from the providers
    pub async fn load_sources(&self) -> Result<(Vec<String>, WhoisServerMap)> {
        let domains = self.domains.load_domains().await?;
        let servers = self.servers.load_whois_servers().await?;
        Ok((domains, servers))
    }

    /// Run one full cycle against freshly loaded lists
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: The cycle ran (individual probes may still have failed)
    /// - `Err(Error)`: The lists could not be loaded; nothing was probed
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _cycle = self.store.lock_cycle().await;

        let (domains, servers) = match self.load_sources().await {
            Ok(lists) => lists,
            Err(e) => {
                error!("Failed to load domain list or WHOIS servers: {}", e);
                self.emit_event(MonitorEvent::CycleAborted {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        Ok(self.refresh_locked(&domains, &servers).await)
    }

    /// Run one cycle against the given lists
    ///
    /// # Parameters
    ///
    /// - `domains`: Domains to watch; normalized before use
    /// - `servers`: WHOIS server per TLD label
    pub async fn refresh<S: AsRef<str>>(
        &self,
        domains: &[S],
        servers: &WhoisServerMap,
    ) -> CycleReport {
        let _cycle = self.store.lock_cycle().await;
        self.refresh_locked(domains, servers).await
    }

    async fn refresh_locked<S: AsRef<str>>(
        &self,
        domains: &[S],
        servers: &WhoisServerMap,
    ) -> CycleReport {
        let started = tokio::time::Instant::now();

        let domains = normalize_domain_list(domains);
        self.emit_event(MonitorEvent::CycleStarted {
            domains_count: domains.len(),
        });

        let summary = self.store.sync_domain_list(&domains).await;
        if !summary.added.is_empty() || !summary.removed.is_empty() {
            info!(
                "Domain list synced: {} added, {} removed",
                summary.added.len(),
                summary.removed.len()
            );
        }

        let mut report = CycleReport {
            domains: domains.len(),
            ..CycleReport::default()
        };

        self.probe_all(servers, &mut report).await;
        self.dispatch_pending(&mut report).await;

        report.duration = started.elapsed();
        info!(
            "Cycle complete: {} probed, {} failed, {} skipped, {} frozen, {} delivered in {:?}",
            report.probed,
            report.failed,
            report.skipped,
            report.frozen,
            report.delivered,
            report.duration
        );
        self.emit_event(MonitorEvent::CycleCompleted {
            report: report.clone(),
        });

        report
    }

    /// Fan out one probe task per eligible domain and wait for all of them
    async fn probe_all(&self, servers: &WhoisServerMap, report: &mut CycleReport) {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_probes));
        let mut tasks = JoinSet::new();

        let context = ProbeContext {
            probe: Arc::clone(&self.probe),
            store: self.store.clone(),
            policy: self.policy,
            timeout: self.probe_timeout,
            events: self.events.clone(),
        };

        for status in self.store.snapshot().await {
            if status.is_frozen() {
                debug!("{} already received its final notice, skipping", status.domain);
                report.frozen += 1;
                continue;
            }

            let Some((label, server)) = servers.resolve(&status.domain) else {
                warn!("No WHOIS server configured for {}, skipping", status.domain);
                report.skipped += 1;
                self.emit_event(MonitorEvent::ProbeSkipped {
                    reason: Error::no_whois_server(status.domain.as_str()).to_string(),
                    domain: status.domain,
                });
                continue;
            };
            debug!("Probing {} via {} ({})", status.domain, server, label);

            let server = server.to_string();
            let context = context.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return ProbeOutcome::Failed;
                };
                context.run(status.domain, server).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(ProbeOutcome::Updated(notice)) => {
                    report.probed += 1;
                    report.updated += 1;
                    match notice {
                        Some(NoticeKind::First) => report.first_notices += 1,
                        Some(NoticeKind::Final) => report.final_notices += 1,
                        None => {}
                    }
                }
                Ok(ProbeOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!("Probe task did not complete: {}", e);
                    report.failed += 1;
                }
            }
        }
    }

    /// Deliver every owed notification and acknowledge on success
    async fn dispatch_pending(&self, report: &mut CycleReport) {
        let batch = self.store.pending_notifications().await;
        if batch.is_empty() {
            return;
        }

        debug!(
            "Delivering {} notification(s) via {}",
            batch.len(),
            self.dispatcher.dispatcher_name()
        );

        match self.dispatcher.deliver(&batch).await {
            Ok(()) => {
                for notification in &batch {
                    self.store
                        .update(&notification.domain, |status| {
                            if status.needs_notification
                                && status.is_final_notice == notification.is_final_notice
                            {
                                status.acknowledge_delivery();
                            }
                        })
                        .await;
                }
                info!(
                    "Delivered {} notification(s) via {}",
                    batch.len(),
                    self.dispatcher.dispatcher_name()
                );
                report.delivered = batch.len();
                self.emit_event(MonitorEvent::NotificationsDelivered { count: batch.len() });
            }
            Err(e) => {
                error!(
                    "Failed to deliver {} notification(s) via {}: {}",
                    batch.len(),
                    self.dispatcher.dispatcher_name(),
                    e
                );
                report.delivery_failed = true;
                self.emit_event(MonitorEvent::DeliveryFailed {
                    count: batch.len(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Emit a monitor event
    pub(crate) fn emit_event(&self, event: MonitorEvent) {
        self.events.emit(event);
    }
}

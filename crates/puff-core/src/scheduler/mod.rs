//! Periodic refresh scheduling
//!
//! The [`Scheduler`] owns at most one background task that runs
//! [`MonitorEngine::run_cycle`] immediately and then once per interval.
//!
//! A schedule claims the engine's [`StatusStore`](crate::StatusStore) for as
//! long as it runs. Any other scheduler over the same store, whether through
//! the same engine or another one, is refused with
//! [`Error::AlreadyRunning`] until the first one stops.
//!
//! ## Shutdown
//!
//! `stop()` signals the task and waits for it. A cycle that is already running
//! finishes first; in-flight probes are never aborted.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{error, info};

use crate::engine::{MonitorEngine, MonitorEvent};
use crate::error::{Error, Result};

/// Handle on the running schedule
struct ActiveSchedule {
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Start/stop control over periodic refresh cycles
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use puff_core::{MonitorEngine, Scheduler};
///
/// async fn watch(engine: MonitorEngine) -> puff_core::Result<()> {
///     let scheduler = Scheduler::new(Arc::new(engine));
///     scheduler.start(Duration::from_secs(300)).await?;
///     // ...
///     scheduler.stop().await
/// }
/// ```
pub struct Scheduler {
    engine: Arc<MonitorEngine>,
    active: Mutex<Option<ActiveSchedule>>,
}

impl Scheduler {
    /// Create an idle scheduler for `engine`
    pub fn new(engine: Arc<MonitorEngine>) -> Self {
        Self {
            engine,
            active: Mutex::new(None),
        }
    }

    /// The engine driven by this scheduler
    pub fn engine(&self) -> &Arc<MonitorEngine> {
        &self.engine
    }

    /// Start periodic cycles
    ///
    /// The domain list and WHOIS map are loaded once up front; if either
    /// fails the error is returned and nothing is started. The first cycle
    /// runs immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`]: `interval` is zero
    /// - [`Error::AlreadyRunning`]: a schedule is already active on this
    ///   store
    /// - Any provider error from the initial load
    pub async fn start(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::config("Refresh interval must be > 0"));
        }

        let store = self.engine.store();
        let mut active = self.active.lock().await;
        if let Some(schedule) = active.as_ref() {
            if !schedule.handle.is_finished() {
                return Err(Error::AlreadyRunning);
            }
            // The previous task died without stop(); its claim is ours.
            active.take();
            store.release_schedule();
        }

        if !store.claim_schedule() {
            return Err(Error::AlreadyRunning);
        }

        let (domains, servers) = match self.engine.load_sources().await {
            Ok(lists) => lists,
            Err(e) => {
                store.release_schedule();
                return Err(e);
            }
        };
        info!(
            "Starting scheduler: {} domain(s), {} WHOIS server(s), every {:?}",
            domains.len(),
            servers.len(),
            interval
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_schedule(
            Arc::clone(&self.engine),
            interval,
            shutdown_rx,
        ));

        *active = Some(ActiveSchedule {
            shutdown_tx,
            handle,
        });
        self.engine
            .emit_event(MonitorEvent::SchedulerStarted { interval });

        Ok(())
    }

    /// Stop periodic cycles and wait for the background task
    ///
    /// # Errors
    ///
    /// - [`Error::NotRunning`]: no schedule is active
    pub async fn stop(&self) -> Result<()> {
        let schedule = self.active.lock().await.take().ok_or(Error::NotRunning)?;

        // The task may already be gone if it panicked.
        let _ = schedule.shutdown_tx.send(());
        let joined = schedule.handle.await;
        self.engine.store().release_schedule();

        self.engine.emit_event(MonitorEvent::SchedulerStopped {
            reason: "Stop requested".to_string(),
        });

        joined.map_err(|e| Error::Other(format!("Scheduler task failed: {}", e)))?;
        info!("Scheduler stopped");
        Ok(())
    }

    /// Whether a schedule is active
    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|schedule| !schedule.handle.is_finished())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        // Dropped without stop(): nothing can await the task any more.
        if let Some(schedule) = self.active.get_mut().take() {
            schedule.handle.abort();
            self.engine.store().release_schedule();
        }
    }
}

async fn run_schedule(
    engine: Arc<MonitorEngine>,
    interval: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks = IntervalStream::new(ticker);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                info!("Shutdown signal received");
                break;
            }

            Some(_) = ticks.next() => {
                if let Err(e) = engine.run_cycle().await {
                    // The next tick still runs.
                    error!("Refresh cycle aborted: {}", e);
                }
            }
        }
    }
}

//! Test doubles and common utilities for monitor contract tests
//!
//! The doubles script WHOIS answers per domain and record every delivered
//! batch, so the tests can drive cycles deterministically.

#![allow(dead_code)]

use puff_core::error::Result;
use puff_core::traits::{
    DomainListProvider, DomainNotification, NotificationDispatcher, ProbeAdapter,
    RegistrationObservation,
};
use puff_core::{
    Error, MemorySources, MonitorConfig, MonitorEngine, MonitorEvent, StatusStore,
    WhoisServerMap,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted probe answer
#[derive(Debug, Clone, Copy)]
pub enum Scripted {
    /// Return this observation
    Answer(RegistrationObservation),
    /// Return a transport error
    Fail,
    /// Never answer (the engine's deadline has to fire)
    Hang,
    /// Panic inside the probe task
    Panic,
}

/// A probe that replays scripted answers per domain
///
/// Domains without (remaining) script entries answer "registered".
pub struct ScriptedProbe {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Scripted>>>>,
    delay: Option<Duration>,
    probe_count: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    probed: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            scripts: Arc::new(Mutex::new(HashMap::new())),
            delay: None,
            probe_count: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            probed: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sleep this long inside every probe call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue answers for a domain
    pub fn script(&self, domain: &str, answers: impl IntoIterator<Item = Scripted>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(domain.to_string())
            .or_default()
            .extend(answers);
    }

    /// Queue the same observation `times` times
    pub fn script_repeated(&self, domain: &str, observation: RegistrationObservation, times: usize) {
        self.script(domain, std::iter::repeat_n(Scripted::Answer(observation), times));
    }

    /// Get the number of times probe() was called
    pub fn probe_count(&self) -> usize {
        self.probe_count.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent probe() calls seen
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Domains passed to probe(), in call order
    pub fn probed_domains(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }

    /// Create a new ScriptedProbe that shares scripts and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            scripts: Arc::clone(&other.scripts),
            delay: other.delay,
            probe_count: Arc::clone(&other.probe_count),
            in_flight: Arc::clone(&other.in_flight),
            max_in_flight: Arc::clone(&other.max_in_flight),
            probed: Arc::clone(&other.probed),
        }
    }
}

#[async_trait::async_trait]
impl ProbeAdapter for ScriptedProbe {
    async fn probe(
        &self,
        domain: &str,
        _server: &str,
        _timeout: Duration,
    ) -> Result<RegistrationObservation> {
        self.probe_count.fetch_add(1, Ordering::SeqCst);
        self.probed.lock().unwrap().push(domain.to_string());

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(domain)
            .and_then(VecDeque::pop_front);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match next.unwrap_or(Scripted::Answer(RegistrationObservation::registered())) {
            Scripted::Answer(observation) => Ok(observation),
            Scripted::Fail => Err(Error::probe(format!("connection reset while probing {}", domain))),
            Scripted::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Scripted::Panic => panic!("scripted probe panic for {}", domain),
        }
    }

    fn probe_name(&self) -> &'static str {
        "scripted"
    }
}

/// A dispatcher that records every batch it is handed
pub struct RecordingDispatcher {
    batches: Arc<Mutex<Vec<Vec<DomainNotification>>>>,
    deliver_count: Arc<AtomicUsize>,
    fail: Arc<AtomicBool>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            deliver_count: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every following deliver() call fail (or succeed again)
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Get the number of times deliver() was called
    pub fn deliver_count(&self) -> usize {
        self.deliver_count.load(Ordering::SeqCst)
    }

    /// Every batch handed to deliver(), including failed attempts
    pub fn batches(&self) -> Vec<Vec<DomainNotification>> {
        self.batches.lock().unwrap().clone()
    }

    /// Create a new RecordingDispatcher that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            batches: Arc::clone(&other.batches),
            deliver_count: Arc::clone(&other.deliver_count),
            fail: Arc::clone(&other.fail),
        }
    }
}

#[async_trait::async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn deliver(&self, notifications: &[DomainNotification]) -> Result<()> {
        self.deliver_count.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(notifications.to_vec());

        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::dispatch("550 mailbox unavailable"));
        }
        Ok(())
    }

    fn dispatcher_name(&self) -> &'static str {
        "recording"
    }
}

/// A domain list provider that always fails
pub struct BrokenListProvider;

#[async_trait::async_trait]
impl DomainListProvider for BrokenListProvider {
    async fn load_domains(&self) -> Result<Vec<String>> {
        Err(Error::source("list.yml: permission denied"))
    }
}

/// WHOIS servers for the usual test TLDs
pub fn test_servers() -> WhoisServerMap {
    [
        ("com", "whois.verisign-grs.com"),
        ("net", "whois.verisign-grs.com"),
        ("org", "whois.pir.org"),
    ]
    .into_iter()
    .collect()
}

/// Sources listing `domains` with [`test_servers`]
pub fn sources_for(domains: &[&str]) -> MemorySources {
    MemorySources::with_lists(domains.iter().copied(), test_servers())
}

/// Build an engine whose list and server providers are both `sources`
pub fn build_engine(
    probe: ScriptedProbe,
    dispatcher: RecordingDispatcher,
    sources: MemorySources,
    config: MonitorConfig,
) -> (MonitorEngine, mpsc::Receiver<MonitorEvent>) {
    build_engine_over(StatusStore::new(), probe, dispatcher, sources, config)
}

/// Same as [`build_engine`], writing into an existing store
pub fn build_engine_over(
    store: StatusStore,
    probe: ScriptedProbe,
    dispatcher: RecordingDispatcher,
    sources: MemorySources,
    config: MonitorConfig,
) -> (MonitorEngine, mpsc::Receiver<MonitorEvent>) {
    MonitorEngine::new(
        Arc::new(probe),
        Arc::new(dispatcher),
        Arc::new(sources.clone()),
        Arc::new(sources),
        store,
        config,
    )
    .expect("engine construction succeeds")
}

/// Drain every event currently queued
pub fn drain_events(rx: &mut mpsc::Receiver<MonitorEvent>) -> Vec<MonitorEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

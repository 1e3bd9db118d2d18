//! Contract Test: Failure Isolation
//!
//! Verifies that per-domain failures never leak into other domains and never
//! stop the monitor.
//!
//! Constraints verified:
//! - A domain without a WHOIS server is skipped without state change
//! - A failed probe leaves the status untouched
//! - A timed-out probe is treated like a failed one
//! - A panicking probe task only fails its own domain
//! - A list load failure aborts only that cycle

mod common;

use common::*;
use puff_core::traits::RegistrationObservation;
use puff_core::{Error, MemorySources, MonitorConfig, MonitorEngine, MonitorEvent, StatusStore};
use std::sync::Arc;

#[tokio::test]
async fn missing_whois_server_is_a_soft_skip() {
    let probe = ScriptedProbe::new();
    let dispatcher = RecordingDispatcher::new();

    let (engine, mut event_rx) = build_engine(
        ScriptedProbe::sharing_counters_with(&probe),
        RecordingDispatcher::sharing_counters_with(&dispatcher),
        sources_for(&["example.zz", "example.com"]),
        MonitorConfig::default(),
    );

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.probed, 1);
    assert_eq!(probe.probed_domains(), vec!["example.com".to_string()]);
    assert_eq!(dispatcher.deliver_count(), 0);

    let skipped = engine.store().get("example.zz").await.unwrap();
    assert!(skipped.last_checked.is_none());
    assert_eq!(skipped.status_label(), "unknown");

    let events = drain_events(&mut event_rx);
    assert!(events.iter().any(|event| matches!(
        event,
        MonitorEvent::ProbeSkipped { domain, .. } if domain == "example.zz"
    )));
}

#[tokio::test]
async fn failed_probe_leaves_status_untouched() {
    let probe = ScriptedProbe::new();
    probe.script("a.com", [Scripted::Answer(RegistrationObservation::available()), Scripted::Fail]);

    let (engine, mut event_rx) = build_engine(
        ScriptedProbe::sharing_counters_with(&probe),
        RecordingDispatcher::new(),
        sources_for(&["a.com", "b.com"]),
        MonitorConfig::default(),
    );

    engine.run_cycle().await.unwrap();
    let before = engine.store().get("a.com").await.unwrap();
    drain_events(&mut event_rx);

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.probed, 1);

    let after = engine.store().get("a.com").await.unwrap();
    assert_eq!(before, after);

    let events = drain_events(&mut event_rx);
    assert!(events.iter().any(|event| matches!(
        event,
        MonitorEvent::ProbeFailed { domain, .. } if domain == "a.com"
    )));
}

#[tokio::test(start_paused = true)]
async fn hung_probe_times_out() {
    let probe = ScriptedProbe::new();
    probe.script("slow.com", [Scripted::Hang]);

    let (engine, mut event_rx) = build_engine(
        ScriptedProbe::sharing_counters_with(&probe),
        RecordingDispatcher::new(),
        sources_for(&["slow.com", "fast.com"]),
        MonitorConfig::default().with_probe_timeout_secs(10),
    );

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.probed, 1);
    assert!(engine.store().get("slow.com").await.unwrap().last_checked.is_none());
    assert!(engine.store().get("fast.com").await.unwrap().last_checked.is_some());

    let events = drain_events(&mut event_rx);
    assert!(events.iter().any(|event| matches!(
        event,
        MonitorEvent::ProbeFailed { domain, error } if domain == "slow.com" && error.starts_with("Timed out")
    )));
}

#[tokio::test]
async fn panicking_probe_is_isolated() {
    let probe = ScriptedProbe::new();
    probe.script("boom.com", [Scripted::Panic]);
    probe.script("ok.com", [Scripted::Answer(RegistrationObservation::available())]);

    let (engine, _event_rx) = build_engine(
        ScriptedProbe::sharing_counters_with(&probe),
        RecordingDispatcher::new(),
        sources_for(&["boom.com", "ok.com"]),
        MonitorConfig::default(),
    );

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.first_notices, 1);

    // The next cycle runs normally.
    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.failed, 0);
    assert_eq!(report.probed, 2);
}

#[tokio::test]
async fn list_load_failure_aborts_only_that_cycle() {
    let servers = MemorySources::with_lists(Vec::<String>::new(), test_servers());
    let (engine, mut event_rx) = MonitorEngine::new(
        Arc::new(ScriptedProbe::new()),
        Arc::new(RecordingDispatcher::new()),
        Arc::new(BrokenListProvider),
        Arc::new(servers),
        StatusStore::new(),
        MonitorConfig::default(),
    )
    .expect("engine construction succeeds");

    let result = engine.run_cycle().await;
    assert!(matches!(result, Err(Error::Source(_))));

    let events = drain_events(&mut event_rx);
    assert!(matches!(events.as_slice(), [MonitorEvent::CycleAborted { .. }]));

    // Still usable afterwards.
    let report = engine.refresh(&["a.com"], &test_servers()).await;
    assert_eq!(report.probed, 1);
}

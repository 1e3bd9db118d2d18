//! Contract Test: Concurrency
//!
//! Verifies the fan-out bound and the store's atomicity under concurrent use.
//!
//! Constraints verified:
//! - No more than `max_concurrent_probes` probes are in flight
//! - Every eligible domain is still probed exactly once per cycle
//! - Concurrent upserts never lose updates
//! - Manual refreshes and scheduled cycles never overlap, even across
//!   engines sharing one store

mod common;

use common::*;
use puff_core::{MonitorConfig, StatusStore};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn probes_respect_the_concurrency_cap() {
    let probe = ScriptedProbe::new().with_delay(Duration::from_secs(1));
    let domains = ["a.com", "b.com", "c.com", "d.net", "e.net", "f.org"];

    let (engine, _event_rx) = build_engine(
        ScriptedProbe::sharing_counters_with(&probe),
        RecordingDispatcher::new(),
        sources_for(&domains),
        MonitorConfig::default().with_max_concurrent_probes(2),
    );

    let report = engine.run_cycle().await.unwrap();
    assert_eq!(report.probed, 6);
    assert_eq!(probe.probe_count(), 6);
    assert!(
        probe.max_in_flight() <= 2,
        "at most 2 probes in flight, saw {}",
        probe.max_in_flight()
    );

    let mut probed = probe.probed_domains();
    probed.sort();
    assert_eq!(probed, domains.to_vec());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upserts_on_distinct_keys_are_all_kept() {
    let store = StatusStore::new();
    let mut tasks = tokio::task::JoinSet::new();

    for i in 0..100 {
        let store = store.clone();
        tasks.spawn(async move {
            store
                .upsert(&format!("domain-{}.com", i), |status| status.registered = true)
                .await;
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.len(), 100);
    assert!(snapshot.iter().all(|status| status.registered));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_upserts_on_one_key_are_serialized() {
    let store = StatusStore::new();
    let mut tasks = tokio::task::JoinSet::new();

    for _ in 0..100 {
        let store = store.clone();
        tasks.spawn(async move {
            store
                .upsert("example.com", |status| status.check_count += 1)
                .await;
        });
    }
    while let Some(joined) = tasks.join_next().await {
        joined.unwrap();
    }

    assert_eq!(store.get("example.com").await.unwrap().check_count, 100);
}

#[tokio::test(start_paused = true)]
async fn overlapping_cycles_run_one_after_another() {
    let probe = ScriptedProbe::new().with_delay(Duration::from_secs(2));

    let (engine, _event_rx) = build_engine(
        ScriptedProbe::sharing_counters_with(&probe),
        RecordingDispatcher::new(),
        sources_for(&["a.com"]),
        MonitorConfig::default(),
    );
    let engine = Arc::new(engine);

    let first = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.run_cycle().await }
    });
    let second = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.run_cycle().await }
    });

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(probe.probe_count(), 2);
    assert_eq!(probe.max_in_flight(), 1, "cycles never overlapped");
}

#[tokio::test(start_paused = true)]
async fn engines_sharing_a_store_never_overlap() {
    let probe = ScriptedProbe::new().with_delay(Duration::from_secs(2));
    let store = StatusStore::new();
    let sources = sources_for(&["a.com"]);

    let (engine_a, _events_a) = build_engine_over(
        store.clone(),
        ScriptedProbe::sharing_counters_with(&probe),
        RecordingDispatcher::new(),
        sources.clone(),
        MonitorConfig::default(),
    );
    let (engine_b, _events_b) = build_engine_over(
        store,
        ScriptedProbe::sharing_counters_with(&probe),
        RecordingDispatcher::new(),
        sources,
        MonitorConfig::default(),
    );

    let first = tokio::spawn(async move { engine_a.run_cycle().await });
    let second = tokio::spawn(async move { engine_b.run_cycle().await });

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(probe.probe_count(), 2);
    assert_eq!(probe.max_in_flight(), 1, "cycles never overlapped");
}

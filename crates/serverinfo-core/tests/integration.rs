//! Integration tests for serverinfo-core.
//!
//! These tests drive the full pipeline against the real process:
//! providers → aggregator → JSON tree, plus the description document.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use serverinfo_core::providers::{
    MultiplexerSnapshot, ObserveDriver, ObserveHandle, ObserverProvider, ProcessProvider,
    SessionProvider, SessionSnapshot, SocketProvider, SocketSnapshot,
};
use serverinfo_core::{Aggregator, Facts, OsProcess, ProcessStats, Sampler, SystemClock};

fn observers() -> Vec<MultiplexerSnapshot> {
    vec![
        MultiplexerSnapshot {
            driver: Some(ObserveDriver::oplog("orders")),
            handles: vec![ObserveHandle::delegated(), ObserveHandle::delegated()],
        },
        MultiplexerSnapshot {
            driver: Some(ObserveDriver::polling("users")),
            handles: vec![ObserveHandle::delegated()],
        },
    ]
}

fn sessions() -> Vec<SessionSnapshot> {
    vec![SessionSnapshot {
        id: "s1".into(),
        user_id: Some("u1".into()),
        subscriptions: vec!["orders".into()],
        documents: vec![("orders".into(), 3)],
    }]
}

fn sockets() -> Vec<SocketSnapshot> {
    vec![SocketSnapshot {
        protocol: "websocket".into(),
        has_session: true,
    }]
}

fn full_aggregator(interval: Duration) -> (Aggregator, Arc<Sampler>) {
    let stats: Arc<dyn ProcessStats> = Arc::new(OsProcess::new());
    let sampler = Arc::new(Sampler::new(stats.clone(), Arc::new(SystemClock), interval));
    let facts = Facts::new();
    facts.set("serverinfo", "version", serverinfo_core::VERSION);

    let aggregator = Aggregator::new(facts)
        .with_provider(ProcessProvider::new(stats, sampler.clone()))
        .and_then(|a| a.with_provider(ObserverProvider::new(observers)))
        .and_then(|a| a.with_provider(SessionProvider::new(sessions)))
        .and_then(|a| a.with_provider(SocketProvider::new(sockets)))
        .expect("distinct section names");
    (aggregator, sampler)
}

#[test]
fn tree_has_every_section_and_facts_last() {
    let (aggregator, _) = full_aggregator(Duration::from_millis(100));
    let tree = aggregator.collect();
    let names: Vec<&str> = tree.section_names().collect();
    assert_eq!(names, ["process", "mongo", "sessions", "sockets", "facts"]);
}

#[test]
fn observer_section_end_to_end() {
    let (aggregator, _) = full_aggregator(Duration::from_millis(100));
    let tree = aggregator.collect().into_value();
    assert_eq!(
        tree["mongo"],
        json!({
            "nObserveHandles": 3,
            "oplogObserveHandles": { "orders": 2 },
            "oplogObserveHandlesCount": 2,
            "pollingObserveHandles": { "users": 1 },
            "pollingObserveHandlesCount": 1,
            "unclassifiableObserveHandles": 0,
        })
    );
    assert_eq!(tree["sessions"]["usersWithNSessions"], json!({ "1": 1 }));
    assert_eq!(tree["sockets"]["nSocketsWithLivedataSessions"], json!(1));
    assert_eq!(
        tree["facts"]["serverinfo"]["version"],
        json!(serverinfo_core::VERSION)
    );
}

#[test]
fn process_section_reads_the_real_process() {
    let (aggregator, _) = full_aggregator(Duration::from_millis(100));

    // Burn a little CPU so the rates have something to report.
    let mut acc = 0u64;
    for i in 0..2_000_000u64 {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    std::hint::black_box(acc);

    let tree = aggregator.collect().into_value();
    let process = &tree["process"];
    for key in ["cpuUser", "cpuSystem", "loopDelay"] {
        let v = process[key].as_f64().unwrap_or(-1.0);
        assert!(v.is_finite() && v >= 0.0, "{key} = {}", process[key]);
    }
    #[cfg(target_os = "linux")]
    assert!(process["ramRss"].as_u64().unwrap_or(0) > 0);
}

#[test]
fn description_covers_every_collected_metric() {
    let (aggregator, _) = full_aggregator(Duration::from_millis(100));
    let tree = aggregator.collect();
    let doc = serde_json::to_value(aggregator.describe()).unwrap();

    for section in aggregator.section_names() {
        let collected: Vec<&String> = tree.section(&section).unwrap().keys().collect();
        let described: Vec<&String> = doc[&section].as_object().unwrap().keys().collect();
        assert_eq!(collected, described, "section {section}");
    }
    assert_eq!(doc["mongo"]["oplogObserveHandles"]["type"], json!("array"));
    assert_eq!(doc["process"]["cpuUser"]["type"], json!("number"));
    assert!(doc.get("facts").is_none());
}

#[test]
fn repeated_cycles_are_independent() {
    let (aggregator, _) = full_aggregator(Duration::from_millis(100));
    let first = aggregator.collect().into_value();
    let second = aggregator.collect().into_value();
    assert_eq!(first["mongo"], second["mongo"]);
    assert_eq!(first["sessions"], second["sessions"]);
}

#[tokio::test]
async fn loop_delay_surfaces_in_the_tree() {
    let (aggregator, sampler) = full_aggregator(Duration::from_millis(30));
    sampler.start().unwrap();

    // Hold the only worker thread so the probe wakes late.
    std::thread::sleep(Duration::from_millis(200));
    while sampler.probe_count() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let tree = aggregator.collect().into_value();
    let delay = tree["process"]["loopDelay"].as_f64().unwrap();
    assert!(delay > 50.0, "expected a stall to show up, got {delay}ms");

    sampler.stop();
    sampler.stop();
    assert!(!sampler.is_running());
}

#[test]
fn tree_serializes_to_json_value() {
    let (aggregator, _) = full_aggregator(Duration::from_millis(100));
    let tree = aggregator.collect();
    let text = serde_json::to_string(&tree).unwrap();
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert!(parsed.is_object());
}

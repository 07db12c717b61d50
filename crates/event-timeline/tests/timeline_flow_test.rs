//! Integration tests for the timeline lifecycle.
//!
//! Covers the path a debugging panel takes:
//! 1. Record outbound requests and their responses
//! 2. Filter and page through history
//! 3. Rewind to an earlier point and step through it
//! 4. Export, import and observe changes through subscriptions

use std::sync::Arc;

use event_timeline::{
    CorrelationId, Cursor, Direction, EntryStatus, FilterSpec, ManualClock, Origin, Outcome,
    Payload, PortableDocument, TimeRange, Timeline, TimelineConfig, TimelineError, TimelineEvent,
};
use parking_lot::Mutex;
use serde_json::json;

// ============================================================================
// Helper Functions
// ============================================================================

fn create_timeline() -> Timeline {
    Timeline::new(TimelineConfig::default()).expect("default config is valid")
}

fn record(timeline: &Timeline, kind: &str, id: &str, direction: Direction) {
    timeline.append(
        kind,
        Payload::Json(json!({ "id": id })),
        id,
        direction,
        Origin::new("devtools-panel").with_tab("tab-1"),
    );
}

fn correlation_ids(entries: &[Arc<event_timeline::Entry>]) -> Vec<&str> {
    entries.iter().map(|e| e.correlation_id.as_str()).collect()
}

// ============================================================================
// Recording and Querying
// ============================================================================

#[test]
fn pending_query_after_partial_resolution() {
    let timeline = create_timeline();
    for id in ["a", "b", "c"] {
        record(&timeline, "fetch", id, Direction::Outbound);
    }
    timeline.resolve(&CorrelationId::new("b"), Outcome::Success(Some(Payload::Text("ok".into()))));

    let pending = timeline
        .query(&FilterSpec::new().with_status(EntryStatus::Pending), 10)
        .expect("query");
    assert_eq!(correlation_ids(pending.items()), vec!["a", "c"]);

    let succeeded = timeline
        .query(&FilterSpec::new().with_status(EntryStatus::Success), 10)
        .expect("query");
    assert_eq!(correlation_ids(succeeded.items()), vec!["b"]);
}

#[test]
fn time_travel_then_step_forward_stays_frozen() {
    let timeline = create_timeline();
    for id in ["a", "b", "c"] {
        record(&timeline, "fetch", id, Direction::Outbound);
    }

    timeline.time_travel_to(1).expect("index in range");
    let cursor = timeline.step_forward().expect("ready");

    assert_eq!(cursor.current_index, Some(2));
    assert!(cursor.is_time_traveling);
    assert_eq!(timeline.current_entry().map(|e| e.correlation_id.clone()), Some("c".into()));
}

#[test]
fn filters_combine_across_dimensions() {
    let clock = ManualClock::new(1_000);
    let timeline = Timeline::with_clock(TimelineConfig::default(), Arc::new(clock.clone()))
        .expect("config");

    record(&timeline, "fetch", "req-1", Direction::Outbound);
    clock.set(2_000);
    record(&timeline, "message", "evt-1", Direction::Inbound);
    clock.set(3_000);
    record(&timeline, "fetch", "req-2", Direction::Outbound);
    clock.set(4_000);
    record(&timeline, "storage", "st-1", Direction::Outbound);
    timeline.resolve(&"req-2".into(), Outcome::Error("500".to_string()));

    // Kinds union within the dimension.
    let kinds = FilterSpec::new().with_kind("fetch").with_kind("storage");
    let page = timeline.query(&kinds, 10).expect("query");
    assert_eq!(correlation_ids(page.items()), vec!["req-1", "req-2", "st-1"]);

    // Kind and status intersect.
    let failed_fetches = FilterSpec::new()
        .with_kind("fetch")
        .with_status(EntryStatus::Error);
    let page = timeline.query(&failed_fetches, 10).expect("query");
    assert_eq!(correlation_ids(page.items()), vec!["req-2"]);

    let inbound = FilterSpec::new().with_direction(Direction::Inbound);
    let page = timeline.query(&inbound, 10).expect("query");
    assert_eq!(correlation_ids(page.items()), vec!["evt-1"]);

    let window = FilterSpec::new().with_time_range(TimeRange::new(Some(2_000), Some(4_000)));
    let page = timeline.query(&window, 10).expect("query");
    assert_eq!(correlation_ids(page.items()), vec!["evt-1", "req-2"]);

    let page = timeline.query(&FilterSpec::new().with_kind("nope"), 10).expect("query");
    assert!(page.is_empty());
}

#[test]
fn paging_through_large_history() {
    let timeline = create_timeline();
    for i in 0..120 {
        record(&timeline, "fetch", &format!("req-{i}"), Direction::Outbound);
    }

    let pager = timeline.query(&FilterSpec::new(), 50).expect("query");
    assert_eq!(pager.total_count(), 120);
    assert_eq!(pager.page_count(), 3);
    assert_eq!(pager.load_page(0).len(), 50);
    assert_eq!(pager.load_page(2).len(), 20);
    assert!(pager.load_page(3).is_empty());
    assert!(pager.has_next(1));
    assert!(!pager.has_next(2));
    assert_eq!(
        pager.load_page(2).first().map(|e| e.correlation_id.as_str()),
        Some("req-100")
    );
}

#[test]
fn summary_and_stats_reflect_history() {
    let timeline = create_timeline();
    record(&timeline, "fetch", "a", Direction::Outbound);
    record(&timeline, "message", "b", Direction::Inbound);
    timeline.resolve(&"a".into(), Outcome::Success(None));
    let _ = timeline.query(&FilterSpec::new(), 10);

    let summary = timeline.summary();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.pending, 1);

    let stats = timeline.stats();
    assert_eq!(stats.entries, 2);
    assert!(stats.ready);
    assert_eq!(stats.cursor, Cursor::live(2));
    assert!(stats.metrics.iter().any(|(channel, s)| {
        *channel == event_timeline::MetricChannel::MessageProcessing && s.count == 3
    }));
}

// ============================================================================
// Time Travel
// ============================================================================

#[test]
fn appends_during_time_travel_leave_view_intact() {
    let timeline = create_timeline();
    for id in ["a", "b", "c"] {
        record(&timeline, "fetch", id, Direction::Outbound);
    }
    timeline.time_travel_to(0).expect("in range");

    for id in ["d", "e", "f"] {
        record(&timeline, "fetch", id, Direction::Outbound);
    }

    assert_eq!(timeline.len(), 6);
    assert_eq!(correlation_ids(&timeline.visible_entries()), vec!["a"]);

    let cursor = timeline.reset_to_present();
    assert_eq!(cursor.current_index, Some(5));
    assert!(!cursor.is_time_traveling);
}

#[test]
fn time_travel_rejects_out_of_range() {
    let timeline = create_timeline();
    assert!(matches!(
        timeline.time_travel_to(0),
        Err(TimelineError::OutOfRange { index: 0, len: 0 })
    ));

    record(&timeline, "fetch", "a", Direction::Outbound);
    assert!(matches!(
        timeline.time_travel_to(7),
        Err(TimelineError::OutOfRange { index: 7, len: 1 })
    ));
    assert_eq!(timeline.cursor(), Cursor::live(1));
}

#[test]
fn step_back_from_live_enters_time_travel() {
    let timeline = create_timeline();
    for id in ["a", "b", "c"] {
        record(&timeline, "fetch", id, Direction::Outbound);
    }

    let cursor = timeline.step_back().expect("ready");
    assert_eq!(cursor.current_index, Some(1));
    assert!(cursor.is_time_traveling);

    timeline.step_back().expect("ready");
    let cursor = timeline.step_back().expect("ready");
    assert_eq!(cursor.current_index, Some(0));
}

// ============================================================================
// Export / Import
// ============================================================================

#[test]
fn export_import_round_trip_preserves_entries() {
    let source = create_timeline();
    record(&source, "fetch", "a", Direction::Outbound);
    record(&source, "message", "b", Direction::Inbound);
    source.resolve(&"a".into(), Outcome::Success(Some(Payload::Json(json!({"rows": 3})))));
    source.resolve(&"b".into(), Outcome::Error("dropped".to_string()));

    let json = source.export_json().expect("export");
    let doc: serde_json::Value = serde_json::from_str(&json).expect("valid json");
    assert_eq!(doc["version"], "1.0");
    assert!(doc["exportedAt"].is_string());
    assert_eq!(doc["entries"].as_array().map(Vec::len), Some(2));

    let target = create_timeline();
    target.import_json(&json).expect("import");

    let exported = source.export().expect("export");
    let imported = target.export().expect("export");
    assert_eq!(exported.entries, imported.entries);
    assert_eq!(target.cursor(), Cursor::live(2));
}

#[test]
fn rejected_import_leaves_history_untouched() {
    let timeline = create_timeline();
    record(&timeline, "fetch", "a", Direction::Outbound);
    let before = timeline.export().expect("export").entries;

    let wrong_version = r#"{"version":"2.0","exportedAt":"2024-01-01T00:00:00Z","entries":[]}"#;
    assert!(matches!(
        timeline.import_json(wrong_version),
        Err(TimelineError::MalformedImport(_))
    ));

    let mut doc = timeline.export().expect("export");
    doc.entries[0].error = Some("pending entries carry no outcome".to_string());
    assert!(matches!(timeline.import(doc), Err(TimelineError::MalformedImport(_))));

    assert!(matches!(
        timeline.import_json("[1, 2, 3]"),
        Err(TimelineError::MalformedImport(_))
    ));

    assert_eq!(timeline.export().expect("export").entries, before);
}

#[test]
fn empty_kind_survives_export_and_import() {
    let source = create_timeline();
    record(&source, "", "blank", Direction::Outbound);
    record(&source, "fetch", "a", Direction::Outbound);
    source.resolve(&"blank".into(), Outcome::Success(None));

    let json = source.export_json().expect("export");
    let target = create_timeline();
    target.import_json(&json).expect("import of own export");

    assert_eq!(target.len(), 2);
    assert_eq!(target.entry(0).map(|e| e.kind.clone()), Some(String::new()));
    assert_eq!(
        target.export().expect("export").entries,
        source.export().expect("export").entries
    );
}

#[test]
fn import_of_empty_document_clears_history() {
    let timeline = create_timeline();
    record(&timeline, "fetch", "a", Direction::Outbound);

    timeline
        .import(PortableDocument::new(Vec::new(), chrono::Utc::now()))
        .expect("import");
    assert!(timeline.is_empty());
    assert_eq!(timeline.cursor(), Cursor::default());
}

// ============================================================================
// Subscriptions
// ============================================================================

#[test]
fn subscribers_observe_every_change_in_order() {
    let timeline = create_timeline();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let subscription = timeline.subscribe(move |event| sink.lock().push(event.clone()));

    record(&timeline, "fetch", "a", Direction::Outbound);
    timeline.resolve(&"a".into(), Outcome::Success(None));
    let json = timeline.export_json().expect("export");
    timeline.import_json(&json).expect("import");
    timeline.clear();

    let events = events.lock();
    assert_eq!(events.len(), 4);
    assert!(matches!(&events[0], TimelineEvent::Appended { index: 0, entry } if entry.is_pending()));
    assert!(matches!(
        &events[1],
        TimelineEvent::Resolved { index: 0, entry } if entry.status == EntryStatus::Success
    ));
    assert_eq!(events[2], TimelineEvent::Imported { count: 1 });
    assert_eq!(events[3], TimelineEvent::Cleared);
    drop(events);

    assert!(subscription.is_active());
    subscription.unsubscribe();
    assert_eq!(timeline.stats().subscribers, 0);
}

#[test]
fn failing_subscriber_does_not_block_others() {
    let timeline = create_timeline();
    let _bad = timeline.subscribe(|event| {
        if let TimelineEvent::Appended { entry, .. } = event {
            let kinds: Vec<&str> = Vec::new();
            let _ = kinds[entry.kind.len()];
        }
    });
    let count = Arc::new(Mutex::new(0_usize));
    let sink = Arc::clone(&count);
    let _good = timeline.subscribe(move |_| *sink.lock() += 1);

    record(&timeline, "fetch", "a", Direction::Outbound);
    record(&timeline, "fetch", "b", Direction::Outbound);

    assert_eq!(timeline.len(), 2);
    assert_eq!(*count.lock(), 2);
    assert_eq!(timeline.stats().subscriber_failures, 2);
}

#[test]
fn subscriber_may_append_reentrantly() {
    let timeline = Arc::new(create_timeline());
    let weak = Arc::downgrade(&timeline);
    let _echo = timeline.subscribe(move |event| {
        if let (TimelineEvent::Appended { entry, .. }, Some(t)) = (event, weak.upgrade()) {
            if entry.direction == Direction::Outbound {
                t.append(
                    "echo",
                    Payload::Empty,
                    entry.correlation_id.clone(),
                    Direction::Inbound,
                    Origin::new("echo"),
                );
            }
        }
    });

    record(&timeline, "fetch", "a", Direction::Outbound);
    let kinds: Vec<String> = timeline.snapshot().iter().map(|e| e.kind.clone()).collect();
    assert_eq!(kinds, vec!["fetch", "echo"]);
}

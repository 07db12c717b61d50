//! Property tests for log ordering and cursor behavior.

use event_timeline::{
    Cursor, Direction, EntryStatus, FilterSpec, Origin, Outcome, Payload, Timeline,
    TimelineConfig,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Append { kind: u8, id: u8 },
    Resolve { id: u8, ok: bool },
    TravelTo(usize),
    StepBack,
    StepForward,
    Present,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..3, 0u8..6).prop_map(|(kind, id)| Op::Append { kind, id }),
        2 => (0u8..6, any::<bool>()).prop_map(|(id, ok)| Op::Resolve { id, ok }),
        1 => (0usize..20).prop_map(Op::TravelTo),
        1 => Just(Op::StepBack),
        1 => Just(Op::StepForward),
        1 => Just(Op::Present),
    ]
}

fn apply(timeline: &Timeline, op: &Op) {
    match op {
        Op::Append { kind, id } => {
            let kind = if *kind == 0 { String::new() } else { format!("kind-{kind}") };
            timeline.append(
                kind,
                Payload::Empty,
                format!("c{id}"),
                Direction::Outbound,
                Origin::new("prop"),
            );
        }
        Op::Resolve { id, ok } => {
            let outcome = if *ok {
                Outcome::Success(None)
            } else {
                Outcome::Error("failed".to_string())
            };
            timeline.resolve(&format!("c{id}").into(), outcome);
        }
        Op::TravelTo(index) => {
            let _ = timeline.time_travel_to(*index);
        }
        Op::StepBack => {
            let _ = timeline.step_back();
        }
        Op::StepForward => {
            let _ = timeline.step_forward();
        }
        Op::Present => {
            timeline.reset_to_present();
        }
    }
}

proptest! {
    #[test]
    fn entries_keep_append_order(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let timeline = Timeline::new(TimelineConfig::default()).expect("config");
        for op in &ops {
            apply(&timeline, op);
        }

        let appended = ops.iter().filter(|op| matches!(op, Op::Append { .. })).count();
        prop_assert_eq!(timeline.len(), appended);

        let snapshot = timeline.snapshot();
        for pair in snapshot.windows(2) {
            prop_assert!(pair[0].id < pair[1].id);
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[test]
    fn cursor_stays_in_bounds(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let timeline = Timeline::new(TimelineConfig::default()).expect("config");
        for op in &ops {
            apply(&timeline, op);
            let cursor = timeline.cursor();
            let len = timeline.len();
            match cursor.current_index {
                Some(index) => prop_assert!(index < len),
                None => prop_assert_eq!(len, 0),
            }
            if !cursor.is_time_traveling {
                prop_assert_eq!(cursor, Cursor::live(len));
            }
        }
    }

    #[test]
    fn frozen_cursor_ignores_appends(
        before in 1usize..10,
        target in 0usize..10,
        after in 0usize..10,
    ) {
        let timeline = Timeline::new(TimelineConfig::default()).expect("config");
        for i in 0..before {
            apply(&timeline, &Op::Append { kind: 0, id: u8::try_from(i).unwrap_or(0) });
        }
        let target = target % before;
        prop_assert!(timeline.time_travel_to(target).is_ok());

        for i in 0..after {
            apply(&timeline, &Op::Append { kind: 1, id: u8::try_from(i).unwrap_or(0) });
        }

        let cursor = timeline.cursor();
        prop_assert_eq!(cursor.current_index, Some(target));
        prop_assert!(cursor.is_time_traveling);
        prop_assert_eq!(timeline.visible_entries().len(), target + 1);
    }

    #[test]
    fn export_then_import_restores_every_entry(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let source = Timeline::new(TimelineConfig::default()).expect("config");
        for op in &ops {
            apply(&source, op);
        }

        let exported = source.export().expect("export");
        let json = exported.to_json().expect("encode");
        let target = Timeline::new(TimelineConfig::default()).expect("config");
        prop_assert!(target.import_json(&json).is_ok());

        let reimported = target.export().expect("export");
        prop_assert_eq!(reimported.entries, exported.entries);
        prop_assert_eq!(target.cursor(), Cursor::live(source.len()));
    }

    #[test]
    fn status_queries_partition_the_log(ops in prop::collection::vec(op_strategy(), 0..60)) {
        let timeline = Timeline::new(TimelineConfig::default()).expect("config");
        for op in &ops {
            apply(&timeline, op);
        }

        let mut total = 0;
        for status in [EntryStatus::Pending, EntryStatus::Success, EntryStatus::Error] {
            let pager = timeline
                .query(&FilterSpec::new().with_status(status), 7)
                .expect("query");
            prop_assert!(pager.items().iter().all(|e| e.status == status));
            total += pager.total_count();
        }
        prop_assert_eq!(total, timeline.len());
    }
}

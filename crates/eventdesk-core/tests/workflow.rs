use std::fs;

use eventdesk_core::{
    ActionJournal, BookError, Event, EventBook, EventState, SnapshotSource, load_snapshot,
    parse_date, save_snapshot,
};
use tempfile::tempdir;

fn event(name: &str, date: &str, priority: i64, instructor: Option<&str>) -> Event {
    Event::new(
        name,
        parse_date(date).expect("valid date"),
        priority,
        instructor.map(str::to_string),
    )
}

fn seeded_book() -> EventBook {
    let mut book = EventBook::new();
    book.add_event(event("Venue booking", "2025-04-01", 1, None))
        .expect("add");
    book.add_event(event("Rust workshop", "2025-04-10", 2, Some("Ferris")))
        .expect("add");
    book.add_event(event("Retrospective", "2025-04-10", 3, Some("Ada")))
        .expect("add");
    book.add_dependency("Venue booking", "Rust workshop")
        .expect("dependency");
    book.add_dependency("Rust workshop", "Retrospective")
        .expect("dependency");
    book
}

#[test]
fn events_execute_in_dependency_respecting_priority_order() {
    let mut book = seeded_book();
    let mut executed = Vec::new();
    while let Ok(report) = book.execute_next() {
        executed.push(report.name);
    }
    assert_eq!(
        executed,
        vec!["Venue booking", "Rust workshop", "Retrospective"]
    );
    assert_eq!(book.by_state(EventState::Completed).len(), 3);
    assert!(book.next_event().is_none());
}

#[test]
fn urgent_event_blocks_until_its_prerequisite_runs() {
    let mut book = EventBook::new();
    book.add_event(event("Launch", "2025-05-01", 0, None))
        .expect("add");
    book.add_event(event("Rehearsal", "2025-04-20", 5, None))
        .expect("add");
    book.add_dependency("Rehearsal", "Launch").expect("dependency");

    match book.execute_next() {
        Err(BookError::PendingDependencies { event, pending }) => {
            assert_eq!(event, "Launch");
            assert_eq!(pending, vec!["Rehearsal"]);
        }
        other => panic!("expected pending dependencies, got {other:?}"),
    }
    assert_eq!(
        book.pending_prerequisites("Launch").expect("known"),
        vec!["Rehearsal"]
    );
}

#[test]
fn snapshot_survives_a_restart() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("events.json");

    let mut book = seeded_book();
    book.add_participant("Rust workshop", "crab").expect("participant");
    book.execute_next().expect("venue runs");
    book.rate_event("Venue booking", 5).expect("rate");
    book.rate_instructor("Ferris", 4).expect("rate instructor");
    save_snapshot(&path, &book.snapshot()).expect("save");

    let load = load_snapshot(&path).expect("load");
    assert_eq!(load.source, SnapshotSource::File);
    let (restored, warnings) = EventBook::from_snapshot(load.snapshot, 10);
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");

    assert_eq!(
        restored.next_event().map(|e| e.name.as_str()),
        Some("Rust workshop")
    );
    let venue = restored.find("Venue booking").expect("venue");
    assert_eq!(venue.state(), EventState::Completed);
    assert_eq!(venue.rating(), Some(5));
    assert_eq!(
        restored.participants("Rust workshop").expect("workshop"),
        ["crab"]
    );
    assert_eq!(
        restored.prerequisites("Retrospective").expect("retro"),
        vec!["Rust workshop"]
    );
    assert_eq!(restored.instructor_ratings("Ferris"), Some(&[4u8][..]));
}

#[test]
fn legacy_snapshot_is_upgraded_on_next_save() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("events.json");
    fs::write(
        &path,
        r#"[
  {"name": "Old meetup", "date": "2024-11-02", "priority": 2, "instructor": "",
   "participants": ["sam"], "state": "Completed", "rating": 4},
  {"name": "New meetup", "date": "2025-01-15", "priority": 1, "instructor": "Ada",
   "participants": [], "state": "Not Started", "rating": null}
]"#,
    )
    .expect("write legacy snapshot");

    let load = load_snapshot(&path).expect("load");
    assert_eq!(load.source, SnapshotSource::Legacy);
    let (book, warnings) = EventBook::from_snapshot(load.snapshot, 10);
    assert!(warnings.is_empty());
    assert_eq!(book.len(), 2);
    assert_eq!(book.find("Old meetup").expect("old").instructor, None);
    assert_eq!(
        book.next_event().map(|e| e.name.as_str()),
        Some("New meetup")
    );

    save_snapshot(&path, &book.snapshot()).expect("save");
    let reloaded = load_snapshot(&path).expect("reload");
    assert_eq!(reloaded.source, SnapshotSource::File);
}

#[test]
fn categorized_views_cover_every_event() {
    let mut book = seeded_book();
    book.add_participant("Retrospective", "a").expect("participant");
    book.add_participant("Retrospective", "b").expect("participant");
    book.add_participant("Rust workshop", "c").expect("participant");

    let names = |events: Vec<&Event>| -> Vec<String> {
        events.into_iter().map(|e| e.name.clone()).collect()
    };
    assert_eq!(
        names(book.by_date()),
        vec!["Venue booking", "Rust workshop", "Retrospective"]
    );
    assert_eq!(
        names(book.by_participant_count()),
        vec!["Venue booking", "Rust workshop", "Retrospective"]
    );
    assert_eq!(
        names(book.by_instructor()),
        vec!["Venue booking", "Retrospective", "Rust workshop"]
    );
    let overlaps = book.overlapping();
    assert_eq!(overlaps.len(), 1);
    assert_eq!(overlaps[0].0.name, "Rust workshop");
}

#[test]
fn journal_captures_actions_in_order() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("event_log.txt");
    let journal = ActionJournal::new(&path);
    journal.record("Added event: A").expect("record");
    journal.record("Removed event: A").expect("record");

    let contents = fs::read_to_string(&path).expect("read");
    let actions: Vec<_> = contents
        .lines()
        .filter_map(|line| line.split_once(": ").map(|(_, action)| action))
        .collect();
    assert_eq!(actions, vec!["Added event: A", "Removed event: A"]);
}

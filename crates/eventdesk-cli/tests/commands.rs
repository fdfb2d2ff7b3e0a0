use std::fs;
use std::path::Path;

use eventdesk_cli::app::App;
use eventdesk_cli::cli_args::{
    Action, AddArgs, DependArgs, NameArgs, NotifyArgs, ParticipantArgs, RateArgs,
    RateInstructorArgs, SetStateArgs,
};
use eventdesk_core::{EventState, Settings, parse_date};
use tempfile::{TempDir, tempdir};

fn settings(dir: &Path) -> Settings {
    Settings {
        snapshot_path: dir.join("events.json"),
        journal_path: Some(dir.join("event_log.txt")),
        buckets: 10,
    }
}

fn open(temp: &TempDir) -> App {
    let (app, warnings) = App::open(settings(temp.path())).expect("open app");
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    app
}

fn run(app: &mut App, action: Action) -> String {
    let mut out = Vec::new();
    app.dispatch(action, &mut out).expect("action succeeds");
    String::from_utf8(out).expect("utf8 output")
}

fn add(name: &str, date: &str, priority: i64, instructor: Option<&str>) -> Action {
    Action::Add(AddArgs {
        name: name.to_string(),
        date: parse_date(date).expect("date"),
        priority,
        instructor: instructor.map(str::to_string),
    })
}

fn depend(dependent: &str, prerequisite: &str) -> Action {
    Action::Depend(DependArgs {
        dependent: dependent.to_string(),
        prerequisite: prerequisite.to_string(),
    })
}

fn join(event: &str, participant: &str) -> Action {
    Action::Join(ParticipantArgs {
        event: event.to_string(),
        participant: participant.to_string(),
    })
}

fn journal_actions(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("event_log.txt"))
        .unwrap_or_default()
        .lines()
        .filter_map(|line| line.split_once(": ").map(|(_, action)| action.to_string()))
        .collect()
}

#[test]
fn fresh_app_starts_empty_and_clean() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    assert!(app.book().is_empty());
    assert!(!app.is_dirty());
    assert_eq!(run(&mut app, Action::Next), "No events available.\n");
    assert_eq!(run(&mut app, Action::Execute), "No events available.\n");
}

#[test]
fn add_then_execute_reports_participants() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);

    let added = run(&mut app, add("Kickoff", "2025-03-01", 1, None));
    assert_eq!(added, "Event 'Kickoff' added successfully.\n");
    assert!(app.is_dirty());
    run(&mut app, join("Kickoff", "sam"));
    run(&mut app, join("Kickoff", "kim"));

    let output = run(&mut app, Action::Execute);
    assert!(output.contains("Notification: Event 'Kickoff' is now ongoing."));
    assert!(output.contains("Number of participants: 2"));
    assert!(output.contains("Event 'Kickoff' completed successfully."));
}

#[test]
fn blocked_execution_is_an_error() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Launch", "2025-05-01", 0, None));
    run(&mut app, add("Rehearsal", "2025-04-20", 5, None));
    run(&mut app, depend("Launch", "Rehearsal"));

    let mut out = Vec::new();
    let err = app
        .dispatch(Action::Execute, &mut out)
        .expect_err("launch is blocked");
    assert_eq!(
        err.to_string(),
        "cannot execute 'Launch'. Pending dependencies: Rehearsal"
    );
    assert_eq!(
        app.book().find("Launch").expect("launch").state(),
        EventState::NotStarted
    );
}

#[test]
fn cycle_warning_follows_the_offending_dependency() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("A", "2025-01-01", 1, None));
    run(&mut app, add("B", "2025-01-02", 2, None));
    assert_eq!(
        run(&mut app, Action::Cycles),
        "No cycles detected in the dependencies.\n"
    );

    run(&mut app, depend("A", "B"));
    let output = run(&mut app, depend("B", "A"));
    assert!(output.contains("Warning: dependencies now contain a cycle"));
    assert!(run(&mut app, Action::Cycles).starts_with("Cycle detected in the dependencies:"));
}

#[test]
fn unknown_event_error_suggests_a_close_name() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Rust workshop", "2025-04-10", 2, Some("Ferris")));

    let mut out = Vec::new();
    let err = app
        .dispatch(
            Action::Show(NameArgs {
                name: "Rust workshp".to_string(),
            }),
            &mut out,
        )
        .expect_err("misspelled name");
    assert!(err.to_string().contains("Did you mean 'Rust workshop'?"));
}

#[test]
fn show_lists_participants_and_prerequisites() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Venue", "2025-04-01", 1, None));
    run(&mut app, add("Workshop", "2025-04-10", 2, Some("Ferris")));
    run(&mut app, depend("Workshop", "Venue"));
    run(&mut app, join("Workshop", "crab"));

    let output = run(
        &mut app,
        Action::Show(NameArgs {
            name: "Workshop".to_string(),
        }),
    );
    assert!(output.starts_with("Event details:\n  Workshop on 2025-04-10"));
    assert!(output.contains("  Participants: crab\n"));
    assert!(output.contains("  Depends on: Venue\n"));
}

#[test]
fn notify_reaches_every_participant() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Meetup", "2025-02-01", 1, None));
    let notify = |message: &str| {
        Action::Notify(NotifyArgs {
            event: "Meetup".to_string(),
            message: message.to_string(),
        })
    };
    assert_eq!(
        run(&mut app, notify("hello")),
        "No participants found for event 'Meetup'.\n"
    );

    run(&mut app, join("Meetup", "sam"));
    run(&mut app, join("Meetup", "kim"));
    let output = run(&mut app, notify("Room changed"));
    assert!(output.contains("Notification sent to sam: Room changed"));
    assert!(output.contains("Notification sent to kim: Room changed"));
}

#[test]
fn ratings_require_completion_and_rank_instructors() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Talk", "2025-02-01", 1, Some("Ada")));

    let mut out = Vec::new();
    assert!(
        app.dispatch(
            Action::Rate(RateArgs {
                event: "Talk".to_string(),
                rating: 5,
            }),
            &mut out,
        )
        .is_err()
    );

    run(
        &mut app,
        Action::SetState(SetStateArgs {
            event: "Talk".to_string(),
            state: EventState::Completed,
        }),
    );
    let rated = run(
        &mut app,
        Action::Rate(RateArgs {
            event: "Talk".to_string(),
            rating: 5,
        }),
    );
    assert_eq!(rated, "Event 'Talk' rated 5/5.\n");

    for (instructor, rating) in [("Ada", 5), ("Ada", 4), ("Grace", 3)] {
        run(
            &mut app,
            Action::RateInstructor(RateInstructorArgs {
                instructor: instructor.to_string(),
                rating,
            }),
        );
    }
    let ranking = run(&mut app, Action::Instructors);
    assert_eq!(
        ranking,
        "Instructors ranked by ratings:\n  Ada: 4.50/5 (2 ratings)\n  Grace: 3.00/5 (1 ratings)\n"
    );
}

#[test]
fn status_groups_events_by_state() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Done", "2025-01-01", 1, None));
    run(&mut app, add("Later", "2025-06-01", 2, None));
    run(&mut app, Action::Execute);

    let output = run(&mut app, Action::Status);
    assert_eq!(
        output,
        "Not Started:\n  - Later (2025-06-01)\nOngoing:\n  (none)\nCompleted:\n  - Done (2025-01-01)\n"
    );
}

#[test]
fn saved_changes_survive_reopening_and_journal_records_them() {
    let temp = tempdir().expect("tempdir");
    {
        let mut app = open(&temp);
        run(&mut app, add("Venue", "2025-04-01", 1, None));
        run(&mut app, add("Workshop", "2025-04-10", 2, None));
        run(&mut app, depend("Workshop", "Venue"));
        run(
            &mut app,
            Action::Remove(NameArgs {
                name: "Venue".to_string(),
            }),
        );
        app.save().expect("save");
        assert!(!app.is_dirty());
    }

    let app = open(&temp);
    assert_eq!(app.book().len(), 1);
    assert!(
        app.book()
            .prerequisites("Workshop")
            .expect("workshop")
            .is_empty()
    );

    assert_eq!(
        journal_actions(temp.path()),
        [
            "Added event: Venue",
            "Added event: Workshop",
            "Added dependency: Workshop -> Venue",
            "Removed event: Venue",
        ]
    );
}

#[test]
fn disabled_journal_writes_nothing() {
    let temp = tempdir().expect("tempdir");
    let mut settings = settings(temp.path());
    settings.journal_path = None;
    let (mut app, _) = App::open(settings).expect("open app");
    run(&mut app, add("Quiet", "2025-01-01", 1, None));
    assert!(!temp.path().join("event_log.txt").exists());
}

#[test]
fn repeated_or_empty_actions_leave_the_book_clean() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, Action::Execute);
    assert!(!app.is_dirty(), "empty queue changes nothing");

    run(&mut app, add("Meetup", "2025-02-01", 1, None));
    run(&mut app, join("Meetup", "sam"));
    app.save().expect("save");

    let again = run(&mut app, join("Meetup", "sam"));
    assert_eq!(again, "Participant 'sam' is already registered for 'Meetup'.\n");
    let absent = run(
        &mut app,
        Action::Leave(ParticipantArgs {
            event: "Meetup".to_string(),
            participant: "kim".to_string(),
        }),
    );
    assert_eq!(absent, "Participant 'kim' is not registered for 'Meetup'.\n");
    let same = run(
        &mut app,
        Action::SetState(SetStateArgs {
            event: "Meetup".to_string(),
            state: EventState::NotStarted,
        }),
    );
    assert_eq!(same, "Event 'Meetup' is already 'Not Started'.\n");
    assert!(!app.is_dirty());
}

#[test]
fn read_only_commands_on_a_fresh_directory_write_nothing() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    for action in [Action::Next, Action::Status, Action::Categorize, Action::Instructors] {
        run(&mut app, action);
    }
    app.save_if_dirty().expect("save");
    assert!(!temp.path().join("events.json").exists());
    assert!(!temp.path().join("event_log.txt").exists());
}

#[test]
fn reopening_does_not_touch_the_journal() {
    let temp = tempdir().expect("tempdir");
    {
        let mut app = open(&temp);
        run(&mut app, add("Kickoff", "2025-03-01", 1, None));
        app.save().expect("save");
    }
    let mut app = open(&temp);
    run(&mut app, Action::Status);
    assert_eq!(journal_actions(temp.path()), ["Added event: Kickoff"]);
}

#[test]
fn padded_name_is_stored_trimmed() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    let output = run(&mut app, add("  Kickoff ", "2025-03-01", 1, None));
    assert_eq!(output, "Event 'Kickoff' added successfully.\n");

    let mut out = Vec::new();
    let err = app
        .dispatch(add("Kickoff", "2025-03-02", 2, None), &mut out)
        .expect_err("same name once trimmed");
    assert_eq!(err.to_string(), "event 'Kickoff' already exists");
}

#[test]
fn remove_reports_and_journals_the_event() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Venue", "2025-04-01", 1, None));
    run(&mut app, add("Workshop", "2025-04-10", 2, None));
    run(&mut app, depend("Workshop", "Venue"));

    let output = run(
        &mut app,
        Action::Remove(NameArgs {
            name: "Venue".to_string(),
        }),
    );
    assert_eq!(output, "Event 'Venue' removed successfully.\n");
    assert_eq!(
        run(&mut app, Action::Next),
        "Next event in priority queue:\n  Workshop on 2025-04-10 (priority 2, Not Started, 0 participants)\n"
    );
    assert_eq!(
        journal_actions(temp.path()).last().map(String::as_str),
        Some("Removed event: Venue")
    );
}

#[test]
fn leave_reports_and_journals_the_participant() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Meetup", "2025-02-01", 1, None));
    run(&mut app, join("Meetup", "sam"));

    let output = run(
        &mut app,
        Action::Leave(ParticipantArgs {
            event: "Meetup".to_string(),
            participant: "sam".to_string(),
        }),
    );
    assert_eq!(output, "Participant 'sam' removed from 'Meetup'.\n");
    assert!(app.book().participants("Meetup").expect("meetup").is_empty());
    assert_eq!(
        journal_actions(temp.path()).last().map(String::as_str),
        Some("Removed participant 'sam' from event 'Meetup'")
    );
}

#[test]
fn categorize_prints_the_three_orderings() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Retro", "2025-04-10", 3, Some("Ada")));
    run(&mut app, add("Venue", "2025-04-01", 1, None));
    run(&mut app, add("Workshop", "2025-04-05", 2, Some("Ferris")));
    run(&mut app, join("Retro", "a"));
    run(&mut app, join("Retro", "b"));
    run(&mut app, join("Workshop", "c"));

    let output = run(&mut app, Action::Categorize);
    assert_eq!(
        output,
        "Events by date:\n\
         \x20 2025-04-01 - Venue\n\
         \x20 2025-04-05 - Workshop\n\
         \x20 2025-04-10 - Retro\n\
         Events by participant count:\n\
         \x20 0 - Venue\n\
         \x20 1 - Workshop\n\
         \x20 2 - Retro\n\
         Events by instructor:\n\
         \x20 (none) - Venue\n\
         \x20 Ada - Retro\n\
         \x20 Ferris - Workshop\n"
    );
}

#[test]
fn overlaps_lists_pairs_and_journals_the_detection() {
    let temp = tempdir().expect("tempdir");
    let mut app = open(&temp);
    run(&mut app, add("Solo", "2025-04-01", 1, None));
    assert_eq!(
        run(&mut app, Action::Overlaps),
        "No overlapping events found.\n"
    );

    run(&mut app, add("Talk", "2025-04-10", 2, None));
    run(&mut app, add("Lab", "2025-04-10", 3, None));
    let output = run(&mut app, Action::Overlaps);
    assert_eq!(output, "Overlap: 'Talk' and 'Lab' on 2025-04-10\n");
    assert_eq!(
        journal_actions(temp.path()).last().map(String::as_str),
        Some("Detected 1 overlapping event pairs")
    );
}

#[test]
fn bad_ratings_in_the_snapshot_surface_as_warnings() {
    let temp = tempdir().expect("tempdir");
    fs::write(
        temp.path().join("events.json"),
        r#"{"events":[
            {"name":"Good","date":"2025-01-05","priority":1},
            {"name":"Bad","date":"2025-01-06","priority":2,"state":"Completed","rating":-1}
        ],"instructor_ratings":{"Ada":[5,300]}}"#,
    )
    .expect("write snapshot");

    let (app, warnings) = App::open(settings(temp.path())).expect("open app");
    assert_eq!(app.book().len(), 2);
    assert_eq!(app.book().find("Bad").expect("kept").rating(), None);
    assert_eq!(app.book().instructor_ratings("Ada"), Some(&[5u8][..]));
    assert_eq!(warnings.len(), 2);
}

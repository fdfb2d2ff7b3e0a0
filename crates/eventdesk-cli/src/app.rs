use std::io::Write;

use anyhow::{Context, Result};
use eventdesk_core::{
    ActionJournal, BookError, DATE_FORMAT, Event, EventBook, EventState, Settings, SnapshotSource,
    load_snapshot, save_snapshot,
};
use tracing::{info, warn};

use crate::cli_args::{
    Action, AddArgs, DependArgs, NameArgs, NotifyArgs, ParticipantArgs, RateArgs,
    RateInstructorArgs, SetStateArgs,
};

/// An opened event book together with where it is persisted and journaled.
pub struct App {
    book: EventBook,
    settings: Settings,
    journal: ActionJournal,
    dirty: bool,
}

impl App {
    /// Loads the snapshot named by `settings`. Returned warnings describe records that were skipped.
    pub fn open(settings: Settings) -> Result<(Self, Vec<String>)> {
        let load = load_snapshot(&settings.snapshot_path)?;
        let mut warnings = load.warnings;
        let (book, book_warnings) = EventBook::from_snapshot(load.snapshot, settings.buckets);
        warnings.extend(book_warnings);
        let journal = match &settings.journal_path {
            Some(path) => ActionJournal::new(path),
            None => ActionJournal::disabled(),
        };

        info!(
            path = %settings.snapshot_path.display(),
            events = book.len(),
            source = ?load.source,
            "event book opened"
        );
        let app = Self {
            book,
            settings,
            journal,
            // A legacy file is rewritten in the current format on the next save.
            dirty: load.source == SnapshotSource::Legacy,
        };
        Ok((app, warnings))
    }

    pub fn book(&self) -> &EventBook {
        &self.book
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// True when the book changed since it was loaded or last saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn save(&mut self) -> Result<()> {
        save_snapshot(&self.settings.snapshot_path, &self.book.snapshot()).with_context(|| {
            format!(
                "failed to save events to {}",
                self.settings.snapshot_path.display()
            )
        })?;
        self.dirty = false;
        info!(
            path = %self.settings.snapshot_path.display(),
            events = self.book.len(),
            "snapshot saved"
        );
        Ok(())
    }

    pub fn save_if_dirty(&mut self) -> Result<()> {
        if self.dirty { self.save() } else { Ok(()) }
    }

    /// Appends to the action journal. A journal failure never undoes the action.
    pub fn record(&self, action: &str) {
        if let Err(err) = self.journal.record(action) {
            warn!(error = %err, "journal write failed");
        }
    }

    /// Applies one action and writes its human-readable outcome to `out`.
    pub fn dispatch(&mut self, action: Action, out: &mut impl Write) -> Result<()> {
        let changed = match action {
            Action::Add(args) => self.add(args, out)?,
            Action::Next => self.show_next(out)?,
            Action::Execute => self.execute(out)?,
            Action::Depend(args) => self.depend(args, out)?,
            Action::Cycles => self.cycles(out)?,
            Action::Join(args) => self.join(args, out)?,
            Action::Leave(args) => self.leave(args, out)?,
            Action::Show(args) => self.show(args, out)?,
            Action::Remove(args) => self.remove(args, out)?,
            Action::Notify(args) => self.notify(args, out)?,
            Action::Categorize => self.categorize(out)?,
            Action::Overlaps => self.overlaps(out)?,
            Action::Status => self.status(out)?,
            Action::SetState(args) => self.set_state(args, out)?,
            Action::Rate(args) => self.rate(args, out)?,
            Action::RateInstructor(args) => self.rate_instructor(args, out)?,
            Action::Instructors => self.instructors(out)?,
        };
        self.dirty |= changed;
        Ok(())
    }

    // Each handler returns whether the book changed.

    fn add(&mut self, args: AddArgs, out: &mut impl Write) -> Result<bool> {
        let event = Event::new(args.name, args.date, args.priority, args.instructor);
        let id = self.book.add_event(event)?;
        let name = self
            .book
            .get(id)
            .map(|event| event.name.clone())
            .unwrap_or_default();
        writeln!(out, "Event '{name}' added successfully.")?;
        self.record(&format!("Added event: {name}"));
        Ok(true)
    }

    fn show_next(&self, out: &mut impl Write) -> Result<bool> {
        match self.book.next_event() {
            Some(event) => writeln!(out, "Next event in priority queue:\n  {event}")?,
            None => writeln!(out, "No events available.")?,
        }
        Ok(false)
    }

    fn execute(&mut self, out: &mut impl Write) -> Result<bool> {
        let report = match self.book.execute_next() {
            Ok(report) => report,
            Err(BookError::EmptyQueue) => {
                writeln!(out, "No events available.")?;
                return Ok(false);
            }
            Err(err) => return Err(err.into()),
        };
        writeln!(out, "Notification: Event '{}' is now ongoing.", report.name)?;
        writeln!(out, "Executing event: {}", report.name)?;
        writeln!(out, "Number of participants: {}", report.participant_count)?;
        writeln!(out, "Event '{}' completed successfully.", report.name)?;
        self.record(&format!("Executed event: {}", report.name));
        Ok(true)
    }

    fn depend(&mut self, args: DependArgs, out: &mut impl Write) -> Result<bool> {
        self.book
            .add_dependency(&args.prerequisite, &args.dependent)?;
        writeln!(
            out,
            "Dependency added: '{}' now waits for '{}'.",
            args.dependent, args.prerequisite
        )?;
        self.record(&format!(
            "Added dependency: {} -> {}",
            args.dependent, args.prerequisite
        ));
        if let Some(cycle) = self.book.find_cycle() {
            writeln!(
                out,
                "Warning: dependencies now contain a cycle: {}",
                cycle.join(" -> ")
            )?;
        }
        Ok(true)
    }

    fn cycles(&self, out: &mut impl Write) -> Result<bool> {
        match self.book.find_cycle() {
            Some(cycle) => writeln!(
                out,
                "Cycle detected in the dependencies: {}",
                cycle.join(" -> ")
            )?,
            None => writeln!(out, "No cycles detected in the dependencies.")?,
        }
        Ok(false)
    }

    fn join(&mut self, args: ParticipantArgs, out: &mut impl Write) -> Result<bool> {
        let outcome = self.book.add_participant(&args.event, &args.participant)?;
        writeln!(out, "{outcome}")?;
        if outcome.changed() {
            self.record(&format!(
                "Added participant '{}' to event '{}'",
                args.participant, args.event
            ));
        }
        Ok(outcome.changed())
    }

    fn leave(&mut self, args: ParticipantArgs, out: &mut impl Write) -> Result<bool> {
        let outcome = self
            .book
            .remove_participant(&args.event, &args.participant)?;
        writeln!(out, "{outcome}")?;
        if outcome.changed() {
            self.record(&format!(
                "Removed participant '{}' from event '{}'",
                args.participant, args.event
            ));
        }
        Ok(outcome.changed())
    }

    fn show(&self, args: NameArgs, out: &mut impl Write) -> Result<bool> {
        let event = self.book.find(&args.name)?;
        let prerequisites = self.book.prerequisites(&args.name)?;
        writeln!(out, "Event details:\n  {event}")?;
        writeln!(out, "  Participants: {}", list_or_none(event.participants()))?;
        writeln!(out, "  Depends on: {}", list_or_none(&prerequisites))?;
        Ok(false)
    }

    fn remove(&mut self, args: NameArgs, out: &mut impl Write) -> Result<bool> {
        let event = self.book.remove_event(&args.name)?;
        writeln!(out, "Event '{}' removed successfully.", event.name)?;
        self.record(&format!("Removed event: {}", event.name));
        Ok(true)
    }

    fn notify(&self, args: NotifyArgs, out: &mut impl Write) -> Result<bool> {
        let participants = self.book.participants(&args.event)?;
        if participants.is_empty() {
            writeln!(out, "No participants found for event '{}'.", args.event)?;
            return Ok(false);
        }
        writeln!(out, "Notifying participants of '{}'...", args.event)?;
        for participant in participants {
            writeln!(out, "Notification sent to {participant}: {}", args.message)?;
        }
        self.record(&format!("Notified participants of event '{}'", args.event));
        Ok(false)
    }

    fn categorize(&self, out: &mut impl Write) -> Result<bool> {
        writeln!(out, "Events by date:")?;
        for event in self.book.by_date() {
            writeln!(out, "  {} - {}", event.date.format(DATE_FORMAT), event.name)?;
        }
        writeln!(out, "Events by participant count:")?;
        for event in self.book.by_participant_count() {
            writeln!(
                out,
                "  {} - {}",
                event.participants().len(),
                event.name
            )?;
        }
        writeln!(out, "Events by instructor:")?;
        for event in self.book.by_instructor() {
            writeln!(
                out,
                "  {} - {}",
                event.instructor.as_deref().unwrap_or("(none)"),
                event.name
            )?;
        }
        Ok(false)
    }

    fn overlaps(&self, out: &mut impl Write) -> Result<bool> {
        let pairs = self.book.overlapping();
        if pairs.is_empty() {
            writeln!(out, "No overlapping events found.")?;
            return Ok(false);
        }
        for (first, second) in &pairs {
            writeln!(
                out,
                "Overlap: '{}' and '{}' on {}",
                first.name,
                second.name,
                first.date.format(DATE_FORMAT)
            )?;
        }
        self.record(&format!("Detected {} overlapping event pairs", pairs.len()));
        Ok(false)
    }

    fn status(&self, out: &mut impl Write) -> Result<bool> {
        for state in EventState::ALL {
            writeln!(out, "{state}:")?;
            let events = self.book.by_state(state);
            if events.is_empty() {
                writeln!(out, "  (none)")?;
            }
            for event in events {
                writeln!(
                    out,
                    "  - {} ({})",
                    event.name,
                    event.date.format(DATE_FORMAT)
                )?;
            }
        }
        Ok(false)
    }

    fn set_state(&mut self, args: SetStateArgs, out: &mut impl Write) -> Result<bool> {
        let previous = self.book.set_state(&args.event, args.state)?;
        if previous == args.state {
            writeln!(out, "Event '{}' is already '{}'.", args.event, args.state)?;
            return Ok(false);
        }
        writeln!(
            out,
            "Event '{}' state updated to '{}'.",
            args.event, args.state
        )?;
        self.record(&format!(
            "Updated state of event '{}' to '{}'",
            args.event, args.state
        ));
        Ok(true)
    }

    fn rate(&mut self, args: RateArgs, out: &mut impl Write) -> Result<bool> {
        let rating = self.book.rate_event(&args.event, args.rating)?;
        writeln!(out, "Event '{}' rated {rating}/5.", args.event)?;
        self.record(&format!("Rated event '{}' with {rating}/5", args.event));
        Ok(true)
    }

    fn rate_instructor(&mut self, args: RateInstructorArgs, out: &mut impl Write) -> Result<bool> {
        let rating = self.book.rate_instructor(&args.instructor, args.rating)?;
        writeln!(out, "Rated instructor '{}' with {rating}/5.", args.instructor)?;
        self.record(&format!(
            "Rated instructor '{}' with {rating}/5",
            args.instructor
        ));
        Ok(true)
    }

    fn instructors(&self, out: &mut impl Write) -> Result<bool> {
        let rankings = self.book.instructor_rankings();
        if rankings.is_empty() {
            writeln!(out, "No instructor ratings yet.")?;
            return Ok(false);
        }
        writeln!(out, "Instructors ranked by ratings:")?;
        for ranking in rankings {
            writeln!(
                out,
                "  {}: {:.2}/5 ({} ratings)",
                ranking.instructor, ranking.average, ranking.ratings
            )?;
        }
        Ok(false)
    }
}

fn list_or_none<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        items
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

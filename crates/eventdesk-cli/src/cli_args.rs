use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use eventdesk_core::{EventState, RuntimeOverrides, parse_date};

/// Top-level CLI entrypoint.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "eventdesk",
    version,
    about = "Track events, their dependencies, participants and ratings",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub storage: StorageArgs,

    /// Mirror logs to stderr.
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,

    /// Without a subcommand the interactive menu starts.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Supported subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    #[command(flatten)]
    Action(Action),
    /// Inspect or create the configuration file.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Start the interactive menu.
    Shell,
}

/// Operations on the event book. Each one maps to a menu entry in the shell.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Action {
    /// Add a new event.
    Add(AddArgs),
    /// Show the event that would run next.
    Next,
    /// Run the next event if its dependencies are completed.
    #[command(alias = "run")]
    Execute,
    /// Declare that an event depends on another.
    Depend(DependArgs),
    /// Check the dependencies for cycles.
    Cycles,
    /// Register a participant for an event.
    Join(ParticipantArgs),
    /// Unregister a participant from an event.
    Leave(ParticipantArgs),
    /// Show one event by name.
    #[command(alias = "search")]
    Show(NameArgs),
    /// Remove an event.
    #[command(alias = "rm")]
    Remove(NameArgs),
    /// Send a message to every participant of an event.
    Notify(NotifyArgs),
    /// List events by date, participant count and instructor.
    Categorize,
    /// List events that share a date.
    Overlaps,
    /// List events grouped by state.
    Status,
    /// Move an event forward to a new state.
    SetState(SetStateArgs),
    /// Rate a completed event (1-5).
    Rate(RateArgs),
    /// Rate an instructor (1-5).
    RateInstructor(RateInstructorArgs),
    /// Rank instructors by average rating.
    Instructors,
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    /// Print the config path and the resolved settings.
    Show,
    /// Write a default config.toml.
    Init {
        /// Overwrite an existing file.
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

/// Storage flags shared by every subcommand.
#[derive(Debug, Clone, Args, Default)]
pub struct StorageArgs {
    /// Snapshot file holding the events.
    #[arg(long = "data", global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub data: Option<String>,

    /// Action journal file.
    #[arg(long = "journal", global = true, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub journal: Option<String>,

    /// Do not write the action journal.
    #[arg(long = "no-journal", global = true, action = ArgAction::SetTrue)]
    pub no_journal: bool,

    /// Bucket count for the name and rating tables.
    #[arg(long = "buckets", global = true, value_name = "N")]
    pub buckets: Option<usize>,
}

impl StorageArgs {
    /// Returns true when no overrides were provided.
    pub fn is_empty(&self) -> bool {
        self.data.is_none() && self.journal.is_none() && !self.no_journal && self.buckets.is_none()
    }

    /// Convert CLI flags into runtime overrides.
    pub fn to_runtime_overrides(&self) -> Result<RuntimeOverrides, String> {
        if self.no_journal && self.journal.is_some() {
            return Err("Cannot combine --journal with --no-journal.".into());
        }

        let mut overrides = RuntimeOverrides::default();
        if let Some(data) = self.data.as_deref().and_then(parse_optional_field) {
            overrides.snapshot_path = Some(data);
        }
        if let Some(journal) = self.journal.as_deref().and_then(parse_optional_field) {
            overrides.journal_path = Some(journal);
            overrides.journal_enabled = Some(true);
        }
        if self.no_journal {
            overrides.journal_enabled = Some(false);
        }
        overrides.buckets = self.buckets;
        Ok(overrides)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AddArgs {
    pub name: String,
    /// Event date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date_arg)]
    pub date: NaiveDate,
    /// Lower runs first.
    #[arg(long, allow_negative_numbers = true)]
    pub priority: i64,
    #[arg(long)]
    pub instructor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct DependArgs {
    /// The event that has to wait.
    pub dependent: String,
    /// The event that must complete first.
    #[arg(long = "on", value_name = "PREREQUISITE")]
    pub prerequisite: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct ParticipantArgs {
    pub event: String,
    pub participant: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct NameArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct NotifyArgs {
    pub event: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SetStateArgs {
    pub event: String,
    /// not-started, ongoing or completed.
    #[arg(value_parser = parse_state_arg)]
    pub state: EventState,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct RateArgs {
    pub event: String,
    #[arg(allow_negative_numbers = true)]
    pub rating: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct RateInstructorArgs {
    pub instructor: String,
    #[arg(allow_negative_numbers = true)]
    pub rating: i64,
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).map_err(|err| err.to_string())
}

fn parse_state_arg(value: &str) -> Result<EventState, String> {
    value.parse::<EventState>().map_err(|err| err.to_string())
}

fn parse_optional_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

//! Core library crate for eventdesk: the in-memory event structures plus the
//! persistence, configuration and logging the CLI builds on.

pub mod book;
pub mod config;
pub mod event;
pub mod graph;
pub mod index;
pub mod journal;
pub mod logging;
pub mod queue;
pub mod snapshot;
pub mod table;

pub use book::{BookError, EventBook, ExecutionReport, InstructorRanking};
pub use config::{
    ConfigError, ConfigLoadResult, ConfigSource, FileConfig, RuntimeOverrides, Settings,
    apply_runtime_overrides, config_directory, config_path, load_config, save_config,
};
pub use event::{
    DATE_FORMAT, Event, EventError, EventId, EventState, ParticipantOutcome, parse_date,
};
pub use journal::{ActionJournal, JournalError};
pub use snapshot::{Snapshot, SnapshotError, SnapshotSource, load_snapshot, save_snapshot};

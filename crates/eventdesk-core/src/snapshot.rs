use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::book::EventBook;
use crate::event::{Event, validate_rating};

pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse snapshot {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("snapshot {path} must hold an object or an array of events, found {found}")]
    Shape { path: PathBuf, found: &'static str },
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub prerequisite: String,
    pub dependent: String,
}

/// On-disk image of an [`EventBook`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "Snapshot::schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
    #[serde(default)]
    pub instructor_ratings: BTreeMap<String, Vec<u8>>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            events: Vec::new(),
            dependencies: Vec::new(),
            instructor_ratings: BTreeMap::new(),
        }
    }
}

impl Snapshot {
    const fn schema_version() -> u32 {
        SNAPSHOT_SCHEMA_VERSION
    }
}

// Records stay untyped until each one is checked, so a single bad entry
// costs that entry rather than the whole file.
#[derive(Deserialize)]
struct RawSnapshot {
    #[serde(default = "Snapshot::schema_version")]
    schema_version: u32,
    #[serde(default)]
    events: Vec<Value>,
    #[serde(default)]
    dependencies: Vec<Value>,
    #[serde(default)]
    instructor_ratings: BTreeMap<String, Value>,
}

impl RawSnapshot {
    // Early builds wrote a bare array of event records.
    fn legacy(events: Vec<Value>) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            events,
            dependencies: Vec::new(),
            instructor_ratings: BTreeMap::new(),
        }
    }

    fn into_snapshot(self, warnings: &mut Vec<String>) -> Snapshot {
        let events = self
            .events
            .into_iter()
            .enumerate()
            .filter_map(|(position, record)| decode_event(position, record, warnings))
            .collect();

        let dependencies = self
            .dependencies
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<DependencyRecord>(record) {
                Ok(dependency) => Some(dependency),
                Err(err) => {
                    warnings.push(format!("Skipping malformed dependency record: {err}."));
                    None
                }
            })
            .collect();

        let mut instructor_ratings = BTreeMap::new();
        for (instructor, record) in self.instructor_ratings {
            let Value::Array(entries) = record else {
                warnings.push(format!(
                    "Skipping ratings for instructor '{instructor}': expected a list."
                ));
                continue;
            };
            let valid: Vec<u8> = entries.iter().filter_map(rating_value).collect();
            if valid.len() != entries.len() {
                warnings.push(format!(
                    "Dropped {} invalid rating(s) for instructor '{}'.",
                    entries.len() - valid.len(),
                    instructor
                ));
            }
            if !valid.is_empty() {
                instructor_ratings.insert(instructor, valid);
            }
        }

        Snapshot {
            schema_version: self.schema_version,
            events,
            dependencies,
            instructor_ratings,
        }
    }
}

/// An invalid rating is cleared so the event itself still loads.
fn decode_event(position: usize, mut record: Value, warnings: &mut Vec<String>) -> Option<Event> {
    let label = match record.get("name").and_then(Value::as_str) {
        Some(name) => format!("'{name}'"),
        None => format!("#{}", position + 1),
    };
    if let Some(rating) = record.get_mut("rating") {
        if !rating.is_null() && rating_value(rating).is_none() {
            warnings.push(format!(
                "Event {label} has invalid rating {rating}; clearing it."
            ));
            *rating = Value::Null;
        }
    }
    match serde_json::from_value::<Event>(record) {
        Ok(event) => Some(event),
        Err(err) => {
            warnings.push(format!("Skipping event {label}: {err}."));
            None
        }
    }
}

fn rating_value(value: &Value) -> Option<u8> {
    value.as_i64().and_then(|rating| validate_rating(rating).ok())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Where a loaded snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// No file existed yet.
    Fresh,
    File,
    /// A bare event array; the next save rewrites it in the current format.
    Legacy,
}

#[derive(Debug, Clone)]
pub struct SnapshotLoad {
    pub snapshot: Snapshot,
    pub source: SnapshotSource,
    /// Records that were skipped or repaired while reading the file.
    pub warnings: Vec<String>,
}

impl SnapshotLoad {
    fn fresh() -> Self {
        Self {
            snapshot: Snapshot::default(),
            source: SnapshotSource::Fresh,
            warnings: Vec::new(),
        }
    }
}

pub fn load_snapshot(path: &Path) -> Result<SnapshotLoad, SnapshotError> {
    if !path.exists() {
        return Ok(SnapshotLoad::fresh());
    }

    let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        return Ok(SnapshotLoad::fresh());
    }

    let parse_err = |source| SnapshotError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let document: Value = serde_json::from_str(&raw).map_err(parse_err)?;
    let (raw_snapshot, source) = match document {
        Value::Array(events) => (RawSnapshot::legacy(events), SnapshotSource::Legacy),
        document @ Value::Object(_) => (
            serde_json::from_value::<RawSnapshot>(document).map_err(parse_err)?,
            SnapshotSource::File,
        ),
        other => {
            return Err(SnapshotError::Shape {
                path: path.to_path_buf(),
                found: json_kind(&other),
            });
        }
    };

    let mut warnings = Vec::new();
    let snapshot = raw_snapshot.into_snapshot(&mut warnings);
    for warning in &warnings {
        warn!(path = %path.display(), "{warning}");
    }
    info!(
        path = %path.display(),
        events = snapshot.events.len(),
        ?source,
        "snapshot loaded"
    );
    Ok(SnapshotLoad {
        snapshot,
        source,
        warnings,
    })
}

/// Writes the snapshot next to `path` and renames it into place.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let io_err = |source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let serialized = serde_json::to_string_pretty(snapshot)?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, serialized).map_err(io_err)?;
    fs::rename(&staging, path).map_err(io_err)?;
    info!(path = %path.display(), events = snapshot.events.len(), "snapshot saved");
    Ok(())
}

impl EventBook {
    pub fn snapshot(&self) -> Snapshot {
        let name_of = |id| self.get(id).map(|event: &Event| event.name.clone());
        let dependencies = self
            .dependency_edges()
            .into_iter()
            .filter_map(|(prerequisite, dependent)| {
                Some(DependencyRecord {
                    prerequisite: name_of(prerequisite)?,
                    dependent: name_of(dependent)?,
                })
            })
            .collect();

        Snapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            events: self.events().map(|(_, event)| event.clone()).collect(),
            dependencies,
            instructor_ratings: self.instructor_rating_entries(),
        }
    }

    /// Rebuilds a book from a snapshot.
    ///
    /// Bad records are skipped rather than failing the load; each skip is
    /// reported in the returned warnings.
    pub fn from_snapshot(snapshot: Snapshot, buckets: usize) -> (EventBook, Vec<String>) {
        let mut book = EventBook::with_buckets(buckets);
        let mut warnings = Vec::new();

        if snapshot.schema_version > SNAPSHOT_SCHEMA_VERSION {
            warnings.push(format!(
                "Snapshot schema v{} is newer than supported v{}; loading what is recognised.",
                snapshot.schema_version, SNAPSHOT_SCHEMA_VERSION
            ));
        }

        for mut event in snapshot.events {
            if let Some(rating) = event.rating() {
                if validate_rating(i64::from(rating)).is_err() {
                    warnings.push(format!(
                        "Event '{}' has invalid rating {}; clearing it.",
                        event.name, rating
                    ));
                    event.clear_rating();
                }
            }
            let name = event.name.clone();
            if let Err(err) = book.add_event(event) {
                warnings.push(format!("Skipping event '{name}': {err}."));
            }
        }

        for record in snapshot.dependencies {
            if let Err(err) = book.add_dependency(&record.prerequisite, &record.dependent) {
                warnings.push(format!(
                    "Skipping dependency '{}' -> '{}': {err}.",
                    record.prerequisite, record.dependent
                ));
            }
        }

        for (instructor, ratings) in snapshot.instructor_ratings {
            let valid: Vec<u8> = ratings
                .iter()
                .filter_map(|rating| validate_rating(i64::from(*rating)).ok())
                .collect();
            if valid.len() != ratings.len() {
                warnings.push(format!(
                    "Dropped {} out-of-range rating(s) for instructor '{}'.",
                    ratings.len() - valid.len(),
                    instructor
                ));
            }
            if !valid.is_empty() {
                book.restore_instructor_ratings(instructor, valid);
            }
        }

        for warning in &warnings {
            warn!("{warning}");
        }
        (book, warnings)
    }
}

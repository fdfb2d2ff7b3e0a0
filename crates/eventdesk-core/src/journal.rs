//! Append-only record of operator actions, one timestamped line each.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

#[derive(Debug, Error)]
#[error("failed to append to action journal {path}: {source}")]
pub struct JournalError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Clone)]
pub struct ActionJournal {
    path: Option<PathBuf>,
}

impl ActionJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A journal that only forwards actions to tracing.
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn record(&self, action: &str) -> Result<(), JournalError> {
        info!(action, "action recorded");
        let Some(path) = self.path.as_ref() else {
            return Ok(());
        };
        let line = format!("{}: {}\n", Local::now().format(TIMESTAMP_FORMAT), action);
        append(path, &line).map_err(|source| JournalError {
            path: path.clone(),
            source,
        })
    }
}

fn append(path: &Path, line: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}

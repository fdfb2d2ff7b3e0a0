use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Date format accepted at every input boundary.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// Stable identifier handed out by the event book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of an event. Transitions only move forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventState {
    #[default]
    #[serde(rename = "Not Started", alias = "NotStarted")]
    NotStarted,
    Ongoing,
    Completed,
}

impl EventState {
    pub const ALL: [EventState; 3] = [
        EventState::NotStarted,
        EventState::Ongoing,
        EventState::Completed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EventState::NotStarted => "Not Started",
            EventState::Ongoing => "Ongoing",
            EventState::Completed => "Completed",
        }
    }
}

impl fmt::Display for EventState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EventState {
    type Err = EventError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "notstarted" => Ok(EventState::NotStarted),
            "ongoing" => Ok(EventState::Ongoing),
            "completed" => Ok(EventState::Completed),
            _ => Err(EventError::InvalidState(value.to_string())),
        }
    }
}

/// Validation failures raised by an [`Event`] or at the input boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("invalid state '{0}'. Valid states: Not Started, Ongoing, Completed")]
    InvalidState(String),
    #[error("cannot move event '{event}' from {from} back to {to}")]
    BackwardTransition {
        event: String,
        from: EventState,
        to: EventState,
    },
    #[error("rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i64),
    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    MalformedDate(String),
}

/// Parses a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(value: &str) -> Result<NaiveDate, EventError> {
    let trimmed = value.trim();
    // chrono accepts unpadded fields; the fixed-width form is what keeps dates string-comparable
    if trimmed.len() != 10 {
        return Err(EventError::MalformedDate(value.to_string()));
    }
    NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
        .map_err(|_| EventError::MalformedDate(value.to_string()))
}

/// Checks that a rating sits in the 1–5 range.
pub fn validate_rating(value: i64) -> Result<u8, EventError> {
    if (MIN_RATING..=MAX_RATING).contains(&value) {
        Ok(value as u8)
    } else {
        Err(EventError::RatingOutOfRange(value))
    }
}

/// Result of a participant mutation. Both calls are idempotent, so the
/// "nothing to do" case is an outcome rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantOutcome {
    Added { participant: String, event: String },
    AlreadyRegistered { participant: String, event: String },
    Removed { participant: String, event: String },
    NotRegistered { participant: String, event: String },
}

impl ParticipantOutcome {
    /// True when the participant list changed.
    pub fn changed(&self) -> bool {
        matches!(
            self,
            ParticipantOutcome::Added { .. } | ParticipantOutcome::Removed { .. }
        )
    }
}

impl fmt::Display for ParticipantOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParticipantOutcome::Added { participant, event } => {
                write!(f, "Participant '{participant}' successfully added to '{event}'.")
            }
            ParticipantOutcome::AlreadyRegistered { participant, event } => {
                write!(f, "Participant '{participant}' is already registered for '{event}'.")
            }
            ParticipantOutcome::Removed { participant, event } => {
                write!(f, "Participant '{participant}' removed from '{event}'.")
            }
            ParticipantOutcome::NotRegistered { participant, event } => {
                write!(f, "Participant '{participant}' is not registered for '{event}'.")
            }
        }
    }
}

/// A schedulable unit of work.
///
/// The serialized form doubles as the snapshot record, so field names are
/// part of the on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub name: String,
    pub date: NaiveDate,
    pub priority: i64,
    #[serde(default, deserialize_with = "deserialize_instructor")]
    pub instructor: Option<String>,
    #[serde(default)]
    participants: Vec<String>,
    #[serde(default)]
    state: EventState,
    #[serde(default)]
    rating: Option<u8>,
}

impl Event {
    pub fn new(
        name: impl Into<String>,
        date: NaiveDate,
        priority: i64,
        instructor: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            date,
            priority,
            instructor: instructor.filter(|value| !value.trim().is_empty()),
            participants: Vec::new(),
            state: EventState::NotStarted,
            rating: None,
        }
    }

    pub fn participants(&self) -> &[String] {
        &self.participants
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn rating(&self) -> Option<u8> {
        self.rating
    }

    pub fn has_participant(&self, participant: &str) -> bool {
        self.participants.iter().any(|name| name == participant)
    }

    pub fn add_participant(&mut self, participant: &str) -> ParticipantOutcome {
        let participant_name = participant.to_string();
        let event = self.name.clone();
        if self.has_participant(participant) {
            return ParticipantOutcome::AlreadyRegistered {
                participant: participant_name,
                event,
            };
        }
        self.participants.push(participant_name.clone());
        ParticipantOutcome::Added {
            participant: participant_name,
            event,
        }
    }

    pub fn remove_participant(&mut self, participant: &str) -> ParticipantOutcome {
        let participant_name = participant.to_string();
        let event = self.name.clone();
        match self.participants.iter().position(|name| name == participant) {
            Some(position) => {
                self.participants.remove(position);
                ParticipantOutcome::Removed {
                    participant: participant_name,
                    event,
                }
            }
            None => ParticipantOutcome::NotRegistered {
                participant: participant_name,
                event,
            },
        }
    }

    /// Moves the event to `next`, returning the previous state.
    ///
    /// Re-asserting the current state succeeds without change; moving
    /// backwards is rejected and leaves the event untouched.
    pub fn update_state(&mut self, next: EventState) -> Result<EventState, EventError> {
        let previous = self.state;
        if next < previous {
            return Err(EventError::BackwardTransition {
                event: self.name.clone(),
                from: previous,
                to: next,
            });
        }
        self.state = next;
        Ok(previous)
    }

    /// Records a 1–5 rating, overwriting any previous one.
    ///
    /// There is no state precondition here; the event book is the layer that
    /// insists on `Completed`.
    pub fn rate(&mut self, value: i64) -> Result<u8, EventError> {
        let rating = validate_rating(value)?;
        self.rating = Some(rating);
        Ok(rating)
    }

    pub(crate) fn clear_rating(&mut self) {
        self.rating = None;
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} (priority {}, {}, {} participants",
            self.name,
            self.date.format(DATE_FORMAT),
            self.priority,
            self.state,
            self.participants.len()
        )?;
        if let Some(instructor) = &self.instructor {
            write!(f, ", instructor {instructor}")?;
        }
        if let Some(rating) = self.rating {
            write!(f, ", rated {rating}/5")?;
        }
        f.write_str(")")
    }
}

// Older snapshots store a missing instructor as an empty string.
fn deserialize_instructor<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|name| !name.trim().is_empty()))
}

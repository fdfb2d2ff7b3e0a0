//! The event book owns every event and keeps the queue, dependency graph,
//! lookup tables and sorted index consistent with it.
//!
//! Every structure other than `events` holds [`EventId`]s. Removing an event
//! runs one rebuild pass over all of them, so no view can surface a removed
//! event afterwards.

use std::collections::BTreeMap;

use strsim::jaro_winkler;
use thiserror::Error;
use tracing::{debug, info};

use crate::event::{Event, EventError, EventId, EventState, ParticipantOutcome, validate_rating};
use crate::graph::{DependencyGraph, GraphError};
use crate::index::MultiKeyIndex;
use crate::queue::{MinHeap, ScheduleKey};
use crate::table::{ChainedTable, DEFAULT_BUCKETS};

const SUGGESTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookError {
    #[error("event name cannot be empty")]
    EmptyName,
    #[error("event '{0}' already exists")]
    DuplicateName(String),
    #[error("event '{name}' not found{}", suggestion_suffix(.suggestion))]
    NotFound {
        name: String,
        suggestion: Option<String>,
    },
    #[error("no events available")]
    EmptyQueue,
    #[error("cannot execute '{event}'. Pending dependencies: {}", .pending.join(", "))]
    PendingDependencies { event: String, pending: Vec<String> },
    #[error("event '{0}' is not completed")]
    NotCompleted(String),
    #[error("an event cannot depend on itself ('{0}')")]
    SelfDependency(String),
    #[error(transparent)]
    Event(#[from] EventError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(name) => format!(". Did you mean '{name}'?"),
        None => String::new(),
    }
}

/// What happened when the next event was run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    pub id: EventId,
    pub name: String,
    pub participant_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstructorRanking {
    pub instructor: String,
    pub average: f64,
    pub ratings: usize,
}

/// Authoritative in-memory store of events.
///
/// Not synchronized: all mutation goes through `&mut self`.
#[derive(Debug, Clone)]
pub struct EventBook {
    events: BTreeMap<EventId, Event>,
    names: ChainedTable<EventId>,
    queue: MinHeap<ScheduleKey>,
    dependencies: DependencyGraph<EventId>,
    index: MultiKeyIndex,
    instructor_ratings: ChainedTable<Vec<u8>>,
    next_id: u64,
}

impl Default for EventBook {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBook {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Creates a book whose lookup tables use `buckets` chains.
    pub fn with_buckets(buckets: usize) -> Self {
        Self {
            events: BTreeMap::new(),
            names: ChainedTable::with_buckets(buckets),
            queue: MinHeap::new(),
            dependencies: DependencyGraph::new(),
            index: MultiKeyIndex::new(),
            instructor_ratings: ChainedTable::with_buckets(buckets),
            next_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.names.bucket_count()
    }

    /// Registers a new event in every structure.
    ///
    /// Completed events are stored and indexed but never queued. Surrounding
    /// whitespace is stripped from the name before it becomes the key.
    pub fn add_event(&mut self, mut event: Event) -> Result<EventId, BookError> {
        event.name = event.name.trim().to_string();
        if event.name.is_empty() {
            return Err(BookError::EmptyName);
        }
        if self.names.contains_key(&event.name) {
            return Err(BookError::DuplicateName(event.name.clone()));
        }

        let id = EventId(self.next_id);
        self.next_id += 1;

        self.names.insert(event.name.clone(), id);
        if event.state() != EventState::Completed {
            self.queue.insert(ScheduleKey::for_event(id, &event));
        }
        self.dependencies.add_event(id);
        self.index.insert(id, &event);
        debug!(%id, name = %event.name, "event registered");
        self.events.insert(id, event);
        Ok(id)
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events.get(&id)
    }

    pub fn id_of(&self, name: &str) -> Option<EventId> {
        self.names.get(name.trim()).copied()
    }

    /// Looks an event up by exact name.
    pub fn find(&self, name: &str) -> Result<&Event, BookError> {
        let id = self.resolve(name)?;
        self.events.get(&id).ok_or_else(|| self.not_found(name))
    }

    /// Events in creation order.
    pub fn events(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.events.iter().map(|(id, event)| (*id, event))
    }

    /// The event the queue would run next.
    pub fn next_event(&self) -> Option<&Event> {
        self.queue.peek().and_then(|key| self.events.get(&key.id))
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Runs the next queued event if all of its prerequisites are completed.
    ///
    /// A blocked event stays at the head of the queue.
    pub fn execute_next(&mut self) -> Result<ExecutionReport, BookError> {
        let head = self.queue.peek().copied().ok_or(BookError::EmptyQueue)?;
        let pending = self.pending_ids(head.id);
        if !pending.is_empty() {
            return Err(BookError::PendingDependencies {
                event: self.name_of(head.id),
                pending: pending.into_iter().map(|id| self.name_of(id)).collect(),
            });
        }

        self.queue.extract_min();
        let Some(event) = self.events.get_mut(&head.id) else {
            return Err(BookError::EmptyQueue);
        };
        event.update_state(EventState::Ongoing)?;
        info!(event = %event.name, "event is now ongoing");
        let report = ExecutionReport {
            id: head.id,
            name: event.name.clone(),
            participant_count: event.participants().len(),
        };
        event.update_state(EventState::Completed)?;
        info!(event = %event.name, participants = report.participant_count, "event completed");
        Ok(report)
    }

    /// Records that `dependent` cannot start before `prerequisite` completes.
    ///
    /// Cycles are not rejected here; ask [`EventBook::has_cycle`].
    pub fn add_dependency(&mut self, prerequisite: &str, dependent: &str) -> Result<(), BookError> {
        let prerequisite_id = self.resolve(prerequisite)?;
        let dependent_id = self.resolve(dependent)?;
        if prerequisite_id == dependent_id {
            return Err(BookError::SelfDependency(dependent.to_string()));
        }
        self.dependencies
            .add_dependency(&dependent_id, &prerequisite_id)?;
        Ok(())
    }

    /// Names of the prerequisites of `name` that are not completed yet.
    pub fn pending_prerequisites(&self, name: &str) -> Result<Vec<String>, BookError> {
        let id = self.resolve(name)?;
        Ok(self
            .pending_ids(id)
            .into_iter()
            .map(|pending| self.name_of(pending))
            .collect())
    }

    /// Names of every prerequisite of `name`, in the order they were added.
    pub fn prerequisites(&self, name: &str) -> Result<Vec<String>, BookError> {
        let id = self.resolve(name)?;
        Ok(self
            .dependencies
            .successors(&id)
            .iter()
            .map(|prerequisite| self.name_of(*prerequisite))
            .collect())
    }

    pub fn has_cycle(&self) -> bool {
        self.dependencies.has_cycle()
    }

    /// Event names along the first dependency cycle found.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        self.dependencies
            .find_cycle()
            .map(|cycle| cycle.into_iter().map(|id| self.name_of(id)).collect())
    }

    pub fn add_participant(
        &mut self,
        event: &str,
        participant: &str,
    ) -> Result<ParticipantOutcome, BookError> {
        let id = self.resolve(event)?;
        let outcome = self.event_mut(id, event)?.add_participant(participant);
        if outcome.changed() {
            self.refresh_participant_index();
        }
        Ok(outcome)
    }

    pub fn remove_participant(
        &mut self,
        event: &str,
        participant: &str,
    ) -> Result<ParticipantOutcome, BookError> {
        let id = self.resolve(event)?;
        let outcome = self.event_mut(id, event)?.remove_participant(participant);
        if outcome.changed() {
            self.refresh_participant_index();
        }
        Ok(outcome)
    }

    pub fn participants(&self, event: &str) -> Result<&[String], BookError> {
        Ok(self.find(event)?.participants())
    }

    /// Removes an event and rebuilds every structure that referenced it.
    pub fn remove_event(&mut self, name: &str) -> Result<Event, BookError> {
        let id = self.resolve(name)?;
        let event = self.events.remove(&id).ok_or_else(|| self.not_found(name))?;

        self.names.remove(&event.name);
        self.queue.retain(|key| key.id != id);
        self.dependencies.remove_event(&id);
        self.index
            .rebuild(self.events.iter().map(|(id, event)| (*id, event)));
        info!(event = %event.name, "event removed");
        Ok(event)
    }

    /// Advances an event's state. A completed event leaves the queue.
    pub fn set_state(&mut self, name: &str, state: EventState) -> Result<EventState, BookError> {
        let id = self.resolve(name)?;
        let previous = self.event_mut(id, name)?.update_state(state)?;
        if state == EventState::Completed {
            self.queue.retain(|key| key.id != id);
        }
        Ok(previous)
    }

    /// Rates an event. Only completed events can be rated.
    pub fn rate_event(&mut self, name: &str, value: i64) -> Result<u8, BookError> {
        let id = self.resolve(name)?;
        let event = self.event_mut(id, name)?;
        if event.state() != EventState::Completed {
            return Err(BookError::NotCompleted(event.name.clone()));
        }
        Ok(event.rate(value)?)
    }

    /// Appends a 1–5 rating to the instructor's list.
    pub fn rate_instructor(&mut self, instructor: &str, value: i64) -> Result<u8, BookError> {
        let rating = validate_rating(value)?;
        match self.instructor_ratings.get_mut(instructor) {
            Some(ratings) => ratings.push(rating),
            None => {
                self.instructor_ratings
                    .insert(instructor.to_string(), vec![rating]);
            }
        }
        Ok(rating)
    }

    pub fn instructor_ratings(&self, instructor: &str) -> Option<&[u8]> {
        self.instructor_ratings.get(instructor).map(Vec::as_slice)
    }

    /// Instructors by average rating, best first; ties go alphabetically.
    pub fn instructor_rankings(&self) -> Vec<InstructorRanking> {
        let mut rankings: Vec<InstructorRanking> = self
            .instructor_ratings
            .iter()
            .filter(|(_, ratings)| !ratings.is_empty())
            .map(|(instructor, ratings)| InstructorRanking {
                instructor: instructor.to_string(),
                average: ratings.iter().map(|r| f64::from(*r)).sum::<f64>() / ratings.len() as f64,
                ratings: ratings.len(),
            })
            .collect();
        rankings.sort_by(|a, b| {
            b.average
                .total_cmp(&a.average)
                .then_with(|| a.instructor.cmp(&b.instructor))
        });
        rankings
    }

    pub fn by_date(&self) -> Vec<&Event> {
        self.resolve_all(self.index.inorder_by_date())
    }

    pub fn by_participant_count(&self) -> Vec<&Event> {
        self.resolve_all(self.index.inorder_by_participant_count())
    }

    pub fn by_instructor(&self) -> Vec<&Event> {
        self.resolve_all(self.index.inorder_by_instructor())
    }

    /// Every pair of events sharing a date, in creation order.
    pub fn overlapping(&self) -> Vec<(&Event, &Event)> {
        let events: Vec<&Event> = self.events.values().collect();
        let mut pairs = Vec::new();
        for (position, first) in events.iter().enumerate() {
            for second in &events[position + 1..] {
                if first.date == second.date {
                    pairs.push((*first, *second));
                }
            }
        }
        pairs
    }

    pub fn by_state(&self, state: EventState) -> Vec<&Event> {
        self.events
            .values()
            .filter(|event| event.state() == state)
            .collect()
    }

    /// Exact-name lookup with a fuzzy suggestion on a miss.
    fn resolve(&self, name: &str) -> Result<EventId, BookError> {
        self.id_of(name).ok_or_else(|| self.not_found(name))
    }

    fn not_found(&self, name: &str) -> BookError {
        BookError::NotFound {
            name: name.to_string(),
            suggestion: self.closest_name(name),
        }
    }

    fn closest_name(&self, name: &str) -> Option<String> {
        let mut best: Option<(f64, &str)> = None;
        for event in self.events.values() {
            let score = jaro_winkler(name, &event.name);
            if score < SUGGESTION_THRESHOLD {
                continue;
            }
            match best {
                Some((best_score, _)) if score <= best_score => {}
                _ => best = Some((score, event.name.as_str())),
            }
        }
        best.map(|(_, name)| name.to_string())
    }

    fn event_mut(&mut self, id: EventId, name: &str) -> Result<&mut Event, BookError> {
        if !self.events.contains_key(&id) {
            return Err(self.not_found(name));
        }
        self.events
            .get_mut(&id)
            .ok_or_else(|| BookError::NotFound {
                name: name.to_string(),
                suggestion: None,
            })
    }

    fn name_of(&self, id: EventId) -> String {
        self.events
            .get(&id)
            .map(|event| event.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn pending_ids(&self, id: EventId) -> Vec<EventId> {
        self.dependencies
            .successors(&id)
            .iter()
            .copied()
            .filter(|prerequisite| {
                self.events
                    .get(prerequisite)
                    .is_none_or(|event| event.state() != EventState::Completed)
            })
            .collect()
    }

    fn refresh_participant_index(&mut self) {
        self.index
            .rebuild_participant_counts(self.events.iter().map(|(id, event)| (*id, event)));
    }

    fn resolve_all(&self, ids: Vec<EventId>) -> Vec<&Event> {
        ids.into_iter()
            .filter_map(|id| self.events.get(&id))
            .collect()
    }

    pub(crate) fn dependency_edges(&self) -> Vec<(EventId, EventId)> {
        self.dependencies
            .adjacency()
            .iter()
            .flat_map(|(dependent, prerequisites)| {
                prerequisites
                    .iter()
                    .map(move |prerequisite| (*prerequisite, *dependent))
            })
            .collect()
    }

    pub(crate) fn instructor_rating_entries(&self) -> BTreeMap<String, Vec<u8>> {
        self.instructor_ratings
            .iter()
            .map(|(name, ratings)| (name.to_string(), ratings.clone()))
            .collect()
    }

    pub(crate) fn restore_instructor_ratings(&mut self, instructor: String, ratings: Vec<u8>) {
        self.instructor_ratings.insert(instructor, ratings);
    }
}

//! Sorted views over the event set, one unbalanced search tree per key.

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;

use crate::event::{Event, EventId};

struct Node<K, V> {
    key: K,
    value: V,
    left: Option<Box<Node<K, V>>>,
    right: Option<Box<Node<K, V>>>,
}

/// Unbalanced binary search tree over `(key, value)` pairs.
///
/// Equal keys are ordered by value, so two entries sharing a key both stay
/// in the tree. Only an exact `(key, value)` repeat is ignored.
///
/// Sorted input degenerates the tree into a list, so nothing here recurses
/// over nodes: walks, clone and drop all keep an explicit stack.
pub struct SearchTree<K, V> {
    root: Option<Box<Node<K, V>>>,
    len: usize,
}

impl<K, V> Default for SearchTree<K, V> {
    fn default() -> Self {
        Self { root: None, len: 0 }
    }
}

impl<K: Ord, V: Ord + Clone> SearchTree<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Inserts the pair, returning `false` if it was already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        let mut slot = &mut self.root;
        while let Some(node) = slot {
            let ordering = key
                .cmp(&node.key)
                .then_with(|| value.cmp(&node.value));
            slot = match ordering {
                Ordering::Less => &mut node.left,
                Ordering::Greater => &mut node.right,
                Ordering::Equal => return false,
            };
        }
        *slot = Some(Box::new(Node {
            key,
            value,
            left: None,
            right: None,
        }));
        self.len += 1;
        true
    }

    /// Values in ascending key order (left, node, right).
    pub fn inorder(&self) -> Vec<V> {
        let mut values = Vec::with_capacity(self.len);
        let mut stack: Vec<&Node<K, V>> = Vec::new();
        let mut current = self.root.as_deref();

        while current.is_some() || !stack.is_empty() {
            while let Some(node) = current {
                stack.push(node);
                current = node.left.as_deref();
            }
            if let Some(node) = stack.pop() {
                values.push(node.value.clone());
                current = node.right.as_deref();
            }
        }
        values
    }

    /// Longest root-to-leaf path; an unbalanced tree fed sorted input
    /// degenerates to `len`.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending: Vec<(&Node<K, V>, usize)> =
            self.root.as_deref().map(|root| (root, 1)).into_iter().collect();
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(node.left.as_deref().map(|child| (child, level + 1)));
            pending.extend(node.right.as_deref().map(|child| (child, level + 1)));
        }
        deepest
    }
}

impl<K, V> Drop for SearchTree<K, V> {
    fn drop(&mut self) {
        let mut pending: Vec<Box<Node<K, V>>> = self.root.take().into_iter().collect();
        while let Some(mut node) = pending.pop() {
            pending.extend(node.left.take());
            pending.extend(node.right.take());
        }
    }
}

impl<K: Ord + Clone, V: Ord + Clone> Clone for SearchTree<K, V> {
    /// Re-inserts in pre-order, which reproduces the same shape.
    fn clone(&self) -> Self {
        let mut copy = Self::new();
        let mut pending: Vec<&Node<K, V>> = self.root.as_deref().into_iter().collect();
        while let Some(node) = pending.pop() {
            copy.insert(node.key.clone(), node.value.clone());
            pending.extend(node.right.as_deref());
            pending.extend(node.left.as_deref());
        }
        copy
    }
}

impl<K, V> fmt::Debug for SearchTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchTree")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

/// The three orderings the categorize view needs, each over event ids.
///
/// Keys are snapshots taken at insertion time; after mutating an event the
/// owner must rebuild the affected tree.
#[derive(Debug, Clone, Default)]
pub struct MultiKeyIndex {
    by_date: SearchTree<NaiveDate, EventId>,
    by_participant_count: SearchTree<usize, EventId>,
    by_instructor: SearchTree<Option<String>, EventId>,
}

impl MultiKeyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: EventId, event: &Event) {
        self.insert_by_date(id, event);
        self.insert_by_participant_count(id, event);
        self.insert_by_instructor(id, event);
    }

    pub fn insert_by_date(&mut self, id: EventId, event: &Event) -> bool {
        self.by_date.insert(event.date, id)
    }

    pub fn insert_by_participant_count(&mut self, id: EventId, event: &Event) -> bool {
        self.by_participant_count
            .insert(event.participants().len(), id)
    }

    /// Events without an instructor sort ahead of every named instructor.
    pub fn insert_by_instructor(&mut self, id: EventId, event: &Event) -> bool {
        self.by_instructor.insert(event.instructor.clone(), id)
    }

    pub fn inorder_by_date(&self) -> Vec<EventId> {
        self.by_date.inorder()
    }

    pub fn inorder_by_participant_count(&self) -> Vec<EventId> {
        self.by_participant_count.inorder()
    }

    pub fn inorder_by_instructor(&self) -> Vec<EventId> {
        self.by_instructor.inorder()
    }

    pub fn len(&self) -> usize {
        self.by_date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }

    /// Clears all three trees and re-inserts `events`.
    pub fn rebuild<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = (EventId, &'a Event)>,
    {
        self.by_date.clear();
        self.by_participant_count.clear();
        self.by_instructor.clear();
        for (id, event) in events {
            self.insert(id, event);
        }
    }

    pub fn rebuild_participant_counts<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = (EventId, &'a Event)>,
    {
        self.by_participant_count.clear();
        for (id, event) in events {
            self.insert_by_participant_count(id, event);
        }
    }
}

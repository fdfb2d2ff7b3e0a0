//! Fixed-bucket hash table with chained entries.
//!
//! The bucket count never changes after construction, so a table holding far
//! more keys than buckets degrades to a linear scan per bucket. That ceiling
//! is fine for the human-scale data this tool manages.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const DEFAULT_BUCKETS: usize = 10;

#[derive(Debug, Clone)]
pub struct ChainedTable<V> {
    buckets: Vec<Vec<(String, V)>>,
    len: usize,
}

impl<V> Default for ChainedTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> ChainedTable<V> {
    pub fn new() -> Self {
        Self::with_buckets(DEFAULT_BUCKETS)
    }

    /// Creates a table with `buckets` chains. Zero is bumped to one.
    pub fn with_buckets(buckets: usize) -> Self {
        let count = buckets.max(1);
        let mut chains = Vec::with_capacity(count);
        chains.resize_with(count, Vec::new);
        Self {
            buckets: chains,
            len: 0,
        }
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: impl Into<String>, value: V) -> Option<V> {
        let key = key.into();
        let index = self.bucket_index(&key);
        let chain = &mut self.buckets[index];
        if let Some(entry) = chain.iter_mut().find(|(existing, _)| *existing == key) {
            return Some(std::mem::replace(&mut entry.1, value));
        }
        chain.push((key, value));
        self.len += 1;
        None
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.buckets[self.bucket_index(key)]
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        let index = self.bucket_index(key);
        self.buckets[index]
            .iter_mut()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<V> {
        let index = self.bucket_index(key);
        let chain = &mut self.buckets[index];
        let position = chain.iter().position(|(existing, _)| existing == key)?;
        self.len -= 1;
        Some(chain.swap_remove(position).1)
    }

    /// Entries in bucket order. Not sorted.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.buckets
            .iter()
            .flat_map(|chain| chain.iter().map(|(key, value)| (key.as_str(), value)))
    }

    /// Length of the longest chain; a quick read on how skewed the keys are.
    pub fn longest_chain(&self) -> usize {
        self.buckets.iter().map(Vec::len).max().unwrap_or(0)
    }

    fn bucket_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.buckets.len() as u64) as usize
    }
}

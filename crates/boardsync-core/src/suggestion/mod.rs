//! Bounded, most-recent-first suggestion buffer.

pub mod model;

pub use model::AgentSuggestion;

use std::collections::VecDeque;

/// Number of suggestions a client retains.
pub const SUGGESTION_CAPACITY: usize = 5;

/// Most-recent-first buffer of suggestions, deduplicated by id.
///
/// The buffer is only ever appended to and pruned, never replaced.
#[derive(Debug, Clone)]
pub struct SuggestionBuffer {
    items: VecDeque<AgentSuggestion>,
    capacity: usize,
}

impl SuggestionBuffer {
    pub fn new() -> Self {
        Self::with_capacity(SUGGESTION_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Prepend a suggestion, dropping the oldest past capacity.
    ///
    /// Returns false if a suggestion with the same id is already held.
    pub fn push(&mut self, suggestion: AgentSuggestion) -> bool {
        if self.contains(&suggestion.id) {
            return false;
        }
        self.items.push_front(suggestion);
        self.items.truncate(self.capacity);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentSuggestion> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<AgentSuggestion> {
        self.items.iter().cloned().collect()
    }
}

impl Default for SuggestionBuffer {
    fn default() -> Self {
        Self::new()
    }
}

use std::collections::HashMap;

use crate::word::Word;

/// Read access to the learner's accumulated query/response knowledge.
pub trait KnowledgeBase {
    /// Response previously observed for exactly `query`, if any.
    fn output_word(&self, query: &Word) -> Option<&Word>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Append-only in-memory knowledge cache.
#[derive(Debug, Clone, Default)]
pub struct MemoryKnowledge {
    entries: HashMap<Word, Word>,
}

impl MemoryKnowledge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the response to `query`. An existing entry is never replaced;
    /// returns `false` when `query` was already known.
    pub fn record(&mut self, query: Word, response: Word) -> bool {
        if self.entries.contains_key(&query) {
            return false;
        }
        self.entries.insert(query, response);
        true
    }
}

impl KnowledgeBase for MemoryKnowledge {
    fn output_word(&self, query: &Word) -> Option<&Word> {
        self.entries.get(query)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

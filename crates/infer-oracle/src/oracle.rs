use infer_core::{InferResult, KnowledgeBase, MemoryKnowledge, ProtocolMapper, QueryStats, Word};

use crate::executor::QueryExecutor;

/// Membership-query interface for a learning algorithm.
pub trait QueryOracle {
    fn query(&mut self, word: &Word) -> InferResult<Word>;
}

/// Executor plus the knowledge it has gathered. Exact repeats are served from
/// the cache, new answers are recorded after each query completes.
pub struct CachingOracle<M> {
    executor: QueryExecutor<M>,
    knowledge: MemoryKnowledge,
}

impl<M: ProtocolMapper> CachingOracle<M> {
    pub fn new(executor: QueryExecutor<M>) -> Self {
        Self {
            executor,
            knowledge: MemoryKnowledge::new(),
        }
    }

    pub fn knowledge(&self) -> &MemoryKnowledge {
        &self.knowledge
    }

    pub fn executor(&self) -> &QueryExecutor<M> {
        &self.executor
    }

    pub fn stats(&self) -> &QueryStats {
        self.executor.stats()
    }
}

impl<M: ProtocolMapper> QueryOracle for CachingOracle<M> {
    fn query(&mut self, word: &Word) -> InferResult<Word> {
        if let Some(known) = self.knowledge.output_word(word) {
            return Ok(known.clone());
        }
        let answer = self.executor.execute(&self.knowledge, word)?;
        self.knowledge.record(word.clone(), answer.clone());
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::TargetPool;
    use crate::testing::RecordingMapper;
    use infer_core::{InferError, SessionLayout};
    use std::time::Duration;

    fn oracle(mapper: RecordingMapper) -> CachingOracle<RecordingMapper> {
        let layout = SessionLayout::new(0, "192.123", 2).unwrap();
        let executor =
            QueryExecutor::new(mapper, TargetPool::new(&layout), Duration::from_millis(100))
                .unwrap();
        CachingOracle::new(executor)
    }

    fn word(symbols: &[&str]) -> Word {
        Word::from_symbols(symbols.iter().copied())
    }

    #[test]
    fn test_learns_closed_connection_then_shortcuts() {
        let mapper = RecordingMapper::with_answers(&[
            ("Open", "OK,"),
            ("Read", "Data,"),
            ("Close", "Eof,"),
        ]);
        let mut oracle = oracle(mapper);

        oracle.query(&word(&["Open", "Close"])).unwrap();
        let answer = oracle.query(&word(&["Open", "Close", "Read"])).unwrap();

        assert_eq!(answer, word(&["OK,", "Eof,", "Eof,"]));
        assert_eq!(oracle.executor().mapper().calls.len(), 1);
        assert_eq!(oracle.knowledge().len(), 2);
    }

    #[test]
    fn test_repeat_query_served_from_cache() {
        let mut oracle = oracle(RecordingMapper::default());
        let first = oracle.query(&word(&["hello"])).unwrap();
        let second = oracle.query(&word(&["hello"])).unwrap();
        assert_eq!(first, second);
        assert_eq!(oracle.executor().mapper().calls.len(), 1);
        assert_eq!(oracle.stats().queries, 1);
    }

    #[test]
    fn test_failed_query_is_not_recorded() {
        let mapper = RecordingMapper {
            fail_with: Some("timeout".into()),
            ..RecordingMapper::default()
        };
        let mut oracle = oracle(mapper);
        let err = oracle.query(&word(&["hello"])).unwrap_err();
        assert!(matches!(err, InferError::Transport(_)));
        assert!(oracle.knowledge().is_empty());
    }
}

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use infer_core::{
    InferError, InferResult, KnowledgeBase, ProtocolMapper, QueryStats, ResponseHints,
    Submission, Word,
};

use crate::pool::TargetPool;
use crate::reset::ResetSignal;
use crate::resolver::{resolve, Markers, Resolution};

/// The query oracle handed to the learning algorithm.
///
/// Answers come from cached knowledge when a prefix already ended in a closed
/// connection, and from the next replica in the pool otherwise.
pub struct QueryExecutor<M> {
    mapper: M,
    pool: TargetPool,
    reset: Option<Box<dyn ResetSignal>>,
    timeout: Duration,
    markers: Markers,
    stats: QueryStats,
}

impl<M: ProtocolMapper> QueryExecutor<M> {
    /// Fetches every replica's server identity before returning.
    pub fn new(mut mapper: M, pool: TargetPool, timeout: Duration) -> InferResult<Self> {
        for replica in pool.replicas() {
            let destination = replica.endpoint.to_string();
            mapper
                .fetch_server_identity(&destination, timeout)
                .map_err(as_transport)?;
            debug!("fetched server identity of {destination}");
        }
        Ok(Self {
            mapper,
            pool,
            reset: None,
            timeout,
            markers: Markers::default(),
            stats: QueryStats::default(),
        })
    }

    /// Reset the queried replica after every network query.
    pub fn with_reset(mut self, reset: Box<dyn ResetSignal>) -> Self {
        self.reset = Some(reset);
        self
    }

    pub fn with_markers(mut self, markers: Markers) -> Self {
        self.markers = markers;
        self
    }

    pub fn stats(&self) -> &QueryStats {
        &self.stats
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Answer `word`. Only an empty word is rejected outright; mapper
    /// failures come back as [`InferError::Transport`] without retry.
    pub fn execute<K>(&mut self, knowledge: &K, word: &Word) -> InferResult<Word>
    where
        K: KnowledgeBase + ?Sized,
    {
        if word.is_empty() {
            return Err(InferError::EmptyWord);
        }
        self.stats.queries += 1;
        debug!("execute word {word}");

        let hints = match resolve(knowledge, word, &self.markers) {
            Resolution::Closed(answer) => {
                self.stats.shortcuts += 1;
                debug!("answered {word} from closed prefix: {answer}");
                return Ok(answer);
            }
            Resolution::Hinted(hints) => hints,
            Resolution::Unknown => ResponseHints::default(),
        };

        let replica = self.pool.select_next().clone();
        let destination = replica.endpoint.to_string();
        let symbols = word.symbols();
        let raw = self
            .mapper
            .submit(Submission {
                destination: &destination,
                symbols: &symbols,
                replica_index: replica.index,
                timeout: self.timeout,
                hints: &hints,
            })
            .map_err(as_transport)?;
        self.stats.network_queries += 1;
        self.stats.letters_sent += symbols.len() as u64;
        info!("{symbols:?} --> {raw:?}");

        // The replica has seen the query even when its answer is malformed.
        if let Some(reset) = &self.reset {
            reset.reset(&replica)?;
            self.stats.resets += 1;
        }

        if raw.len() != symbols.len() {
            return Err(InferError::Transport(format!(
                "{destination} answered {} symbols for a {}-letter query",
                raw.len(),
                symbols.len()
            )));
        }
        Ok(Word::from_symbols(raw))
    }

    /// Write the statistics artifact as JSON.
    pub fn write_stats(&self, path: &Path) -> InferResult<()> {
        let json = serde_json::to_string_pretty(&self.stats)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn as_transport(err: InferError) -> InferError {
    match err {
        InferError::Transport(_) => err,
        other => InferError::Transport(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingReset, RecordingMapper};
    use infer_core::{MemoryKnowledge, SessionLayout};

    fn word(symbols: &[&str]) -> Word {
        Word::from_symbols(symbols.iter().copied())
    }

    fn executor(mapper: RecordingMapper, replicas: usize) -> QueryExecutor<RecordingMapper> {
        let layout = SessionLayout::new(0, "192.123", replicas).unwrap();
        QueryExecutor::new(mapper, TargetPool::new(&layout), Duration::from_millis(500)).unwrap()
    }

    #[test]
    fn test_fetches_identity_of_every_replica() {
        let exec = executor(RecordingMapper::default(), 3);
        assert_eq!(
            exec.mapper().identities,
            vec!["192.123.0.10:4840", "192.123.0.11:4840", "192.123.0.12:4840"]
        );
    }

    #[test]
    fn test_empty_word_is_rejected() {
        let mut exec = executor(RecordingMapper::default(), 1);
        let err = exec
            .execute(&MemoryKnowledge::new(), &Word::default())
            .unwrap_err();
        assert!(matches!(err, InferError::EmptyWord));
        assert!(exec.mapper().calls.is_empty());
    }

    #[test]
    fn test_closed_prefix_needs_no_network() {
        let mut knowledge = MemoryKnowledge::new();
        knowledge.record(word(&["Open", "Read"]), word(&["OK", "Eof,"]));
        let mut exec = executor(RecordingMapper::default(), 2);

        let answer = exec
            .execute(&knowledge, &word(&["Open", "Read", "Close"]))
            .unwrap();

        assert_eq!(answer, word(&["OK", "Eof,", "Eof,"]));
        assert!(exec.mapper().calls.is_empty());
        assert_eq!(exec.stats().shortcuts, 1);
        assert_eq!(exec.stats().network_queries, 0);
    }

    #[test]
    fn test_open_prefix_sends_query_with_hints() {
        let mut knowledge = MemoryKnowledge::new();
        knowledge.record(word(&["Open"]), word(&["OK"]));
        let mapper = RecordingMapper::with_answers(&[("Open", "OK"), ("Read", "Data,")]);
        let mut exec = executor(mapper, 2);

        let answer = exec.execute(&knowledge, &word(&["Open", "Read"])).unwrap();

        assert_eq!(answer, word(&["OK", "Data,"]));
        let calls = &exec.mapper().calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].symbols, vec!["Open", "Read"]);
        assert_eq!(calls[0].hints.field_counts, vec![1]);
        assert!(calls[0].hints.no_response.is_empty());
    }

    #[test]
    fn test_unknown_query_sends_empty_hints() {
        let mut exec = executor(RecordingMapper::default(), 1);
        let answer = exec
            .execute(&MemoryKnowledge::new(), &word(&["hello"]))
            .unwrap();
        assert_eq!(answer, word(&["helloResp,"]));
        assert!(exec.mapper().calls[0].hints.is_empty());
    }

    #[test]
    fn test_queries_rotate_across_replicas() {
        let mut exec = executor(RecordingMapper::default(), 3);
        let knowledge = MemoryKnowledge::new();
        for _ in 0..5 {
            exec.execute(&knowledge, &word(&["hello"])).unwrap();
        }
        let indices: Vec<usize> = exec
            .mapper()
            .calls
            .iter()
            .map(|c| c.replica_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 1]);
        assert_eq!(exec.mapper().calls[1].destination, "192.123.0.11:4840");
    }

    #[test]
    fn test_shortcut_does_not_advance_cursor() {
        let mut knowledge = MemoryKnowledge::new();
        knowledge.record(word(&["bye"]), word(&["Eof,"]));
        let mut exec = executor(RecordingMapper::default(), 2);

        exec.execute(&knowledge, &word(&["hello"])).unwrap();
        exec.execute(&knowledge, &word(&["bye", "hello"])).unwrap();
        exec.execute(&knowledge, &word(&["hello"])).unwrap();

        let indices: Vec<usize> = exec
            .mapper()
            .calls
            .iter()
            .map(|c| c.replica_index)
            .collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_reset_follows_each_network_query() {
        let reset = CountingReset::default();
        let mut knowledge = MemoryKnowledge::new();
        knowledge.record(word(&["bye"]), word(&["Eof,"]));
        let mut exec =
            executor(RecordingMapper::default(), 2).with_reset(Box::new(reset.clone()));

        exec.execute(&knowledge, &word(&["hello"])).unwrap();
        exec.execute(&knowledge, &word(&["bye", "hello"])).unwrap();
        exec.execute(&knowledge, &word(&["hello", "hello"])).unwrap();

        assert_eq!(reset.count.get(), 2);
        assert_eq!(*reset.replicas.borrow(), vec![0, 1]);
        assert_eq!(exec.stats().resets, 2);
    }

    #[test]
    fn test_mapper_failure_propagates() {
        let mapper = RecordingMapper {
            fail_with: Some("connection refused".into()),
            ..RecordingMapper::default()
        };
        let reset = CountingReset::default();
        let mut exec = executor(mapper, 1).with_reset(Box::new(reset.clone()));

        let err = exec
            .execute(&MemoryKnowledge::new(), &word(&["hello"]))
            .unwrap_err();

        assert!(matches!(err, InferError::Transport(ref m) if m == "connection refused"));
        assert_eq!(exec.mapper().calls.len(), 1);
        assert_eq!(reset.count.get(), 0);
    }

    #[test]
    fn test_misaligned_answer_is_transport_failure() {
        let mapper = RecordingMapper {
            short_answers: true,
            ..RecordingMapper::default()
        };
        let reset = CountingReset::default();
        let mut exec = executor(mapper, 1).with_reset(Box::new(reset.clone()));
        let err = exec
            .execute(&MemoryKnowledge::new(), &word(&["a", "b"]))
            .unwrap_err();
        assert!(matches!(err, InferError::Transport(_)));
        assert_eq!(reset.count.get(), 1);
        assert_eq!(exec.stats().network_queries, 1);
        assert_eq!(exec.stats().letters_sent, 2);
    }

    #[test]
    fn test_write_stats() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats");
        let mut exec = executor(RecordingMapper::default(), 1);
        exec.execute(&MemoryKnowledge::new(), &word(&["a", "b"]))
            .unwrap();
        exec.write_stats(&path).unwrap();

        let stats: QueryStats =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stats.queries, 1);
        assert_eq!(stats.letters_sent, 2);
    }
}

//! Test doubles shared by the oracle tests.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use infer_core::{InferError, InferResult, ProtocolMapper, ResponseHints, Submission};

use crate::pool::Replica;
use crate::reset::ResetSignal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub destination: String,
    pub symbols: Vec<String>,
    pub replica_index: usize,
    pub hints: ResponseHints,
}

/// Answers each symbol from a fixed table (`<symbol>Resp,` when absent) and
/// records every call.
#[derive(Default)]
pub struct RecordingMapper {
    pub answers: Vec<(String, String)>,
    pub calls: Vec<RecordedCall>,
    pub identities: Vec<String>,
    pub fail_with: Option<String>,
    pub short_answers: bool,
}

impl RecordingMapper {
    pub fn with_answers(answers: &[(&str, &str)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(q, a)| (q.to_string(), a.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    fn answer(&self, symbol: &str) -> String {
        self.answers
            .iter()
            .find(|(q, _)| q == symbol)
            .map(|(_, a)| a.clone())
            .unwrap_or_else(|| format!("{symbol}Resp,"))
    }
}

impl ProtocolMapper for RecordingMapper {
    fn fetch_server_identity(&mut self, destination: &str, _timeout: Duration) -> InferResult<()> {
        self.identities.push(destination.to_string());
        Ok(())
    }

    fn submit(&mut self, submission: Submission<'_>) -> InferResult<Vec<String>> {
        self.calls.push(RecordedCall {
            destination: submission.destination.to_string(),
            symbols: submission.symbols.to_vec(),
            replica_index: submission.replica_index,
            hints: submission.hints.clone(),
        });
        if let Some(msg) = &self.fail_with {
            return Err(InferError::Transport(msg.clone()));
        }
        let mut answers: Vec<String> = submission.symbols.iter().map(|s| self.answer(s)).collect();
        if self.short_answers {
            answers.pop();
        }
        Ok(answers)
    }
}

/// Counts reset signals; the counter is shared with the test body.
#[derive(Clone, Default)]
pub struct CountingReset {
    pub count: Rc<Cell<usize>>,
    pub replicas: Rc<RefCell<Vec<usize>>>,
}

impl ResetSignal for CountingReset {
    fn reset(&self, replica: &Replica) -> InferResult<()> {
        self.count.set(self.count.get() + 1);
        self.replicas.borrow_mut().push(replica.index);
        Ok(())
    }
}

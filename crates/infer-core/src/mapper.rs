use std::time::Duration;

use crate::error::InferResult;

/// Metadata derived from a cached response to a prefix of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHints {
    /// Field count of each known response letter, used by the mapper to size
    /// its expected-response buffer.
    pub field_counts: Vec<usize>,
    /// Positions known to produce no response; the mapper must not block
    /// waiting for a reply there.
    pub no_response: Vec<usize>,
}

impl ResponseHints {
    pub fn is_empty(&self) -> bool {
        self.field_counts.is_empty() && self.no_response.is_empty()
    }
}

/// One query as handed to the protocol mapper.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    /// `host:port` of the replica.
    pub destination: &'a str,
    pub symbols: &'a [String],
    pub replica_index: usize,
    pub timeout: Duration,
    pub hints: &'a ResponseHints,
}

/// Translates abstract symbols to wire messages and back.
pub trait ProtocolMapper {
    /// Fetch the handshake material of one replica. Called once per replica
    /// when a session's executor is built.
    fn fetch_server_identity(&mut self, destination: &str, timeout: Duration) -> InferResult<()>;

    /// Send the symbols in order and return one response symbol per input.
    fn submit(&mut self, submission: Submission<'_>) -> InferResult<Vec<String>>;
}

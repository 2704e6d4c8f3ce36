use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Counters kept by the query executor over one learning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStats {
    /// Every call to the oracle.
    pub queries: u64,
    /// Queries answered from a cached connection-closed prefix.
    pub shortcuts: u64,
    /// Queries sent to a replica.
    pub network_queries: u64,
    /// Letters sent over the network.
    pub letters_sent: u64,
    pub resets: u64,
}

impl fmt::Display for QueryStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "queries: {}, shortcuts: {}, network: {}, letters sent: {}, resets: {}",
            self.queries, self.shortcuts, self.network_queries, self.letters_sent, self.resets
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Summary written next to the result artifacts at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub session_id: u8,
    pub target_image: String,
    pub replicas: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl RunSummary {
    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

pub mod error;
pub mod knowledge;
pub mod layout;
pub mod mapper;
pub mod stats;
pub mod word;

pub use error::{InferError, InferResult};
pub use knowledge::{KnowledgeBase, MemoryKnowledge};
pub use layout::{ReplicaCounter, SessionLayout};
pub use mapper::{ProtocolMapper, ResponseHints, Submission};
pub use stats::{QueryStats, RunStatus, RunSummary};
pub use word::{Letter, Word};

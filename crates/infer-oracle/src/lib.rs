pub mod executor;
pub mod oracle;
pub mod pool;
pub mod reset;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use executor::QueryExecutor;
pub use oracle::{CachingOracle, QueryOracle};
pub use pool::{Readiness, ReadinessPolling, Replica, TargetPool};
pub use reset::{ResetSignal, TcpReset};
pub use resolver::{resolve, Markers, Resolution};

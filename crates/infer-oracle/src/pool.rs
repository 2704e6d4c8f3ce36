use std::net::SocketAddrV4;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use infer_core::{InferError, InferResult, ReplicaCounter, SessionLayout};

/// One running instance of the server under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replica {
    pub index: usize,
    pub endpoint: SocketAddrV4,
    pub reset_endpoint: SocketAddrV4,
}

/// Intervals for replica readiness polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolling {
    pub interval: Duration,
    pub timeout: Duration,
    /// Extra wait after the container count is reached, for server start-up
    /// that process liveness does not reflect.
    pub settle: Duration,
}

impl Default for ReadinessPolling {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(100),
            timeout: Duration::from_secs(300),
            settle: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut { observed: usize },
}

/// Replicas of one session plus the round-robin cursor.
#[derive(Debug, Clone)]
pub struct TargetPool {
    replicas: Vec<Replica>,
    cursor: usize,
}

impl TargetPool {
    pub fn new(layout: &SessionLayout) -> Self {
        let replicas = (0..layout.replicas())
            .map(|index| Replica {
                index,
                endpoint: layout.replica_endpoint(index),
                reset_endpoint: layout.reset_endpoint(index),
            })
            .collect();
        Self {
            replicas,
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }

    pub fn replicas(&self) -> &[Replica] {
        &self.replicas
    }

    /// Next replica in strict round-robin order, starting at index 0.
    pub fn select_next(&mut self) -> &Replica {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.replicas.len();
        &self.replicas[index]
    }

    /// Poll until the container count has grown by exactly the pool size over
    /// `baseline`, or the timeout elapses.
    pub fn poll_ready(
        &self,
        counter: &dyn ReplicaCounter,
        baseline: usize,
        polling: &ReadinessPolling,
    ) -> InferResult<Readiness> {
        let expected = self.replicas.len();
        let started = Instant::now();
        loop {
            let observed = counter.container_count()?.saturating_sub(baseline);
            if observed == expected {
                return Ok(Readiness::Ready);
            }
            if started.elapsed() >= polling.timeout {
                return Ok(Readiness::TimedOut { observed });
            }
            debug!("{observed}/{expected} replicas up");
            thread::sleep(polling.interval);
        }
    }

    /// Block until every replica is up and settled.
    pub fn wait_ready(
        &self,
        counter: &dyn ReplicaCounter,
        baseline: usize,
        polling: &ReadinessPolling,
    ) -> InferResult<()> {
        match self.poll_ready(counter, baseline, polling)? {
            Readiness::Ready => {
                info!(
                    "{} replicas up, settling for {:?}",
                    self.replicas.len(),
                    polling.settle
                );
                thread::sleep(polling.settle);
                Ok(())
            }
            Readiness::TimedOut { observed } => Err(InferError::ProvisioningTimeout {
                expected: self.replicas.len(),
                observed,
                waited: polling.timeout,
            }),
        }
    }
}

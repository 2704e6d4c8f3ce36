use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use infer_core::{InferError, InferResult};

use crate::pool::Replica;

/// Side channel that returns a replica to its initial state.
pub trait ResetSignal {
    fn reset(&self, replica: &Replica) -> InferResult<()>;
}

/// Connect-then-close on the replica's reset port.
#[derive(Debug, Clone, Copy)]
pub struct TcpReset {
    timeout: Duration,
}

impl TcpReset {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ResetSignal for TcpReset {
    fn reset(&self, replica: &Replica) -> InferResult<()> {
        let addr = SocketAddr::V4(replica.reset_endpoint);
        let stream = TcpStream::connect_timeout(&addr, self.timeout)
            .map_err(|e| InferError::Transport(format!("reset signal to {addr} failed: {e}")))?;
        drop(stream);
        debug!("reset replica {} via {addr}", replica.index);
        Ok(())
    }
}

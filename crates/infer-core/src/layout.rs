//! Address and name layout of one inference session.
//!
//! Every resource a session creates is derived from its numeric identifier:
//! the network `inference_network_<id>` with subnet `<base>.<id>.0/24`,
//! replicas `server_<id>_<i>` at `<base>.<id>.<10 + i>`, and the learner
//! `learner_<id>` at `<base>.<id>.250`. Distinct identifiers therefore never
//! share an address or a container name.

use std::net::{Ipv4Addr, SocketAddrV4};

use serde::{Deserialize, Serialize};

use crate::error::{InferError, InferResult};

/// Host octet of the first replica.
pub const REPLICA_HOST_OFFSET: u8 = 10;
/// Host octet reserved for the learner's control channel.
pub const LEARNER_HOST: u8 = 250;
pub const DEFAULT_SERVICE_PORT: u16 = 4840;
pub const DEFAULT_RESET_PORT: u16 = 5555;
pub const MAX_REPLICAS: usize = (LEARNER_HOST - REPLICA_HOST_OFFSET) as usize;

/// Process-visible count of containers, observed by readiness polling.
pub trait ReplicaCounter {
    fn container_count(&self) -> InferResult<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLayout {
    id: u8,
    base: [u8; 2],
    replicas: usize,
    service_port: u16,
    reset_port: u16,
}

impl SessionLayout {
    /// `base` holds the two leading octets of the address space, e.g.
    /// `"192.123"`.
    pub fn new(id: u8, base: &str, replicas: usize) -> InferResult<Self> {
        if replicas == 0 || replicas > MAX_REPLICAS {
            return Err(InferError::Config(format!(
                "replica count must be between 1 and {MAX_REPLICAS}, got {replicas}"
            )));
        }
        Ok(Self {
            id,
            base: parse_base(base)?,
            replicas,
            service_port: DEFAULT_SERVICE_PORT,
            reset_port: DEFAULT_RESET_PORT,
        })
    }

    pub fn with_ports(mut self, service_port: u16, reset_port: u16) -> Self {
        self.service_port = service_port;
        self.reset_port = reset_port;
        self
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    pub fn network_name(&self) -> String {
        format!("inference_network_{}", self.id)
    }

    pub fn subnet(&self) -> String {
        format!("{}.{}.{}.0/24", self.base[0], self.base[1], self.id)
    }

    fn host(&self, octet: u8) -> Ipv4Addr {
        Ipv4Addr::new(self.base[0], self.base[1], self.id, octet)
    }

    /// Address of replica `index`. Indices are taken modulo the replica count.
    pub fn replica_ip(&self, index: usize) -> Ipv4Addr {
        // MAX_REPLICAS keeps the octet below LEARNER_HOST.
        self.host(REPLICA_HOST_OFFSET + (index % self.replicas) as u8)
    }

    pub fn replica_endpoint(&self, index: usize) -> SocketAddrV4 {
        SocketAddrV4::new(self.replica_ip(index), self.service_port)
    }

    pub fn reset_endpoint(&self, index: usize) -> SocketAddrV4 {
        SocketAddrV4::new(self.replica_ip(index), self.reset_port)
    }

    pub fn learner_ip(&self) -> Ipv4Addr {
        self.host(LEARNER_HOST)
    }

    pub fn learner_container(&self) -> String {
        format!("learner_{}", self.id)
    }

    pub fn replica_container(&self, index: usize) -> String {
        format!("server_{}_{}", self.id, index)
    }

    /// Whether a container name belongs to this session. Matching is exact:
    /// `server_1_0` belongs to session 1, `server_11_0` does not.
    pub fn owns_container(&self, name: &str) -> bool {
        let name = name.trim().trim_start_matches('/');
        if name == self.learner_container() {
            return true;
        }
        let prefix = format!("server_{}_", self.id);
        match name.strip_prefix(&prefix) {
            Some(rest) => !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()),
            None => false,
        }
    }
}

fn parse_base(base: &str) -> InferResult<[u8; 2]> {
    let octets: Vec<&str> = base.trim().split('.').collect();
    let invalid = || InferError::Config(format!("network base must look like \"192.123\": {base}"));
    if octets.len() != 2 {
        return Err(invalid());
    }
    let first = octets[0].parse::<u8>().map_err(|_| invalid())?;
    let second = octets[1].parse::<u8>().map_err(|_| invalid())?;
    Ok([first, second])
}

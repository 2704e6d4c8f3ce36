//! Scripted container engine for orchestration tests.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use infer_core::{InferError, InferResult, ReplicaCounter};

use crate::output::AUTOMATON_FILE;
use crate::runtime::{ContainerRuntime, ContainerSpec};

/// What the fake learner container does when spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerScript {
    /// Writes the automaton into its mounted output directory.
    Succeed,
    /// Prints an error line to its log.
    Crash,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub containers: BTreeSet<String>,
    pub networks: BTreeMap<String, String>,
    pub images: BTreeSet<String>,
    pub calls: Vec<String>,
}

pub struct FakeRuntime {
    pub state: RefCell<FakeState>,
    /// When false, replica containers never appear.
    pub replicas_start: bool,
    pub learner: LearnerScript,
    /// Operations that fail: `"ps"`, `"rm"`, `"network rm"`, `"rmi"`.
    pub fail_on: BTreeSet<&'static str>,
}

impl FakeRuntime {
    pub fn new(learner: LearnerScript) -> Self {
        Self {
            state: RefCell::new(FakeState::default()),
            replicas_start: true,
            learner,
            fail_on: BTreeSet::new(),
        }
    }

    pub fn failing(mut self, operation: &'static str) -> Self {
        self.fail_on.insert(operation);
        self
    }

    pub fn with_containers(self, names: &[&str]) -> Self {
        self.state
            .borrow_mut()
            .containers
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn containers(&self) -> Vec<String> {
        self.state.borrow().containers.iter().cloned().collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    fn log(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }

    fn check(&self, operation: &str) -> InferResult<()> {
        if self.fail_on.contains(operation) {
            return Err(InferError::Runtime(format!("docker {operation} failed")));
        }
        Ok(())
    }
}

impl ReplicaCounter for FakeRuntime {
    fn container_count(&self) -> InferResult<usize> {
        Ok(self.state.borrow().containers.len())
    }
}

impl ContainerRuntime for FakeRuntime {
    fn container_names(&self) -> InferResult<Vec<String>> {
        self.check("ps")?;
        Ok(self.containers())
    }

    fn remove_containers(&self, names: &[String]) -> InferResult<()> {
        self.log(format!("rm {}", names.join(" ")));
        self.check("rm")?;
        let mut state = self.state.borrow_mut();
        for name in names {
            state.containers.remove(name);
        }
        Ok(())
    }

    fn network_exists(&self, name: &str) -> InferResult<bool> {
        Ok(self.state.borrow().networks.contains_key(name))
    }

    fn create_network(&self, name: &str, subnet: &str) -> InferResult<()> {
        self.log(format!("network create {name} {subnet}"));
        let mut state = self.state.borrow_mut();
        if state.networks.contains_key(name) {
            return Err(InferError::Runtime(format!("network {name} exists")));
        }
        state.networks.insert(name.into(), subnet.into());
        Ok(())
    }

    fn remove_network(&self, name: &str) -> InferResult<()> {
        self.log(format!("network rm {name}"));
        self.check("network rm")?;
        self.state.borrow_mut().networks.remove(name);
        Ok(())
    }

    fn build_image(
        &self,
        tag: &str,
        _context: &Path,
        _build_args: &[(String, String)],
    ) -> InferResult<()> {
        self.log(format!("build {tag}"));
        self.state.borrow_mut().images.insert(tag.into());
        Ok(())
    }

    fn remove_image(&self, reference: &str) -> InferResult<()> {
        self.log(format!("rmi {reference}"));
        self.check("rmi")?;
        self.state.borrow_mut().images.remove(reference);
        Ok(())
    }

    fn prune_dangling_images(&self) -> InferResult<()> {
        self.log("image prune".into());
        Ok(())
    }

    fn start_container(&self, spec: &ContainerSpec) -> InferResult<()> {
        self.log(format!("run {} {}", spec.name, spec.ip));
        if !self.state.borrow().networks.contains_key(&spec.network) {
            return Err(InferError::Runtime(format!("no network {}", spec.network)));
        }
        if self.replicas_start {
            self.state.borrow_mut().containers.insert(spec.name.clone());
        }
        Ok(())
    }

    fn spawn_logged(&self, spec: &ContainerSpec, mut log: File) -> InferResult<()> {
        self.log(format!("spawn {} {}", spec.name, spec.ip));
        self.state.borrow_mut().containers.insert(spec.name.clone());
        match self.learner {
            LearnerScript::Succeed => {
                writeln!(log, "# learning")?;
                if let Some((host, _)) = spec.volumes.first() {
                    std::fs::write(host.join(AUTOMATON_FILE), "digraph {}")?;
                }
            }
            LearnerScript::Crash => writeln!(log, "KeyError: 'Version'")?,
        }
        Ok(())
    }
}

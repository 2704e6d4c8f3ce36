//! Session lifecycle: network, replicas, learner, teardown.

use std::fs::File;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use infer_core::{InferError, InferResult, RunStatus, RunSummary, SessionLayout};
use infer_oracle::{ReadinessPolling, TargetPool};

use crate::lock::SessionLock;
use crate::output::OutputDir;
use crate::runtime::{ContainerRuntime, ContainerSpec};
use crate::supervisor::{RunOutcome, RunSupervisor, Supervision};

/// Placeholder in replica commands replaced by the replica's address.
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Server under test.
#[derive(Debug, Clone, Default)]
pub struct TargetPlan {
    pub image: String,
    /// Build the image from this directory before starting replicas.
    pub build_context: Option<PathBuf>,
    pub build_args: Vec<(String, String)>,
    /// Replica command; may contain [`ADDRESS_PLACEHOLDER`].
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LearnerPlan {
    pub image: String,
    pub build_context: Option<PathBuf>,
    pub command: Vec<String>,
    /// Where the output directory is mounted inside the learner container.
    pub mount_point: String,
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub target: TargetPlan,
    pub learner: LearnerPlan,
    pub output_dir: PathBuf,
    pub readiness: ReadinessPolling,
    pub supervision: Supervision,
    /// Directory of session lock files; no lock is taken when `None`.
    pub lock_dir: Option<PathBuf>,
    /// Resolved configuration copied into the output directory.
    pub configuration: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub containers_removed: usize,
    pub network_removed: bool,
    pub failures: usize,
}

pub struct SessionOrchestrator<R> {
    runtime: R,
    layout: SessionLayout,
}

impl<R: ContainerRuntime> SessionOrchestrator<R> {
    pub fn new(runtime: R, layout: SessionLayout) -> Self {
        Self { runtime, layout }
    }

    pub fn layout(&self) -> &SessionLayout {
        &self.layout
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Replace any stale network of this session with a fresh one.
    pub fn create_network(&self) -> InferResult<()> {
        let name = self.layout.network_name();
        match self.runtime.network_exists(&name) {
            Ok(true) => {
                if let Err(e) = self.runtime.remove_network(&name) {
                    warn!("cannot remove stale network {name}: {e}");
                }
            }
            Ok(false) => {}
            Err(e) => warn!("cannot inspect network {name}: {e}"),
        }
        self.runtime.create_network(&name, &self.layout.subnet())?;
        info!("created network {name} ({})", self.layout.subnet());
        Ok(())
    }

    /// Start every replica at its reserved address and wait until all of
    /// them are up.
    pub fn provision_replicas(
        &self,
        target: &TargetPlan,
        polling: &ReadinessPolling,
    ) -> InferResult<TargetPool> {
        if let Some(context) = &target.build_context {
            info!("building {} from {}", target.image, context.display());
            self.runtime
                .build_image(&target.image, context, &target.build_args)?;
        }

        let baseline = self.runtime.container_count()?;
        let network = self.layout.network_name();
        for index in 0..self.layout.replicas() {
            let ip = self.layout.replica_ip(index);
            let address = ip.to_string();
            let spec = ContainerSpec {
                name: self.layout.replica_container(index),
                image: target.image.clone(),
                network: network.clone(),
                ip,
                command: target
                    .command
                    .iter()
                    .map(|arg| arg.replace(ADDRESS_PLACEHOLDER, &address))
                    .collect(),
                env: vec![("TARGET_ADDRESS".into(), address)],
                volumes: vec![],
                restart_always: true,
            };
            self.runtime.start_container(&spec)?;
        }

        let pool = TargetPool::new(&self.layout);
        pool.wait_ready(&self.runtime, baseline, polling)?;
        Ok(pool)
    }

    /// Start the learner in the background, its output going to the
    /// session's learner log.
    pub fn launch_learner(&self, learner: &LearnerPlan, output: &OutputDir) -> InferResult<()> {
        let host_dir = output.prepare()?;
        let log = File::create(output.learner_log())?;
        let spec = ContainerSpec {
            name: self.layout.learner_container(),
            image: learner.image.clone(),
            network: self.layout.network_name(),
            ip: self.layout.learner_ip(),
            command: learner.command.clone(),
            env: vec![],
            volumes: vec![(host_dir, learner.mount_point.clone())],
            restart_always: false,
        };
        self.runtime.spawn_logged(&spec, log)?;
        info!("learner {} started", spec.name);
        Ok(())
    }

    /// Remove everything this session created. Never fails: problems are
    /// logged and counted in the report.
    pub fn teardown(&self, built_image: Option<&str>) -> TeardownReport {
        let mut report = TeardownReport::default();

        match self.runtime.container_names() {
            Ok(names) => {
                let owned: Vec<String> = names
                    .into_iter()
                    .filter(|n| self.layout.owns_container(n))
                    .collect();
                if !owned.is_empty() {
                    match self.runtime.remove_containers(&owned) {
                        Ok(()) => report.containers_removed = owned.len(),
                        Err(e) => {
                            warn!("cannot remove containers of session {}: {e}", self.layout.id());
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                warn!("cannot list containers: {e}");
                report.failures += 1;
            }
        }

        let network = self.layout.network_name();
        match self.runtime.network_exists(&network) {
            Ok(true) => match self.runtime.remove_network(&network) {
                Ok(()) => report.network_removed = true,
                Err(e) => {
                    warn!("cannot remove network {network}: {e}");
                    report.failures += 1;
                }
            },
            Ok(false) => {}
            Err(e) => {
                warn!("cannot inspect network {network}: {e}");
                report.failures += 1;
            }
        }

        if let Some(image) = built_image {
            if let Err(e) = self.runtime.prune_dangling_images() {
                warn!("cannot prune dangling images: {e}");
                report.failures += 1;
            }
            if let Err(e) = self.runtime.remove_image(image) {
                warn!("cannot remove image {image}: {e}");
                report.failures += 1;
            }
        }

        info!(
            "session {} torn down: {} containers, network removed: {}",
            self.layout.id(),
            report.containers_removed,
            report.network_removed
        );
        report
    }

    /// Run one whole inference session. Teardown runs on every path once
    /// provisioning has begun.
    /// Interrupting the process skips it; see [`RunSupervisor::watch`].
    pub fn run(&self, plan: &RunPlan) -> InferResult<RunSummary> {
        let output = OutputDir::new(&plan.output_dir);
        output.ensure_fresh()?;
        let _lock = match &plan.lock_dir {
            Some(dir) => Some(SessionLock::acquire(dir, self.layout.id())?),
            None => None,
        };
        output.prepare()?;
        if let Some(configuration) = &plan.configuration {
            output.write_configuration(configuration)?;
        }

        let started_at = Utc::now();
        let result = self.drive(plan, &output);

        let built_image = plan
            .target
            .build_context
            .as_ref()
            .map(|_| plan.target.image.as_str());
        self.teardown(built_image);

        let summary = RunSummary {
            session_id: self.layout.id(),
            target_image: plan.target.image.clone(),
            replicas: self.layout.replicas(),
            started_at,
            finished_at: Utc::now(),
            status: if result.is_ok() {
                RunStatus::Completed
            } else {
                RunStatus::Failed
            },
            failure: result.as_ref().err().map(ToString::to_string),
        };
        if let Err(e) = output.write_summary(&summary) {
            warn!("cannot write run summary: {e}");
        }
        result.map(|()| summary)
    }

    fn drive(&self, plan: &RunPlan, output: &OutputDir) -> InferResult<()> {
        self.create_network()?;
        self.provision_replicas(&plan.target, &plan.readiness)?;

        if let Some(context) = &plan.learner.build_context {
            if let Err(e) = self.runtime.remove_image(&plan.learner.image) {
                warn!("cannot remove old learner image: {e}");
            }
            self.runtime
                .build_image(&plan.learner.image, context, &[])?;
        }

        self.launch_learner(&plan.learner, output)?;
        let supervisor = RunSupervisor::new(
            output.automaton(),
            output.learner_log(),
            plan.supervision.clone(),
        );
        match supervisor.watch()? {
            RunOutcome::Completed => Ok(()),
            RunOutcome::Failed { line } => Err(InferError::LearningFailed(line)),
        }
    }
}

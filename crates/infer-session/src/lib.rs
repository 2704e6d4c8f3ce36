pub mod lock;
pub mod orchestrator;
pub mod output;
pub mod runtime;
pub mod supervisor;

#[cfg(test)]
mod testing;

pub use lock::SessionLock;
pub use orchestrator::{
    LearnerPlan, RunPlan, SessionOrchestrator, TargetPlan, TeardownReport, ADDRESS_PLACEHOLDER,
};
pub use output::OutputDir;
pub use runtime::{ContainerRuntime, ContainerSpec, DockerCli};
pub use supervisor::{first_failure_line, RunOutcome, RunSupervisor, Supervision};

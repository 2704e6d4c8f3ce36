use std::io::ErrorKind;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info};

use infer_core::InferResult;

/// Leading markers of learner log lines that are progress output, not errors.
pub const DEFAULT_BENIGN_PREFIXES: [&str; 4] = ["#", "[", "=", "1"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supervision {
    pub interval: Duration,
    pub benign_prefixes: Vec<String>,
}

impl Default for Supervision {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            benign_prefixes: DEFAULT_BENIGN_PREFIXES.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed { line: String },
}

/// Watches a running learner through its result artifact and its log.
///
/// There is no overall deadline: a learner that hangs without writing a
/// non-benign line is watched forever.
#[derive(Debug, Clone)]
pub struct RunSupervisor {
    artifact: PathBuf,
    log: PathBuf,
    settings: Supervision,
}

impl RunSupervisor {
    pub fn new(artifact: PathBuf, log: PathBuf, settings: Supervision) -> Self {
        Self {
            artifact,
            log,
            settings,
        }
    }

    /// One poll. `None` while the run is still going.
    pub fn check(&self) -> InferResult<Option<RunOutcome>> {
        if self.artifact.exists() {
            return Ok(Some(RunOutcome::Completed));
        }
        let content = match std::fs::read(&self.log) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(first_failure_line(&content, &self.settings.benign_prefixes)
            .map(|line| RunOutcome::Failed { line: line.to_string() }))
    }

    /// Poll until the artifact appears or the log shows a failure.
    ///
    /// There is no time bound: a learner that hangs silently is watched
    /// until the process is interrupted. An interrupted run leaves its
    /// containers, network and session lock behind; `fsm-infer teardown -i
    /// <id>` removes them.
    pub fn watch(&self) -> InferResult<RunOutcome> {
        info!(
            "watching {} (log {})",
            self.artifact.display(),
            self.log.display()
        );
        loop {
            match self.check()? {
                Some(RunOutcome::Completed) => {
                    info!("learner produced {}", self.artifact.display());
                    return Ok(RunOutcome::Completed);
                }
                Some(RunOutcome::Failed { line }) => {
                    error!("learner failed: {line}");
                    return Ok(RunOutcome::Failed { line });
                }
                None => {
                    debug!("learner still running");
                    thread::sleep(self.settings.interval);
                }
            }
        }
    }
}

/// First non-blank line that does not start with one of `benign` prefixes.
pub fn first_failure_line<'a>(content: &'a str, benign: &[String]) -> Option<&'a str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .find(|line| !benign.iter().any(|p| line.starts_with(p.as_str())))
}

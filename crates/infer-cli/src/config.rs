//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `-f <path>` on the command line
//! 2. `$FSM_INFER_CONFIG` environment variable
//! 3. `<platform config dir>/config.toml`
//! 4. Built-in defaults (everything is optional)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use infer_core::{InferError, InferResult, SessionLayout};
use infer_oracle::ReadinessPolling;
use infer_session::Supervision;

/// Top-level configuration.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub session: SessionConfig,
    pub target: TargetConfig,
    pub learner: LearnerConfig,
    pub polling: PollingConfig,
    pub supervisor: SupervisorConfig,
}

/// Session identity and output placement.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Distinct per concurrently running session; selects the address range.
    pub id: u8,
    /// Two leading octets of the session subnets.
    pub network_base: String,
    /// Default: `result/<implementation>.<version>mode_<mode>`.
    pub output_dir: Option<String>,
}

/// Server under test.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub implementation: String,
    pub version: String,
    /// Image tag. Default: `inferer_<implementation>:<version>`.
    pub image: Option<String>,
    /// Dockerfile directory; the image is used as-is when unset.
    pub build_context: Option<String>,
    pub replicas: usize,
    pub port: u16,
    pub reset_port: u16,
    /// Whether replicas accept reset signals on `reset_port`.
    pub reset_capable: bool,
    /// Replica command; `{address}` is replaced by the replica address.
    pub command: Vec<String>,
}

/// Learner container settings.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub image: String,
    pub build_context: Option<String>,
    pub entrypoint: String,
    pub vocabulary: Vec<String>,
    /// Security mode: 1 none, 2 sign, 3 sign and encrypt.
    pub mode: u8,
    /// Protocol socket timeout.
    pub timeout_ms: u64,
    /// Reset the queried replica after every query.
    pub restart_server: bool,
    pub mount_point: String,
    /// Extra `--key value` learner arguments (target node, value type...).
    pub args: BTreeMap<String, String>,
}

/// Polling intervals.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub ready_interval_ms: u64,
    pub ready_timeout_secs: u64,
    /// Settle delay after a freshly built target comes up.
    pub settle_secs: u64,
    /// Settle delay when an existing target image is reused.
    pub reuse_settle_secs: u64,
    pub supervise_interval_secs: u64,
}

/// Learner log scanning.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Log lines starting with one of these are progress output.
    pub benign_prefixes: Vec<String>,
}

// --- Defaults ---

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            id: 0,
            network_base: "192.123".into(),
            output_dir: None,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            implementation: "asyncua".into(),
            version: "latest".into(),
            image: None,
            build_context: None,
            replicas: 1,
            port: infer_core::layout::DEFAULT_SERVICE_PORT,
            reset_port: infer_core::layout::DEFAULT_RESET_PORT,
            reset_capable: false,
            command: Vec::new(),
        }
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            image: "learner:latest".into(),
            build_context: None,
            entrypoint: "./learner".into(),
            vocabulary: Vec::new(),
            mode: 1,
            timeout_ms: 1000,
            restart_server: false,
            mount_point: "/learner/result".into(),
            args: BTreeMap::new(),
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            ready_interval_ms: 100,
            ready_timeout_secs: 300,
            settle_secs: 30,
            reuse_settle_secs: 5,
            supervise_interval_secs: 10,
        }
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            benign_prefixes: Supervision::default().benign_prefixes,
        }
    }
}

// --- Derived values ---

impl Config {
    pub fn validate(&self) -> InferResult<()> {
        if self.learner.vocabulary.is_empty() {
            return Err(InferError::Config("learner.vocabulary is empty".into()));
        }
        if self.learner.restart_server && !self.target.reset_capable {
            return Err(InferError::Config(format!(
                "restart_server needs a reset side channel, but target {} is not reset_capable",
                self.target.implementation
            )));
        }
        self.layout().map(|_| ())
    }

    pub fn layout(&self) -> InferResult<SessionLayout> {
        Ok(SessionLayout::new(
            self.session.id,
            &self.session.network_base,
            self.target.replicas,
        )?
        .with_ports(self.target.port, self.target.reset_port))
    }

    pub fn target_image(&self) -> String {
        self.target.image.clone().unwrap_or_else(|| {
            format!(
                "inferer_{}:{}",
                self.target.implementation, self.target.version
            )
        })
    }

    pub fn output_dir(&self) -> PathBuf {
        match &self.session.output_dir {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from("result").join(format!(
                "{}.{}mode_{}",
                self.target.implementation, self.target.version, self.learner.mode
            )),
        }
    }

    /// Learner command line, run inside the learner container.
    pub fn learner_command(&self) -> Vec<String> {
        let learner = &self.learner;
        let mut cmd = vec![
            learner.entrypoint.clone(),
            "-o".into(),
            learner.mount_point.clone(),
            "--voc".into(),
            learner.vocabulary.join(","),
            "-m".into(),
            learner.mode.to_string(),
            "--nb_target".into(),
            self.target.replicas.to_string(),
            "-t".into(),
            learner.timeout_ms.to_string(),
        ];
        if learner.restart_server {
            cmd.push("--restart-server".into());
        }
        cmd.extend(["--inference-id".into(), self.session.id.to_string()]);
        for (key, value) in &learner.args {
            cmd.extend([format!("--{key}"), value.clone()]);
        }
        cmd
    }

    pub fn readiness(&self, fresh_build: bool) -> ReadinessPolling {
        let p = &self.polling;
        ReadinessPolling {
            interval: Duration::from_millis(p.ready_interval_ms),
            timeout: Duration::from_secs(p.ready_timeout_secs),
            settle: Duration::from_secs(if fresh_build {
                p.settle_secs
            } else {
                p.reuse_settle_secs
            }),
        }
    }

    pub fn supervision(&self) -> Supervision {
        Supervision {
            interval: Duration::from_secs(self.polling.supervise_interval_secs),
            benign_prefixes: self.supervisor.benign_prefixes.clone(),
        }
    }
}

/// Load config from disk. Returns defaults if no config file exists and
/// none was named explicitly.
pub fn load_config(explicit: Option<&Path>) -> InferResult<Config> {
    if let Some(p) = explicit {
        return read_config(p);
    }
    match config_path() {
        Some(p) if p.exists() => read_config(&p),
        _ => Ok(Config::default()),
    }
}

pub fn read_config(path: &Path) -> InferResult<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| InferError::Config(format!("reading {}: {e}", path.display())))?;
    toml::from_str(&content)
        .map_err(|e| InferError::Config(format!("parsing {}: {e}", path.display())))
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    // 1. Environment variable
    if let Ok(p) = std::env::var("FSM_INFER_CONFIG") {
        return Some(PathBuf::from(p));
    }

    // 2. Platform config dir
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "fsm-infer", "fsm-infer")
}

/// Where session lock files live.
pub fn lock_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("sessions"))
        .unwrap_or_else(|| PathBuf::from(".fsm-infer").join("sessions"))
}

/// Show the active config path (for `fsm-infer config`).
pub fn show_config_path(explicit: Option<&Path>) -> String {
    if let Some(p) = explicit {
        return format!("{} (explicit)", p.display());
    }
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}

/// Annotated example printed by `fsm-infer template`.
pub const EXAMPLE_CONFIG: &str = r#"# fsm-infer session configuration

[session]
# Distinct id per session running at the same time (0-255).
id = 0
network_base = "192.123"
# output_dir = "result/asyncua.v1.0.0mode_3"

[target]
# Name of the implementation under test and its tag or commit.
implementation = "asyncua"
version = "v1.0.0"
# Directory holding the target Dockerfile (built with --build-arg VersionSUT=<version>).
build_context = "target/server/secure/asyncua"
# Number of replica containers.
replicas = 4
port = 4840
reset_port = 5555
# Set when the target accepts reset signals on reset_port.
reset_capable = false

[learner]
image = "learner:latest"
build_context = "learner"
entrypoint = "./learner"
# Vocabulary of the inference.
vocabulary = ["hello", "open_secure_channel_request", "create_session", "active_session", "read_req"]
# Encryption mode: 1 nothing, 2 signature, 3 signature + encryption.
mode = 3
# Socket timeout in milliseconds.
timeout_ms = 1000
restart_server = false

[learner.args]
# Node used by read and write requests.
node = "2"
ns = "0"
idtype = "NodeIdNumeric"
value = "42"
valtype = "int32"

[polling]
ready_interval_ms = 100
ready_timeout_secs = 300
settle_secs = 30
reuse_settle_secs = 5
supervise_interval_secs = 10
"#;

use std::fs::File;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use infer_core::{InferError, InferResult, ReplicaCounter};

/// One container to start on a session network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub network: String,
    pub ip: Ipv4Addr,
    /// Overrides the image command when non-empty.
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    /// `(host path, container path)` bind mounts.
    pub volumes: Vec<(PathBuf, String)>,
    pub restart_always: bool,
}

/// Container engine operations a session needs. All removals are idempotent:
/// removing something that does not exist succeeds.
pub trait ContainerRuntime: ReplicaCounter {
    /// Names of all containers, running or not.
    fn container_names(&self) -> InferResult<Vec<String>>;
    fn remove_containers(&self, names: &[String]) -> InferResult<()>;

    fn network_exists(&self, name: &str) -> InferResult<bool>;
    fn create_network(&self, name: &str, subnet: &str) -> InferResult<()>;
    fn remove_network(&self, name: &str) -> InferResult<()>;

    fn build_image(&self, tag: &str, context: &Path, build_args: &[(String, String)])
        -> InferResult<()>;
    fn remove_image(&self, reference: &str) -> InferResult<()>;
    fn prune_dangling_images(&self) -> InferResult<()>;

    /// Start a detached container.
    fn start_container(&self, spec: &ContainerSpec) -> InferResult<()>;
    /// Start a container in the background with its combined output
    /// appended to `log`. Does not wait for it to exit.
    fn spawn_logged(&self, spec: &ContainerSpec, log: File) -> InferResult<()>;
}

/// [`ContainerRuntime`] backed by the `docker` command line.
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".into(),
        }
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[String]) -> InferResult<String> {
        debug!("{} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| InferError::Runtime(format!("cannot run {}: {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InferError::Runtime(format!(
                "{} {} failed: {}",
                self.program,
                args.first().map(String::as_str).unwrap_or(""),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn lines(output: &str) -> Vec<String> {
        output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()
    }
}

fn run_args(spec: &ContainerSpec, detach: bool) -> Vec<String> {
    let mut args = vec!["run".to_string()];
    if detach {
        args.push("-d".into());
    }
    args.extend(["--name".into(), spec.name.clone()]);
    if spec.restart_always {
        args.extend(["--restart".into(), "always".into()]);
    }
    args.extend([
        "--network".into(),
        spec.network.clone(),
        "--ip".into(),
        spec.ip.to_string(),
    ]);
    for (key, value) in &spec.env {
        args.extend(["-e".into(), format!("{key}={value}")]);
    }
    for (host, container) in &spec.volumes {
        args.extend(["-v".into(), format!("{}:{container}", host.display())]);
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

impl ReplicaCounter for DockerCli {
    fn container_count(&self) -> InferResult<usize> {
        let out = self.run(&["ps".into(), "-a".into(), "-q".into()])?;
        Ok(Self::lines(&out).len())
    }
}

impl ContainerRuntime for DockerCli {
    fn container_names(&self) -> InferResult<Vec<String>> {
        let out = self.run(&[
            "ps".into(),
            "-a".into(),
            "--format".into(),
            "{{.Names}}".into(),
        ])?;
        Ok(Self::lines(&out))
    }

    fn remove_containers(&self, names: &[String]) -> InferResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        let mut args = vec!["rm".to_string(), "-f".to_string()];
        args.extend(names.iter().cloned());
        self.run(&args).map(|_| ())
    }

    fn network_exists(&self, name: &str) -> InferResult<bool> {
        let out = self.run(&[
            "network".into(),
            "ls".into(),
            "--format".into(),
            "{{.Name}}".into(),
        ])?;
        Ok(Self::lines(&out).iter().any(|n| n == name))
    }

    fn create_network(&self, name: &str, subnet: &str) -> InferResult<()> {
        self.run(&[
            "network".into(),
            "create".into(),
            "--subnet".into(),
            subnet.into(),
            name.into(),
        ])
        .map(|_| ())
    }

    fn remove_network(&self, name: &str) -> InferResult<()> {
        if !self.network_exists(name)? {
            return Ok(());
        }
        self.run(&["network".into(), "rm".into(), name.into()])
            .map(|_| ())
    }

    fn build_image(
        &self,
        tag: &str,
        context: &Path,
        build_args: &[(String, String)],
    ) -> InferResult<()> {
        let mut args = vec!["build".to_string()];
        for (key, value) in build_args {
            args.extend(["--build-arg".into(), format!("{key}={value}")]);
        }
        args.extend(["-t".into(), tag.into(), context.display().to_string()]);
        self.run(&args).map(|_| ())
    }

    fn remove_image(&self, reference: &str) -> InferResult<()> {
        let out = self.run(&[
            "images".into(),
            "-q".into(),
            "-f".into(),
            format!("reference={reference}"),
        ])?;
        let ids = Self::lines(&out);
        if ids.is_empty() {
            return Ok(());
        }
        let mut args = vec!["rmi".to_string(), "-f".to_string()];
        args.extend(ids);
        self.run(&args).map(|_| ())
    }

    fn prune_dangling_images(&self) -> InferResult<()> {
        self.run(&["image".into(), "prune".into(), "-f".into()])
            .map(|_| ())
    }

    fn start_container(&self, spec: &ContainerSpec) -> InferResult<()> {
        self.run(&run_args(spec, true)).map(|_| ())
    }

    fn spawn_logged(&self, spec: &ContainerSpec, log: File) -> InferResult<()> {
        let args = run_args(spec, false);
        debug!("{} {}", self.program, args.join(" "));
        let stderr = log.try_clone()?;
        Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(stderr)
            .spawn()
            .map_err(|e| InferError::Runtime(format!("cannot start {}: {e}", spec.name)))?;
        Ok(())
    }
}

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::backend::{ContainerBackend, OutputSink};
use crate::docker::args;
use crate::docker::auth::{registry_host, RegistryAuth};
use crate::docker::DockerConfig;
use crate::error::{ExecError, ExecResult};
use crate::spec::ContainerSpec;

/// [`ContainerBackend`] implementation that drives the docker binary.
pub struct DockerCli {
    config: DockerConfig,
}

impl DockerCli {
    pub fn new(config: DockerConfig) -> Self {
        Self { config }
    }

    async fn docker(&self, args: &[String]) -> ExecResult<String> {
        trace!(args = %args.join(" "), "docker");
        let output = Command::new(&self.config.docker_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(ExecError::CommandFailed {
                command: format!("docker {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    /// Pre-flight reachability check; returns the engine's server version.
    pub async fn ping(&self) -> ExecResult<String> {
        let version = self
            .docker(&[
                "version".to_string(),
                "--format".to_string(),
                "{{.Server.Version}}".to_string(),
            ])
            .await?;
        Ok(version.trim().to_string())
    }

    /// `docker login` with the decoded credentials, password over stdin.
    async fn login(&self, auth: &RegistryAuth, registry: Option<&str>) -> ExecResult<()> {
        let mut cmd = Command::new(&self.config.docker_path);
        cmd.args(["login", "--username", &auth.username, "--password-stdin"]);
        if let Some(host) = registry {
            cmd.arg(host);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(auth.password.as_bytes()).await?;
        }
        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ExecError::Auth(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        debug!(registry = ?registry, "docker login succeeded");
        Ok(())
    }
}

#[async_trait]
impl ContainerBackend for DockerCli {
    async fn pull(&self, image: &str) -> ExecResult<()> {
        self.docker(&["pull".to_string(), image.to_string()]).await?;
        Ok(())
    }

    async fn pull_authenticated(&self, image: &str, auth: &str) -> ExecResult<()> {
        let credentials = RegistryAuth::parse(auth)?;
        self.login(&credentials, registry_host(image)).await?;
        self.pull(image).await
    }

    async fn create_volume(&self, name: &str, device: &Path) -> ExecResult<()> {
        if self.volume_exists(name).await? {
            debug!(volume = name, "volume already exists");
            return Ok(());
        }
        tokio::fs::create_dir_all(device).await?;
        self.docker(&args::volume_create_args(name, device)).await?;
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> ExecResult<bool> {
        let output = Command::new(&self.config.docker_path)
            .args(["volume", "inspect", name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        Ok(output.success())
    }

    async fn remove_volume(&self, name: &str) -> ExecResult<()> {
        self.docker(&[
            "volume".to_string(),
            "rm".to_string(),
            "--force".to_string(),
            name.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> ExecResult<String> {
        let stdout = self.docker(&args::create_args(spec)).await?;
        let id = stdout
            .lines()
            .last()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ExecError::UnexpectedOutput("docker create printed no id".into()))?;
        debug!(container = id, name = %spec.name, "created container");
        Ok(id.to_string())
    }

    async fn run_attached(
        &self,
        id: &str,
        mut stdout: OutputSink,
        mut stderr: OutputSink,
    ) -> ExecResult<i64> {
        let mut child = Command::new(&self.config.docker_path)
            .args(["start", "--attach", id])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut child_stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::UnexpectedOutput("attach gave no stdout".into()))?;
        let mut child_stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::UnexpectedOutput("attach gave no stderr".into()))?;

        let out_copier = tokio::spawn(async move {
            if let Err(e) = tokio::io::copy(&mut child_stdout, &mut stdout).await {
                warn!("stdout copier stopped: {e}");
            }
            let _ = stdout.shutdown().await;
        });
        let err_copier = tokio::spawn(async move {
            if let Err(e) = tokio::io::copy(&mut child_stderr, &mut stderr).await {
                warn!("stderr copier stopped: {e}");
            }
            let _ = stderr.shutdown().await;
        });

        let attach_status = child.wait().await?;
        let _ = out_copier.await;
        let _ = err_copier.await;
        trace!(container = id, status = ?attach_status.code(), "attach finished");

        // The engine is authoritative for the container's exit code; the
        // attach process can be torn down early when the container is
        // force-removed.
        let stdout = self
            .docker(&["wait".to_string(), id.to_string()])
            .await?;
        stdout
            .trim()
            .parse::<i64>()
            .map_err(|_| ExecError::UnexpectedOutput(format!("docker wait printed {stdout:?}")))
    }

    async fn list_by_label(&self, key: &str, value: &str, all: bool) -> ExecResult<Vec<String>> {
        let stdout = self.docker(&args::list_by_label_args(key, value, all)).await?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    async fn remove_container(&self, id: &str) -> ExecResult<()> {
        self.docker(&[
            "rm".to_string(),
            "--force".to_string(),
            "--volumes".to_string(),
            id.to_string(),
        ])
        .await?;
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> ExecResult<()> {
        self.docker(&["rmi".to_string(), "--force".to_string(), image.to_string()])
            .await?;
        Ok(())
    }
}

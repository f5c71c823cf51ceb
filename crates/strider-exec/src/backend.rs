use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::ExecResult;
use crate::spec::ContainerSpec;

/// Byte sink a container's stdout or stderr stream is copied into.
pub type OutputSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Operations the runner needs from a container engine.
///
/// Every operation is a single engine round-trip; sequencing, cancellation,
/// and retries are the caller's concern. Production uses
/// [`crate::docker::DockerCli`]; tests substitute recording stubs.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Pull an image by reference (`name` or `name:tag`).
    async fn pull(&self, image: &str) -> ExecResult<()>;

    /// Pull an image that requires registry authentication. `auth` is the
    /// base64-encoded JSON credentials blob carried by the job.
    async fn pull_authenticated(&self, image: &str, auth: &str) -> ExecResult<()>;

    /// Create a named volume backed by the given host directory. Tolerates
    /// a volume that already exists under the same name.
    async fn create_volume(&self, name: &str, device: &Path) -> ExecResult<()>;

    /// Whether a volume with this name exists.
    async fn volume_exists(&self, name: &str) -> ExecResult<bool>;

    /// Remove a volume by name.
    async fn remove_volume(&self, name: &str) -> ExecResult<()>;

    /// Create a container; returns the engine's container id.
    async fn create_container(&self, spec: &ContainerSpec) -> ExecResult<String>;

    /// Start a created container, stream its stdout/stderr into the sinks,
    /// and wait for it to exit. Returns the container's exit code.
    async fn run_attached(
        &self,
        id: &str,
        stdout: OutputSink,
        stderr: OutputSink,
    ) -> ExecResult<i64>;

    /// Ids of containers carrying `key=value`. `all` includes stopped ones.
    async fn list_by_label(&self, key: &str, value: &str, all: bool) -> ExecResult<Vec<String>>;

    /// Force-remove a container and its anonymous volumes.
    async fn remove_container(&self, id: &str) -> ExecResult<()>;

    /// Force-remove an image by reference.
    async fn remove_image(&self, image: &str) -> ExecResult<()>;
}

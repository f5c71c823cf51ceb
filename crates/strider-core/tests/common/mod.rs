//! Recording doubles for the container backend and the bus, plus the wiring
//! that stands a whole invocation up in-process.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use strider_bus::{BusResult, JobUpdatePublisher, StatusPublisher, UpdateMessage};
use strider_core::{Event, LifecycleController, PipelineExecutor, TimeLimitResponder, Workspace};
use strider_exec::{ContainerBackend, ContainerSpec, ExecError, ExecResult, OutputSink, PorklockConfig};
use strider_model::{Env, Job, JobState};

/// Scripted behavior for the recording backend.
#[derive(Default, Clone)]
pub struct Behavior {
    /// Image reference whose pull fails.
    pub fail_pull: Option<String>,
    /// Container-name prefix -> exit code returned by `run_attached`.
    pub exit_codes: Vec<(String, i64)>,
    /// Container-name prefixes whose run blocks until the container is
    /// force-removed.
    pub block_prefixes: Vec<String>,
}

#[derive(Default)]
struct BackendState {
    containers: HashMap<String, ContainerSpec>,
    created_specs: Vec<ContainerSpec>,
    volumes: Vec<String>,
    images: Vec<String>,
    ops: Vec<String>,
    next_id: u64,
}

/// In-memory engine double that records every operation.
#[derive(Default)]
pub struct RecordingBackend {
    behavior: Behavior,
    state: Mutex<BackendState>,
}

impl RecordingBackend {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            state: Mutex::default(),
        }
    }

    pub fn ops(&self) -> Vec<String> {
        self.state.lock().unwrap().ops.clone()
    }

    pub fn containers(&self) -> Vec<ContainerSpec> {
        self.state
            .lock()
            .unwrap()
            .containers
            .values()
            .cloned()
            .collect()
    }

    pub fn volumes(&self) -> Vec<String> {
        self.state.lock().unwrap().volumes.clone()
    }

    pub fn images(&self) -> Vec<String> {
        self.state.lock().unwrap().images.clone()
    }

    /// Specs of every container ever created, in creation order.
    pub fn created_specs(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().created_specs.clone()
    }

    /// Seed a container directly, bypassing the pipeline.
    pub fn seed_container(&self, spec: ContainerSpec) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state.containers.insert(id, spec);
    }

    /// Seed a volume directly.
    pub fn seed_volume(&self, name: &str) {
        self.state.lock().unwrap().volumes.push(name.to_string());
    }

    fn contains_container(&self, id: &str) -> bool {
        self.state.lock().unwrap().containers.contains_key(id)
    }
}

#[async_trait]
impl ContainerBackend for RecordingBackend {
    async fn pull(&self, image: &str) -> ExecResult<()> {
        if self.behavior.fail_pull.as_deref() == Some(image) {
            return Err(ExecError::CommandFailed {
                command: format!("docker pull {image}"),
                stderr: "manifest unknown".into(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("pull {image}"));
        if !state.images.contains(&image.to_string()) {
            state.images.push(image.to_string());
        }
        Ok(())
    }

    async fn pull_authenticated(&self, image: &str, _auth: &str) -> ExecResult<()> {
        self.pull(image).await
    }

    async fn create_volume(&self, name: &str, _device: &std::path::Path) -> ExecResult<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("volume create {name}"));
        if !state.volumes.contains(&name.to_string()) {
            state.volumes.push(name.to_string());
        }
        Ok(())
    }

    async fn volume_exists(&self, name: &str) -> ExecResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .volumes
            .contains(&name.to_string()))
    }

    async fn remove_volume(&self, name: &str) -> ExecResult<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("volume rm {name}"));
        state.volumes.retain(|v| v != name);
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> ExecResult<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state.ops.push(format!("create {}", spec.name));
        state.containers.insert(id.clone(), spec.clone());
        state.created_specs.push(spec.clone());
        Ok(id)
    }

    async fn run_attached(
        &self,
        id: &str,
        _stdout: OutputSink,
        _stderr: OutputSink,
    ) -> ExecResult<i64> {
        let name = {
            let state = self.state.lock().unwrap();
            match state.containers.get(id) {
                Some(spec) => spec.name.clone(),
                None => {
                    return Err(ExecError::CommandFailed {
                        command: format!("docker start --attach {id}"),
                        stderr: "No such container".into(),
                    })
                }
            }
        };

        if self
            .behavior
            .block_prefixes
            .iter()
            .any(|p| name.starts_with(p.as_str()))
        {
            // Behaves like a long-running container: only a force-remove
            // gets us out of here.
            loop {
                tokio::time::sleep(Duration::from_millis(20)).await;
                if !self.contains_container(id) {
                    return Err(ExecError::CommandFailed {
                        command: format!("docker wait {id}"),
                        stderr: "No such container".into(),
                    });
                }
            }
        }

        let exit = self
            .behavior
            .exit_codes
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);
        Ok(exit)
    }

    async fn list_by_label(&self, key: &str, value: &str, _all: bool) -> ExecResult<Vec<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .containers
            .iter()
            .filter(|(_, spec)| spec.labels.get(key) == Some(value))
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn remove_container(&self, id: &str) -> ExecResult<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("rm {id}"));
        if state.containers.remove(id).is_none() {
            return Err(ExecError::CommandFailed {
                command: format!("docker rm {id}"),
                stderr: "No such container".into(),
            });
        }
        Ok(())
    }

    async fn remove_image(&self, image: &str) -> ExecResult<()> {
        let mut state = self.state.lock().unwrap();
        state.ops.push(format!("rmi {image}"));
        state.images.retain(|i| i != image);
        Ok(())
    }
}

/// Publisher double that records every update.
#[derive(Default)]
pub struct RecordingPublisher {
    updates: Mutex<Vec<UpdateMessage>>,
}

impl RecordingPublisher {
    pub fn updates(&self) -> Vec<UpdateMessage> {
        self.updates.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<JobState> {
        self.updates().iter().map(|u| u.state).collect()
    }

    /// Updates with `State` in `{Failed, Succeeded}`.
    pub fn terminal_updates(&self) -> Vec<UpdateMessage> {
        self.updates()
            .into_iter()
            .filter(|u| matches!(u.state, JobState::Failed | JobState::Succeeded))
            .collect()
    }

    pub fn has_update_containing(&self, needle: &str) -> bool {
        self.updates().iter().any(|u| u.message.contains(needle))
    }
}

#[async_trait]
impl JobUpdatePublisher for RecordingPublisher {
    async fn publish_job_update(&self, update: UpdateMessage) -> BusResult<()> {
        self.updates.lock().unwrap().push(update);
        Ok(())
    }
}

/// Responder double that records time-limit replies.
#[derive(Default)]
pub struct RecordingResponder {
    replies: Mutex<Vec<i64>>,
}

impl RecordingResponder {
    pub fn replies(&self) -> Vec<i64> {
        self.replies.lock().unwrap().clone()
    }
}

#[async_trait]
impl TimeLimitResponder for RecordingResponder {
    async fn reply(&self, _invocation_id: &str, milliseconds_remaining: i64) {
        self.replies.lock().unwrap().push(milliseconds_remaining);
    }
}

/// A fully wired invocation running against the recording doubles.
pub struct RunningJob {
    pub handle: JoinHandle<i32>,
    pub events: UnboundedSender<Event>,
    pub backend: Arc<RecordingBackend>,
    pub publisher: Arc<RecordingPublisher>,
    pub responder: Arc<RecordingResponder>,
    pub quit: CancellationToken,
    _workdir: tempfile::TempDir,
}

impl RunningJob {
    pub async fn wait(self) -> i32 {
        self.handle.await.expect("controller task panicked")
    }
}

/// Wire a job to a controller + executor pair the same way the binary does.
pub fn spawn_job(job: Job, backend: Arc<RecordingBackend>) -> RunningJob {
    let job = Arc::new(job);
    let publisher = Arc::new(RecordingPublisher::default());
    let responder = Arc::new(RecordingResponder::default());
    let quit = CancellationToken::new();

    let workdir = tempfile::tempdir().expect("failed to create workdir");
    let workspace = Workspace::new(workdir.path());
    workspace
        .init(&workdir.path().join("docker-compose.yml"))
        .expect("failed to init workspace");

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (phases_tx, phases_rx) = mpsc::unbounded_channel();

    let status = StatusPublisher::new(publisher.clone(), job.clone());
    let executor = PipelineExecutor::new(
        job.clone(),
        backend.clone(),
        status.clone(),
        PorklockConfig {
            image: "discoenv/porklock".into(),
            tag: "latest".into(),
        },
        Env::new(),
        workspace,
        phases_rx,
        events_tx.clone(),
    );
    tokio::spawn(executor.run());

    let controller = LifecycleController::new(
        job,
        backend.clone(),
        status,
        responder.clone(),
        events_rx,
        events_tx.clone(),
        phases_tx,
        quit.clone(),
    );
    let handle = tokio::spawn(controller.run());

    RunningJob {
        handle,
        events: events_tx,
        backend,
        publisher,
        responder,
        quit,
        _workdir: workdir,
    }
}

/// Poll until `pred` holds for the publisher or the timeout passes.
pub async fn wait_for<F>(pred: F, timeout: Duration) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if pred() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pred()
}

/// Test fixture: a job with `steps` simple echo steps.
pub fn echo_job(steps: usize) -> Job {
    use strider_model::{Container, ContainerImage, Step};
    use uuid::Uuid;

    let step = Step {
        executable: "/bin/echo".into(),
        container: Container {
            image: ContainerImage {
                name: "discoenv/echo".into(),
                tag: "latest".into(),
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    };
    Job {
        invocation_id: Uuid::new_v4(),
        submitter: "tester".into(),
        output_directory: "/iplant/home/tester/out".into(),
        steps: std::iter::repeat_with(|| step.clone()).take(steps).collect(),
        ..Default::default()
    }
}

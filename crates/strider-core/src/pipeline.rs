use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use strider_bus::StatusPublisher;
use strider_exec::{
    ContainerBackend, ContainerSpec, ExecError, ExecResult, OutputSink, PorklockConfig,
};
use strider_model::{Env, Job, StatusCode};

use crate::events::{Event, Phase, PhaseCommand};
use crate::fs::Workspace;

/// Executes pipeline phases against the container backend.
///
/// Runs as its own task: the controller dispatches one [`PhaseCommand`] at a
/// time and receives exactly one `PhaseDone` per command. Entities inside a
/// phase (images, inputs) are processed strictly sequentially.
pub struct PipelineExecutor {
    job: Arc<Job>,
    backend: Arc<dyn ContainerBackend>,
    status: StatusPublisher,
    porklock: PorklockConfig,
    transfer_env: Env,
    workspace: Workspace,
    /// Data-container name -> engine id, populated in the create phase and
    /// consulted when steps mount from them.
    data_containers: HashMap<String, String>,
    commands: UnboundedReceiver<PhaseCommand>,
    events: UnboundedSender<Event>,
}

impl PipelineExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job: Arc<Job>,
        backend: Arc<dyn ContainerBackend>,
        status: StatusPublisher,
        porklock: PorklockConfig,
        transfer_env: Env,
        workspace: Workspace,
        commands: UnboundedReceiver<PhaseCommand>,
        events: UnboundedSender<Event>,
    ) -> Self {
        Self {
            job,
            backend,
            status,
            porklock,
            transfer_env,
            workspace,
            data_containers: HashMap::new(),
            commands,
            events,
        }
    }

    /// Serve phase commands until the controller hangs up.
    pub async fn run(mut self) {
        while let Some(cmd) = self.commands.recv().await {
            let status = self.execute(&cmd).await;
            if self
                .events
                .send(Event::PhaseDone {
                    phase: cmd.phase,
                    status,
                })
                .is_err()
            {
                break;
            }
        }
        debug!("pipeline executor finished");
    }

    async fn execute(&mut self, cmd: &PhaseCommand) -> StatusCode {
        match cmd.phase {
            Phase::PullImages => self.pull_images(&cmd.cancel).await,
            Phase::CreateDataContainers => self.create_data_containers(&cmd.cancel).await,
            Phase::CreateWorkingVolume => self.create_working_volume().await,
            Phase::StageInputs => self.stage_inputs(&cmd.cancel).await,
            Phase::RunStep(index) => self.run_step(index, &cmd.cancel).await,
            Phase::UploadOutputs => self.upload_outputs(&cmd.cancel).await,
        }
    }

    async fn pull_images(&self, cancel: &CancellationToken) -> StatusCode {
        for image in self.job.container_images() {
            if cancel.is_cancelled() {
                return StatusCode::DockerPullFailed;
            }
            let reference = image.reference();
            self.status.running(format!("Pulling {reference}")).await;

            let result = match &image.auth {
                Some(auth) => self.backend.pull_authenticated(&reference, auth).await,
                None => self.backend.pull(&reference).await,
            };
            if let Err(e) = result {
                self.status
                    .running(format!("Error pulling {reference}: {e}"))
                    .await;
                return StatusCode::DockerPullFailed;
            }
            self.status
                .running(format!("Done pulling {reference}"))
                .await;
        }

        // The transfer tool has to be present before inputs are staged.
        let porklock = self.porklock.reference();
        if let Err(e) = self.backend.pull(&porklock).await {
            self.status
                .running(format!("Error pulling {porklock}: {e}"))
                .await;
            return StatusCode::DockerPullFailed;
        }

        StatusCode::Success
    }

    async fn create_data_containers(&mut self, cancel: &CancellationToken) -> StatusCode {
        let invocation = self.job.invocation();
        let declarations: Vec<_> = self
            .job
            .data_containers()
            .into_iter()
            .cloned()
            .collect();

        for vf in &declarations {
            if cancel.is_cancelled() {
                return StatusCode::DockerCreateFailed;
            }
            let name = vf.container_name(&invocation);
            self.status
                .running(format!("creating data container {name}"))
                .await;

            match self
                .backend
                .create_container(&ContainerSpec::for_data(vf, &invocation))
                .await
            {
                Ok(id) => {
                    self.data_containers.insert(name.clone(), id);
                    self.status
                        .running(format!("finished creating data container {name}"))
                        .await;
                }
                Err(e) => {
                    self.status
                        .running(format!("error creating data container {name}: {e}"))
                        .await;
                    return StatusCode::DockerCreateFailed;
                }
            }
        }

        StatusCode::Success
    }

    async fn create_working_volume(&self) -> StatusCode {
        let invocation = self.job.invocation();
        self.status
            .running(format!("creating working volume {invocation}"))
            .await;

        if let Err(e) = self
            .backend
            .create_volume(&invocation, &self.workspace.volume_dir)
            .await
        {
            self.status
                .running(format!("error creating working volume: {e}"))
                .await;
            return StatusCode::DockerCreateFailed;
        }

        self.status
            .running(format!("finished creating working volume {invocation}"))
            .await;
        StatusCode::Success
    }

    async fn stage_inputs(&self, cancel: &CancellationToken) -> StatusCode {
        let inputs: Vec<_> = self.job.inputs().into_iter().cloned().collect();
        let porklock = self.porklock.reference();
        let config_dir = self.workspace.working_dir.display().to_string();

        for (index, input) in inputs.iter().enumerate() {
            self.status
                .running(format!("Downloading {}", input.irods_path()))
                .await;

            let spec = ContainerSpec::for_input(
                &self.job,
                input,
                index,
                &porklock,
                &self.transfer_env,
                &config_dir,
            );
            let exit = self
                .run_logged(
                    &spec,
                    &self.workspace.input_stdout_path(index),
                    &self.workspace.input_stderr_path(index),
                    cancel,
                )
                .await;

            match exit {
                Ok(0) => {
                    self.status
                        .running(format!("finished downloading {}", input.irods_path()))
                        .await;
                }
                Ok(code) => {
                    self.status
                        .running(format!(
                            "error downloading {}: transfer exited with {code}",
                            input.irods_path()
                        ))
                        .await;
                    return StatusCode::InputFailed;
                }
                Err(e) => {
                    if !cancel.is_cancelled() {
                        self.status
                            .running(format!(
                                "error downloading {}: {e}",
                                input.irods_path()
                            ))
                            .await;
                    }
                    return StatusCode::InputFailed;
                }
            }
        }

        StatusCode::Success
    }

    async fn run_step(&self, index: usize, cancel: &CancellationToken) -> StatusCode {
        let step = &self.job.steps[index];
        let image = step.container.image.reference();
        let arguments = step.arguments().join(" ");

        self.status
            .running(format!(
                "Running tool container {image} with arguments: {arguments}"
            ))
            .await;

        let spec = ContainerSpec::for_step(&self.job, step, index);
        for name in &spec.volumes_from {
            if !self.data_containers.contains_key(name) {
                warn!(container = %name, "step mounts from a data container that was never created");
            }
        }

        let exit = self
            .run_logged(
                &spec,
                &self.workspace.step_stdout_path(index),
                &self.workspace.step_stderr_path(index),
                cancel,
            )
            .await;

        match exit {
            Ok(0) => {
                self.status
                    .running(format!(
                        "Tool container {image} with arguments '{arguments}' finished successfully"
                    ))
                    .await;
                StatusCode::Success
            }
            Ok(code) => {
                self.status
                    .running(format!(
                        "Error running tool container {image} with arguments '{arguments}': exited with {code}"
                    ))
                    .await;
                StatusCode::StepFailed
            }
            Err(e) => {
                if !cancel.is_cancelled() {
                    self.status
                        .running(format!(
                            "Error running tool container {image} with arguments '{arguments}': {e}"
                        ))
                        .await;
                }
                StatusCode::StepFailed
            }
        }
    }

    async fn upload_outputs(&self, cancel: &CancellationToken) -> StatusCode {
        let destination = &self.job.output_directory;
        self.status
            .running(format!("Beginning to upload outputs to {destination}"))
            .await;

        let porklock = self.porklock.reference();
        let config_dir = self.workspace.working_dir.display().to_string();
        let spec =
            ContainerSpec::for_upload(&self.job, &porklock, &self.transfer_env, &config_dir);

        let exit = self
            .run_logged(
                &spec,
                &self.workspace.output_stdout_path(),
                &self.workspace.output_stderr_path(),
                cancel,
            )
            .await;

        match exit {
            Ok(0) => {
                self.status
                    .running(format!("Done uploading outputs to {destination}"))
                    .await;
                StatusCode::Success
            }
            Ok(code) => {
                self.status
                    .running(format!(
                        "Error uploading outputs to {destination}: transfer exited with {code}"
                    ))
                    .await;
                StatusCode::OutputFailed
            }
            Err(e) => {
                if !cancel.is_cancelled() {
                    self.status
                        .running(format!("Error uploading outputs to {destination}: {e}"))
                        .await;
                }
                StatusCode::OutputFailed
            }
        }
    }

    /// Create and run one container with its stdio captured to log files.
    ///
    /// Cancellation force-removes the container, which makes the in-flight
    /// attach return; the resulting error is reported as `Cancelled`.
    async fn run_logged(
        &self,
        spec: &ContainerSpec,
        stdout_path: &Path,
        stderr_path: &Path,
        cancel: &CancellationToken,
    ) -> ExecResult<i64> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled);
        }
        let id = self.backend.create_container(spec).await?;
        let stdout = log_sink(stdout_path).await?;
        let stderr = log_sink(stderr_path).await?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(container = %id, "cancellation requested; force-removing container");
                if let Err(e) = self.backend.remove_container(&id).await {
                    warn!(container = %id, "failed to remove cancelled container: {e}");
                }
                Err(ExecError::Cancelled)
            }
            result = self.backend.run_attached(&id, stdout, stderr) => result,
        }
    }
}

async fn log_sink(path: &Path) -> ExecResult<OutputSink> {
    let file = tokio::fs::File::create(path).await?;
    Ok(Box::new(file))
}

//! strider-runner
//!
//! Executes one job described by a JSON file. Each step of the job runs
//! inside a container; results are transferred back to the data store with
//! the porklock tool, and job status updates are published to the jobs
//! exchange. The process exit code is the job's terminal status code, or -1
//! when a termination signal took the job down.
mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use clap::Parser;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace};

use strider_bus::{client, AmqpBus, JobUpdatePublisher, StatusPublisher};
use strider_core::{
    fs as corefs, spawn_signal_intake, Event, LifecycleController, PipelineExecutor, StopSource,
    TimeLimitResponder, Workspace,
};
use strider_exec::{ContainerBackend, DockerCli, DockerConfig, JobCompose, PorklockConfig};
use strider_model::{Env, Job};
use strider_observe::init_logger;

use crate::config::RunnerConfig;

#[derive(Debug, Parser)]
#[command(name = "strider-runner", version, about)]
struct Args {
    /// Path to the configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Path to the job description file.
    #[arg(long)]
    job: PathBuf,

    /// Directory a copy of the job file is placed in for the image janitor.
    #[arg(long, default_value = "/opt/image-janitor")]
    write_to: PathBuf,

    /// Path the generated compose document is written to.
    #[arg(long, default_value = "docker-compose.yml")]
    docker_compose: PathBuf,
}

/// Answers time-limit queries on the bus.
struct BusResponder {
    bus: Arc<AmqpBus>,
}

#[async_trait]
impl TimeLimitResponder for BusResponder {
    async fn reply(&self, invocation_id: &str, milliseconds_remaining: i64) {
        if let Err(e) = self
            .bus
            .send_time_limit_response(invocation_id, milliseconds_remaining)
            .await
        {
            error!("failed to send time limit response: {e}");
        }
    }
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(code) => ExitCode::from(code as u8),
        Err(e) => {
            // Pre-flight failures never enter the state machine.
            error!("{e:#}");
            eprintln!("strider-runner: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<i32> {
    let cfg = RunnerConfig::load(&args.config)?;
    init_logger(&cfg.logging).context("failed to initialize the logger")?;
    info!(config = %args.config.display(), "read configuration");

    let data = std::fs::read(&args.job)
        .with_context(|| format!("failed to read job file {}", args.job.display()))?;
    let job = Arc::new(Job::from_json(&data).context("failed to decode the job description")?);
    let invocation = job.invocation();
    info!(invocation = %invocation, submitter = %job.submitter, "job decoded");

    anyhow::ensure!(
        args.write_to.is_dir(),
        "write-to directory {} does not exist",
        args.write_to.display()
    );
    corefs::copy_job_file(&invocation, &args.job, &args.write_to)
        .context("failed to mirror the job file")?;

    let bus = Arc::new(
        AmqpBus::connect(&cfg.amqp.uri, &cfg.amqp.exchange.name, &cfg.amqp.exchange.kind)
            .await
            .context("failed to connect to the amqp broker")?,
    );
    let publisher: Arc<dyn JobUpdatePublisher> = bus.clone();
    let status = StatusPublisher::new(publisher, job.clone());

    let docker = Arc::new(DockerCli::new(DockerConfig {
        docker_path: cfg.docker.path.clone().into(),
    }));
    match docker.ping().await {
        Ok(version) => info!(version = %version, "container engine is reachable"),
        Err(e) => {
            status.failed("Failed to connect to the container engine").await;
            anyhow::bail!("container engine is unreachable: {e}");
        }
    }
    let backend: Arc<dyn ContainerBackend> = docker;

    let working_dir = std::env::current_dir().context("failed to read the working directory")?;
    // The working volume lives under the working directory unless the
    // scheduler provides a dedicated volumes directory.
    let workspace = if cfg.condor.volumespath.is_empty() {
        Workspace::new(&working_dir)
    } else {
        Workspace::with_volume_dir(&working_dir, cfg.condor.volume_device(&invocation))
    };
    let porklock = PorklockConfig {
        image: cfg.porklock.image.clone(),
        tag: cfg.porklock.tag.clone(),
    };

    // The compose document is a debugging artifact that ships back with the
    // outputs; vault credentials stay out of it and reach the transfer
    // containers through their environment only.
    let compose = JobCompose::new(
        &job,
        &porklock.reference(),
        &Env::new(),
        &working_dir.display().to_string(),
        &workspace.volume_dir,
    );
    std::fs::write(&args.docker_compose, compose.to_yaml()?)
        .with_context(|| format!("failed to write {}", args.docker_compose.display()))?;

    workspace
        .init(&args.docker_compose)
        .context("failed to initialize the working directory")?;
    corefs::write_job_summary(&workspace.logs_dir, &job)?;
    corefs::write_job_parameters(&workspace.logs_dir, &job)?;

    let mut transfer_env = Env::new();
    transfer_env.push("VAULT_ADDR", cfg.vault.url.clone());
    transfer_env.push("VAULT_TOKEN", cfg.vault.token.clone());

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (phases_tx, phases_rx) = mpsc::unbounded_channel();
    let quit = CancellationToken::new();

    // Per-invocation bus consumers feed the controller channel.
    let stop = bus.subscribe_stop_requests(&invocation).await?;
    let tx = events_tx.clone();
    tokio::spawn(client::listen(stop, move |_payload| {
        let _ = tx.send(Event::Stop {
            source: StopSource::Bus,
        });
    }));

    let deltas = bus.subscribe_time_limit_deltas(&invocation).await?;
    let tx = events_tx.clone();
    tokio::spawn(client::listen(deltas, move |payload| {
        let _ = tx.send(Event::Delta { payload });
    }));

    let queries = bus.subscribe_time_limit_requests(&invocation).await?;
    let tx = events_tx.clone();
    tokio::spawn(client::listen(queries, move |_payload| {
        let _ = tx.send(Event::TimeLimitQuery);
    }));

    let responses = bus.subscribe_time_limit_responses(&invocation).await?;
    tokio::spawn(client::listen(responses, |payload| {
        trace!(payload = %String::from_utf8_lossy(&payload), "time limit response");
    }));

    spawn_signal_intake(events_tx.clone(), quit.clone());

    let executor = PipelineExecutor::new(
        job.clone(),
        backend.clone(),
        status.clone(),
        porklock,
        transfer_env,
        workspace,
        phases_rx,
        events_tx.clone(),
    );
    tokio::spawn(executor.run());

    let controller = LifecycleController::new(
        job,
        backend,
        status,
        Arc::new(BusResponder { bus }),
        events_rx,
        events_tx,
        phases_tx,
        quit,
    );
    let exit_code = controller.run().await;

    if let Err(e) = corefs::delete_job_file(&invocation, &args.write_to) {
        error!("failed to remove the mirrored job file: {e}");
    }
    info!(exit_code, "runner finished");
    Ok(exit_code)
}

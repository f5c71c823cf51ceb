use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use strider_bus::{StatusPublisher, TimeLimitDelta};
use strider_exec::ContainerBackend;
use strider_model::{Job, StatusCode};

use crate::events::{Event, InvocationState, Phase, PhaseCommand, StopSource};
use crate::reaper::Reaper;
use crate::timetracker::TimeTracker;

/// Replies to time-limit queries.
///
/// Production answers on the bus; tests record the replies.
#[async_trait]
pub trait TimeLimitResponder: Send + Sync {
    async fn reply(&self, invocation_id: &str, milliseconds_remaining: i64);
}

/// The invocation state machine.
///
/// Owns all mutable lifecycle state and is the only place that transitions
/// it. Phase results, bus requests, signals, and deadline firings all arrive
/// on one channel and are handled strictly one at a time; no two transitions
/// ever run concurrently.
pub struct LifecycleController {
    job: Arc<Job>,
    backend: Arc<dyn ContainerBackend>,
    status: StatusPublisher,
    responder: Arc<dyn TimeLimitResponder>,
    events_rx: UnboundedReceiver<Event>,
    events_tx: UnboundedSender<Event>,
    phases: UnboundedSender<PhaseCommand>,
    /// Raised on the terminal transition so the signal intake can exit.
    quit: CancellationToken,
    state: InvocationState,
    final_code: StatusCode,
    signal_seen: bool,
    tracker: Option<TimeTracker>,
    current_cancel: Option<CancellationToken>,
    /// Phase the executor is currently working on, if any. Cleanup waits for
    /// it to report back so the reaper never races a creating phase.
    in_flight: Option<Phase>,
    cleanup_started: bool,
}

impl LifecycleController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        job: Arc<Job>,
        backend: Arc<dyn ContainerBackend>,
        status: StatusPublisher,
        responder: Arc<dyn TimeLimitResponder>,
        events_rx: UnboundedReceiver<Event>,
        events_tx: UnboundedSender<Event>,
        phases: UnboundedSender<PhaseCommand>,
        quit: CancellationToken,
    ) -> Self {
        Self {
            job,
            backend,
            status,
            responder,
            events_rx,
            events_tx,
            phases,
            quit,
            state: InvocationState::Pulling,
            final_code: StatusCode::Success,
            signal_seen: false,
            tracker: None,
            current_cancel: None,
            in_flight: None,
            cleanup_started: false,
        }
    }

    /// Drive the invocation to its terminal state; returns the process exit
    /// code.
    pub async fn run(mut self) -> i32 {
        self.status
            .running(format!(
                "Job {} is running on host {}",
                self.job.invocation(),
                self.status.sender()
            ))
            .await;
        self.dispatch(Phase::PullImages);

        while let Some(event) = self.events_rx.recv().await {
            self.handle(event).await;
            if let InvocationState::Terminal(code) = self.state {
                return if self.signal_seen { -1 } else { code.exit_code() };
            }
        }

        warn!("event channel closed before a terminal state was reached");
        -1
    }

    async fn handle(&mut self, event: Event) {
        match event {
            Event::PhaseDone { phase, status } => self.on_phase_done(phase, status).await,
            Event::Stop { source } => self.on_stop(source).await,
            Event::DeadlineWarn { step, buffer } => self.on_deadline_warn(step, buffer).await,
            Event::DeadlineKill { step } => self.on_deadline_kill(step),
            Event::Delta { payload } => self.on_delta(&payload).await,
            Event::TimeLimitQuery => self.on_query().await,
            Event::CleanupDone => self.on_cleanup_done().await,
        }
    }

    async fn on_phase_done(&mut self, phase: Phase, status: StatusCode) {
        if self.in_flight == Some(phase) {
            self.in_flight = None;
        }
        if !self.state.is_active() {
            debug!(?phase, state = ?self.state, "ignoring phase completion");
            // A cancelled phase has now fully unwound; cleanup can begin.
            if self.state == InvocationState::Cleaning && !self.cleanup_started {
                self.start_reaper();
            }
            return;
        }

        if !status.is_success() {
            self.record(status);
            self.stop_tracker();
            if phase == Phase::UploadOutputs {
                self.enter_cleaning();
            } else {
                // Outputs are uploaded even for failed jobs; the logs they
                // carry are what makes the failure debuggable.
                self.state = InvocationState::Uploading;
                self.dispatch(Phase::UploadOutputs);
            }
            return;
        }

        match (self.state, phase) {
            (InvocationState::Pulling, Phase::PullImages) => {
                self.state = InvocationState::CreatingData;
                self.dispatch(Phase::CreateDataContainers);
            }
            (InvocationState::CreatingData, Phase::CreateDataContainers) => {
                self.dispatch(Phase::CreateWorkingVolume);
            }
            (InvocationState::CreatingData, Phase::CreateWorkingVolume) => {
                self.state = InvocationState::Staging;
                self.dispatch(Phase::StageInputs);
            }
            (InvocationState::Staging, Phase::StageInputs) => {
                if self.job.steps.is_empty() {
                    self.state = InvocationState::Uploading;
                    self.dispatch(Phase::UploadOutputs);
                } else {
                    self.state = InvocationState::Running(0);
                    self.dispatch(Phase::RunStep(0));
                }
            }
            (InvocationState::Running(current), Phase::RunStep(done)) if current == done => {
                self.stop_tracker();
                let next = done + 1;
                if next < self.job.steps.len() {
                    self.state = InvocationState::Running(next);
                    self.dispatch(Phase::RunStep(next));
                } else {
                    self.state = InvocationState::Uploading;
                    self.dispatch(Phase::UploadOutputs);
                }
            }
            (InvocationState::Uploading, Phase::UploadOutputs) => {
                self.enter_cleaning();
            }
            (state, phase) => {
                warn!(?state, ?phase, "unexpected phase completion; ignoring");
            }
        }
    }

    async fn on_stop(&mut self, source: StopSource) {
        if source == StopSource::Signal {
            self.signal_seen = true;
        }
        if !self.state.is_active() {
            debug!(?source, "stop after cleanup started; ignoring");
            return;
        }
        self.status.running("Received stop request").await;
        self.record(StatusCode::Killed);
        self.enter_cleaning();
    }

    async fn on_deadline_warn(&mut self, step: usize, buffer: Duration) {
        if self.state != InvocationState::Running(step) {
            debug!(step, "discarding stale deadline warning");
            return;
        }
        self.status
            .impending_cancellation(format!(
                "Job will be killed in {}",
                humantime::format_duration(buffer)
            ))
            .await;
    }

    fn on_deadline_kill(&mut self, step: usize) {
        if self.state != InvocationState::Running(step) {
            debug!(step, "discarding stale deadline kill");
            return;
        }
        info!(step, "step time limit reached");
        self.record(StatusCode::TimeLimit);
        self.enter_cleaning();
    }

    async fn on_delta(&mut self, payload: &[u8]) {
        if !self.state.is_active() {
            return;
        }
        self.status.running("Received delta request").await;

        let delta = match serde_json::from_slice::<TimeLimitDelta>(payload) {
            Ok(delta) => delta,
            Err(e) => {
                self.status
                    .running(format!("Failed to unmarshal time limit delta: {e}"))
                    .await;
                return;
            }
        };
        let duration = match humantime::parse_duration(&delta.delta) {
            Ok(duration) => duration,
            Err(e) => {
                self.status
                    .running(format!("Failed to parse duration string from message: {e}"))
                    .await;
                return;
            }
        };

        let applied = match self.tracker.as_mut() {
            Some(tracker) => tracker.apply_delta(duration),
            None => Err(crate::error::CoreError::TimerNotActive),
        };
        match applied {
            Ok(()) => {
                let remaining = self.tracker.as_ref().map(|t| t.remaining_ms()).unwrap_or(0);
                self.status
                    .running(format!(
                        "Applied time delta of {}; {remaining}ms remaining",
                        delta.delta
                    ))
                    .await;
            }
            Err(e) => {
                self.status
                    .running(format!("Failed to apply time limit delta: {e}"))
                    .await;
            }
        }
    }

    async fn on_query(&mut self) {
        let remaining = self.tracker.as_ref().map(|t| t.remaining_ms()).unwrap_or(0);
        self.responder.reply(&self.job.invocation(), remaining).await;
        self.status
            .running(format!("Sent message saying that time left is {remaining}ms"))
            .await;
    }

    async fn on_cleanup_done(&mut self) {
        if self.state != InvocationState::Cleaning {
            warn!(state = ?self.state, "unexpected cleanup completion");
            return;
        }
        if self.final_code.is_success() {
            self.status.succeeded().await;
        } else {
            self.status
                .failed(format!("Job exited with a status of {}", self.final_code))
                .await;
        }
        self.state = InvocationState::Terminal(self.final_code);
        self.quit.cancel();
    }

    /// First non-success code wins; later ones are logged and dropped.
    fn record(&mut self, code: StatusCode) {
        if self.final_code.is_success() {
            self.final_code = code;
        } else if !code.is_success() {
            info!(code = %code, kept = %self.final_code, "keeping first terminal status code");
        }
    }

    fn dispatch(&mut self, phase: Phase) {
        if let Phase::RunStep(index) = phase {
            let limit = self.job.steps[index].time_limit_seconds;
            if limit > 0 {
                self.tracker = Some(TimeTracker::start(
                    index,
                    Duration::from_secs(limit),
                    self.events_tx.clone(),
                ));
            }
        }
        let cancel = CancellationToken::new();
        self.current_cancel = Some(cancel.clone());
        if self.phases.send(PhaseCommand { phase, cancel }).is_err() {
            warn!(?phase, "pipeline executor is gone; cannot dispatch");
        } else {
            self.in_flight = Some(phase);
            debug!(?phase, "dispatched phase");
        }
    }

    fn stop_tracker(&mut self) {
        if let Some(mut tracker) = self.tracker.take() {
            tracker.stop();
        }
    }

    /// Cancel whatever is in flight and move to Cleaning. The reaper starts
    /// once no phase is active, and the terminal transition happens when it
    /// reports back.
    fn enter_cleaning(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.state = InvocationState::Cleaning;
        self.stop_tracker();
        if let Some(cancel) = self.current_cancel.take() {
            cancel.cancel();
        }
        if self.in_flight.is_none() {
            self.start_reaper();
        }
    }

    fn start_reaper(&mut self) {
        self.cleanup_started = true;
        let reaper = Reaper::new(self.backend.clone(), self.job.clone());
        let code = self.final_code;
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            reaper.run(code).await;
            let _ = events.send(Event::CleanupDone);
        });
    }
}

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use strider_model::StatusCode;

/// Where a stop request came from. Both sources kill the job; only the
/// exit code differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSource {
    Bus,
    Signal,
}

/// One pipeline phase. `RunStep` is dispatched once per step index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PullImages,
    CreateDataContainers,
    CreateWorkingVolume,
    StageInputs,
    RunStep(usize),
    UploadOutputs,
}

/// A phase dispatched to the pipeline executor, with the token the
/// controller cancels to abort it.
#[derive(Debug, Clone)]
pub struct PhaseCommand {
    pub phase: Phase,
    pub cancel: CancellationToken,
}

/// Everything that can reach the controller loop.
///
/// All asynchronous producers (executor, bus consumers, signal intake,
/// deadline timers, the cleanup task) funnel through this one tagged union;
/// the loop is the sole mutator of [`InvocationState`].
#[derive(Debug)]
pub enum Event {
    /// The executor finished a dispatched phase.
    PhaseDone { phase: Phase, status: StatusCode },
    /// Stop request from the bus or an OS termination signal.
    Stop { source: StopSource },
    /// The warning timer of the active step fired.
    DeadlineWarn { step: usize, buffer: Duration },
    /// The kill timer of the active step fired.
    DeadlineKill { step: usize },
    /// Raw payload of a time-limit-delta request.
    Delta { payload: Vec<u8> },
    /// A time-limit query; the controller replies with the remaining time.
    TimeLimitQuery,
    /// The cleanup pass finished.
    CleanupDone,
}

/// Controller-owned invocation state. Monotone: once `Terminal`, no further
/// transition happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationState {
    Pulling,
    CreatingData,
    Staging,
    Running(usize),
    Uploading,
    Cleaning,
    Terminal(StatusCode),
}

impl InvocationState {
    /// Whether stop/kill inputs can still act on the invocation.
    pub fn is_active(&self) -> bool {
        !matches!(self, InvocationState::Cleaning | InvocationState::Terminal(_))
    }
}

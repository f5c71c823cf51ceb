//! Job lifecycle core.
//!
//! Responsibilities:
//! - own the invocation state machine and serialize every asynchronous
//!   input (phase results, bus requests, signals, deadlines) through one
//!   event loop;
//! - execute the pipeline phases strictly in order against the container
//!   backend;
//! - guarantee that everything labelled with the invocation id is gone from
//!   the host before the process exits.
pub mod controller;
pub mod error;
pub mod events;
pub mod fs;
pub mod pipeline;
pub mod reaper;
pub mod signals;
pub mod timetracker;

pub use controller::{LifecycleController, TimeLimitResponder};
pub use error::{CoreError, CoreResult};
pub use events::{Event, InvocationState, Phase, PhaseCommand, StopSource};
pub use fs::Workspace;
pub use pipeline::PipelineExecutor;
pub use reaper::Reaper;
pub use signals::spawn_signal_intake;
pub use timetracker::TimeTracker;

pub mod prelude {
    pub use crate::controller::{LifecycleController, TimeLimitResponder};
    pub use crate::error::{CoreError, CoreResult};
    pub use crate::events::{Event, InvocationState, Phase, StopSource};
    pub use crate::fs::Workspace;
    pub use crate::pipeline::PipelineExecutor;
}

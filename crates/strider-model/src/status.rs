use std::fmt;

use serde::{Deserialize, Serialize};

/// Terminal outcome of an invocation and the process exit currency.
///
/// The numeric values are part of the platform contract; upstream services
/// map them back to user-facing failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    Success,
    DockerPullFailed,
    DockerCreateFailed,
    InputFailed,
    StepFailed,
    OutputFailed,
    TimeLimit,
    Killed,
}

impl StatusCode {
    /// The process exit code for this status.
    pub fn exit_code(&self) -> i32 {
        match self {
            StatusCode::Success => 0,
            StatusCode::DockerPullFailed => 1,
            StatusCode::DockerCreateFailed => 2,
            StatusCode::InputFailed => 3,
            StatusCode::StepFailed => 4,
            StatusCode::OutputFailed => 5,
            StatusCode::TimeLimit => 6,
            StatusCode::Killed => 7,
        }
    }

    /// Whether this code represents a successful invocation.
    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.exit_code())
    }
}

/// State carried by a job-update message on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Running,
    ImpendingCancellation,
    Failed,
    Succeeded,
}

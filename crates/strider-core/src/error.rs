use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("container engine error: {0}")]
    Exec(#[from] strider_exec::ExecError),

    #[error("deadline timers are not active")]
    TimerNotActive,

    #[error("bad time-limit delta: {0}")]
    BadDelta(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

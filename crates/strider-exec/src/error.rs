use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("invalid container spec: {0}")]
    InvalidSpec(String),

    #[error("invalid registry auth: {0}")]
    Auth(String),

    #[error("unexpected engine output: {0}")]
    UnexpectedOutput(String),

    #[error("cancelled")]
    Cancelled,
}

pub type ExecResult<T> = Result<T, ExecError>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to decode job description: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;

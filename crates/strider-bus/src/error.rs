use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("failed to encode bus message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type BusResult<T> = Result<T, BusError>;

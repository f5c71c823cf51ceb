//! AMQP plumbing for the runner.
//!
//! Responsibilities:
//! - publish job-update envelopes to the jobs exchange;
//! - subscribe to the per-invocation stop / time-limit queues;
//! - own the queue-name and routing-key formulas derived from the
//!   invocation identifier.
pub mod client;
pub mod error;
pub mod message;
pub mod names;
pub mod publisher;

pub use client::AmqpBus;
pub use error::{BusError, BusResult};
pub use message::{TimeLimitDelta, TimeLimitResponse, UpdateMessage};
pub use publisher::{JobUpdatePublisher, StatusPublisher};

pub mod prelude {
    pub use crate::client::AmqpBus;
    pub use crate::error::{BusError, BusResult};
    pub use crate::message::UpdateMessage;
    pub use crate::publisher::{JobUpdatePublisher, StatusPublisher};
}

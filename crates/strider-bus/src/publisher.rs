use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use strider_model::{Job, JobState};

use crate::error::BusResult;
use crate::message::UpdateMessage;

/// Anything that can publish a job update.
///
/// Production uses [`crate::AmqpBus`]; tests record the updates instead.
#[async_trait]
pub trait JobUpdatePublisher: Send + Sync {
    async fn publish_job_update(&self, update: UpdateMessage) -> BusResult<()>;
}

/// Semantic layer over [`JobUpdatePublisher`].
///
/// Publish failures are logged and swallowed: losing a progress update must
/// never change the course of the invocation.
#[derive(Clone)]
pub struct StatusPublisher {
    publisher: Arc<dyn JobUpdatePublisher>,
    job: Arc<Job>,
    sender: String,
}

impl StatusPublisher {
    /// Create a publisher for one job. `sender` identifies this host in the
    /// update envelopes.
    pub fn new(publisher: Arc<dyn JobUpdatePublisher>, job: Arc<Job>) -> Self {
        let sender = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| {
                error!("couldn't determine the hostname");
                String::new()
            });
        Self {
            publisher,
            job,
            sender,
        }
    }

    /// The host identifier stamped into every update.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    async fn publish(&self, state: JobState, message: String) {
        let update = UpdateMessage {
            job: (*self.job).clone(),
            state,
            message,
            sender: self.sender.clone(),
        };
        if let Err(e) = self.publisher.publish_job_update(update).await {
            error!("failed to publish job update: {e}");
        }
    }

    /// Publish a progress update.
    pub async fn running(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.publish(JobState::Running, message).await;
    }

    /// Publish a warning that the job will be cancelled shortly.
    pub async fn impending_cancellation(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.publish(JobState::ImpendingCancellation, message).await;
    }

    /// Publish the terminal failure message.
    pub async fn failed(&self, message: impl Into<String>) {
        let message = message.into();
        error!("{message}");
        self.publish(JobState::Failed, message).await;
    }

    /// Publish the terminal success message.
    pub async fn succeeded(&self) {
        info!("job success");
        self.publish(JobState::Succeeded, String::new()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct Recording {
        updates: Mutex<Vec<UpdateMessage>>,
    }

    #[async_trait]
    impl JobUpdatePublisher for Recording {
        async fn publish_job_update(&self, update: UpdateMessage) -> BusResult<()> {
            self.updates.lock().unwrap().push(update);
            Ok(())
        }
    }

    fn job() -> Arc<Job> {
        Arc::new(Job {
            invocation_id: Uuid::new_v4(),
            submitter: "tester".into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn running_publishes_running_state() {
        let recording = Arc::new(Recording::default());
        let status = StatusPublisher::new(recording.clone(), job());

        status.running("Pulling image").await;

        let updates = recording.updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].state, JobState::Running);
        assert_eq!(updates[0].message, "Pulling image");
    }

    #[tokio::test]
    async fn terminal_states_map_to_failed_and_succeeded() {
        let recording = Arc::new(Recording::default());
        let status = StatusPublisher::new(recording.clone(), job());

        status.failed("Job exited with a status of 4").await;
        status.succeeded().await;

        let updates = recording.updates.lock().unwrap();
        assert_eq!(updates[0].state, JobState::Failed);
        assert_eq!(updates[1].state, JobState::Succeeded);
    }
}

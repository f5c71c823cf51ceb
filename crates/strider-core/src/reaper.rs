use std::sync::Arc;

use tracing::{info, warn};

use strider_exec::ContainerBackend;
use strider_model::{ContainerType, Job, StatusCode, LABEL_CONTAINER_TYPE, LABEL_INVOCATION};

/// Idempotent teardown of everything the invocation created.
///
/// Every sub-step logs failures and continues; the pass always runs to the
/// end, and running it twice leaves the host in the same state as running
/// it once.
pub struct Reaper {
    backend: Arc<dyn ContainerBackend>,
    job: Arc<Job>,
}

impl Reaper {
    pub fn new(backend: Arc<dyn ContainerBackend>, job: Arc<Job>) -> Self {
        Self { backend, job }
    }

    /// Remove the invocation's containers, working volume, and (on the kill
    /// paths) the data-container images.
    pub async fn run(&self, code: StatusCode) {
        let invocation = self.job.invocation();
        info!(invocation = %invocation, code = %code, "cleaning up");

        // Data-container images stay behind as a pull cache unless the job
        // was killed.
        if matches!(code, StatusCode::Killed | StatusCode::TimeLimit) {
            self.remove_data_container_images().await;
        }

        self.remove_containers_by_type(ContainerType::Input).await;
        self.remove_containers_by_type(ContainerType::Step).await;
        self.remove_containers_by_type(ContainerType::Data).await;
        self.remove_working_volume(&invocation).await;

        // Safety net: output containers and anything whose type label was
        // unreadable still carry the invocation label.
        self.remove_containers(LABEL_INVOCATION, &invocation).await;

        info!(invocation = %invocation, "cleanup finished");
    }

    async fn remove_data_container_images(&self) {
        for vf in self.job.data_containers() {
            let image = vf.image_reference();
            if let Err(e) = self.backend.remove_image(&image).await {
                warn!(image = %image, "failed to remove data-container image: {e}");
            }
        }
    }

    async fn remove_containers_by_type(&self, kind: ContainerType) {
        self.remove_containers(LABEL_CONTAINER_TYPE, kind.label_value())
            .await;
    }

    async fn remove_containers(&self, key: &str, value: &str) {
        let ids = match self.backend.list_by_label(key, value, true).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(key, value, "failed to list containers: {e}");
                return;
            }
        };
        for id in ids {
            if let Err(e) = self.backend.remove_container(&id).await {
                warn!(container = %id, "failed to remove container: {e}");
            }
        }
    }

    async fn remove_working_volume(&self, invocation: &str) {
        match self.backend.volume_exists(invocation).await {
            Ok(true) => {
                if let Err(e) = self.backend.remove_volume(invocation).await {
                    warn!(volume = %invocation, "failed to remove working volume: {e}");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(volume = %invocation, "failed to check working volume: {e}"),
        }
    }
}

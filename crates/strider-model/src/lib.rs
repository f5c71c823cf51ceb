mod container;
mod domain;
mod error;
mod job;
mod status;
mod step;

pub use container::{Container, ContainerImage, ContainerType, Device, Volume, VolumesFrom};
pub use domain::{
    Env, EnvVar, Labels, CONFIG_DIR, ENV_INVOCATION_ID, ENV_SUBMITTER, LABEL_CONTAINER_TYPE,
    LABEL_INVOCATION, LOGS_DIR, VOLUME_DIR, WORK_DIR,
};
pub use error::{ModelError, ModelResult};
pub use job::{FileMetadata, Job};
pub use status::{JobState, StatusCode};
pub use step::{Step, StepConfig, StepInput, StepParam};

pub mod prelude {
    pub use crate::{
        ContainerImage, ContainerType, Env, Job, JobState, Labels, StatusCode, Step, StepInput,
        VolumesFrom,
    };
}

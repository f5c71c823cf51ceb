mod constants;
mod env;
mod labels;

pub use constants::{
    CONFIG_DIR, ENV_INVOCATION_ID, ENV_SUBMITTER, LABEL_CONTAINER_TYPE, LABEL_INVOCATION,
    LOGS_DIR, VOLUME_DIR, WORK_DIR,
};
pub use env::{Env, EnvVar};
pub use labels::Labels;

//! Common model-level constants.
//!
//! This module contains well-known string keys used across the runner.
//! Keeping them here avoids scattering magic strings throughout the codebase.

/// Label key whose value is the invocation identifier.
///
/// Every container, image, and volume created on behalf of a job carries this
/// label; the cleanup pass discovers leftovers by it and nothing else.
pub const LABEL_INVOCATION: &str = "org.strider.invocation";

/// Label key whose value discriminates the container type.
///
/// Values are the numeric forms of [`crate::ContainerType`].
pub const LABEL_CONTAINER_TYPE: &str = "org.strider.container-type";

/// Path inside every job container where the working volume is mounted.
pub const WORK_DIR: &str = "/de-app-work";

/// Path inside transfer containers where the host working directory is
/// mounted so porklock can read its config files.
pub const CONFIG_DIR: &str = "/configs";

/// Name of the working-volume directory under the host working directory.
pub const VOLUME_DIR: &str = "workingvolume";

/// Name of the logs directory under [`VOLUME_DIR`].
pub const LOGS_DIR: &str = "logs";

/// Environment variable injected into every step with the job submitter.
pub const ENV_SUBMITTER: &str = "STRIDER_SUBMITTER";

/// Environment variable injected into every step with the invocation id.
pub const ENV_INVOCATION_ID: &str = "STRIDER_INVOCATION_ID";

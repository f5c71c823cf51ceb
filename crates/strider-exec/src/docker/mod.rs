//! Docker engine driver.
//!
//! Drives the `docker` binary directly, one invocation per engine
//! operation. Shelling out keeps the runner independent of engine API
//! versions and lets cancellation force-remove a specific container.
mod args;
mod auth;
mod cli;

pub use auth::{registry_host, RegistryAuth};
pub use cli::DockerCli;

use std::path::PathBuf;

/// Settings for the docker driver.
#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Path to the docker binary.
    pub docker_path: PathBuf,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            docker_path: PathBuf::from("docker"),
        }
    }
}

/// Image coordinates of the transfer utility.
#[derive(Debug, Clone)]
pub struct PorklockConfig {
    pub image: String,
    pub tag: String,
}

impl PorklockConfig {
    /// The `image:tag` reference to pull and run.
    pub fn reference(&self) -> String {
        format!("{}:{}", self.image, self.tag)
    }
}

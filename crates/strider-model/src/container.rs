use serde::{Deserialize, Serialize};

use crate::domain::WORK_DIR;

/// Discriminant stored in the container-type label.
///
/// The numeric label values are part of the platform contract; the cleanup
/// pass selects containers by them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerType {
    Input,
    Data,
    Step,
    Output,
}

impl ContainerType {
    /// The value written into the container-type label.
    pub fn label_value(&self) -> &'static str {
        match self {
            ContainerType::Input => "0",
            ContainerType::Data => "1",
            ContainerType::Step => "2",
            ContainerType::Output => "3",
        }
    }
}

/// Reference to a container image, with optional registry credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerImage {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub tag: String,
    /// base64-encoded JSON `{"username": ..., "password": ...}` blob, when
    /// the registry requires authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

impl ContainerImage {
    /// The `name:tag` reference passed to the engine, or just `name` when no
    /// tag was provided.
    pub fn reference(&self) -> String {
        if self.tag.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.name, self.tag)
        }
    }
}

/// A data-container declaration: an auxiliary container whose only purpose
/// is to hold a volume that steps mount with `--volumes-from`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumesFrom {
    pub name: String,
    #[serde(default)]
    pub tag: String,
    pub name_prefix: String,
    #[serde(default)]
    pub host_path: String,
    #[serde(default)]
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

impl VolumesFrom {
    /// Runtime name of the data container for a given invocation.
    pub fn container_name(&self, invocation_id: &str) -> String {
        format!("{}-{}", self.name_prefix, invocation_id)
    }

    /// The image reference the data container is created from.
    pub fn image_reference(&self) -> String {
        if self.tag.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.name, self.tag)
        }
    }
}

/// A host path mounted into a step container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    #[serde(default)]
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A host device mapped into a step container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub cgroup_permissions: String,
}

/// Execution settings for a step container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub image: ContainerImage,
    #[serde(default)]
    pub entry_point: String,
    #[serde(default)]
    pub working_directory: String,
    #[serde(default)]
    pub memory_limit: i64,
    #[serde(default)]
    pub cpu_shares: i64,
    #[serde(default)]
    pub network_mode: String,
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub volumes: Vec<Volume>,
    #[serde(default)]
    pub volumes_from: Vec<VolumesFrom>,
}

impl Container {
    /// Working directory inside the container, defaulting to the well-known
    /// job working directory.
    pub fn working_directory(&self) -> &str {
        if self.working_directory.is_empty() {
            WORK_DIR
        } else {
            &self.working_directory
        }
    }
}

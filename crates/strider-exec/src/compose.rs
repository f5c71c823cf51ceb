//! Compose-document generation.
//!
//! The runner drives the engine directly, but it still renders the job as a
//! compose document and ships the file back with the outputs: one readable
//! artifact that shows exactly which containers ran with which mounts,
//! environment, and labels. Services are derived from the same
//! [`ContainerSpec`] builders the executor uses, so the artifact cannot
//! drift from what actually ran.
use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use strider_model::{Env, Job};

use crate::spec::ContainerSpec;

/// Top-level compose document for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobCompose {
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub volumes: BTreeMap<String, ComposeVolume>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub services: BTreeMap<String, ComposeService>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeVolume {
    pub driver: String,
    #[serde(
        rename = "driver_opts",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub driver_opts: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeLogging {
    pub driver: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComposeService {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(
        rename = "container_name",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub container_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<ComposeLogging>,
    #[serde(
        rename = "network_mode",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub network_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(
        rename = "volumes_from",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub volumes_from: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub devices: Vec<String>,
    #[serde(
        rename = "working_dir",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub working_dir: Option<String>,
    #[serde(rename = "mem_limit", default, skip_serializing_if = "Option::is_none")]
    pub mem_limit: Option<i64>,
    #[serde(
        rename = "cpu_shares",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cpu_shares: Option<i64>,
}

impl JobCompose {
    /// Render the job as a compose document.
    pub fn new(
        job: &Job,
        porklock_image: &str,
        transfer_env: &Env,
        host_config_dir: &str,
        volume_device: &Path,
    ) -> Self {
        let invocation = job.invocation();

        let mut volumes = BTreeMap::new();
        let mut driver_opts = BTreeMap::new();
        driver_opts.insert("type".to_string(), "none".to_string());
        driver_opts.insert("device".to_string(), volume_device.display().to_string());
        driver_opts.insert("o".to_string(), "bind".to_string());
        volumes.insert(
            invocation.clone(),
            ComposeVolume {
                driver: "local".to_string(),
                driver_opts,
            },
        );

        let mut services = BTreeMap::new();
        for (i, vf) in job.data_containers().iter().enumerate() {
            services.insert(
                format!("data_{i}"),
                Self::service(&ContainerSpec::for_data(vf, &invocation)),
            );
        }
        for (i, input) in job.inputs().iter().enumerate() {
            services.insert(
                format!("input_{i}"),
                Self::service(&ContainerSpec::for_input(
                    job,
                    input,
                    i,
                    porklock_image,
                    transfer_env,
                    host_config_dir,
                )),
            );
        }
        for (i, step) in job.steps.iter().enumerate() {
            services.insert(
                format!("step_{i}"),
                Self::service(&ContainerSpec::for_step(job, step, i)),
            );
        }
        services.insert(
            "upload_outputs".to_string(),
            Self::service(&ContainerSpec::for_upload(
                job,
                porklock_image,
                transfer_env,
                host_config_dir,
            )),
        );

        Self {
            version: "2".to_string(),
            volumes,
            services,
        }
    }

    fn service(spec: &ContainerSpec) -> ComposeService {
        ComposeService {
            image: spec.image.clone(),
            command: spec.command.clone(),
            container_name: spec.name.clone(),
            entrypoint: spec.entrypoint.clone(),
            environment: spec
                .env
                .iter()
                .map(|kv| (kv.key().to_string(), kv.value().to_string()))
                .collect(),
            labels: spec
                .labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            logging: spec.disable_logging.then(|| ComposeLogging {
                driver: "none".to_string(),
            }),
            network_mode: spec.network_mode.clone(),
            volumes: spec.binds.iter().map(|b| b.render()).collect(),
            volumes_from: spec.volumes_from.clone(),
            devices: spec
                .devices
                .iter()
                .map(|d| format!("{}:{}", d.host_path, d.container_path))
                .collect(),
            working_dir: spec.working_dir.clone(),
            mem_limit: (spec.memory_limit > 0).then_some(spec.memory_limit),
            cpu_shares: (spec.cpu_shares > 0).then_some(spec.cpu_shares),
        }
    }

    /// Serialize to the YAML form written to disk.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Parse a document previously produced by [`JobCompose::to_yaml`].
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strider_model::{Container, ContainerImage, Step, StepInput, VolumesFrom};
    use uuid::Uuid;

    fn job() -> Job {
        let step = Step {
            container: Container {
                image: ContainerImage {
                    name: "discoenv/echo".into(),
                    tag: "latest".into(),
                    ..Default::default()
                },
                volumes_from: vec![VolumesFrom {
                    name: "discoenv/echo-data".into(),
                    tag: "latest".into(),
                    name_prefix: "echo-data".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
            input: vec![StepInput {
                value: "/iplant/home/tester/in.txt".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        Job {
            invocation_id: Uuid::parse_str("07b04ce2-7757-4b21-9e15-0b4c2f44be26").unwrap(),
            submitter: "tester".into(),
            output_directory: "/iplant/home/tester/out".into(),
            steps: vec![step],
            ..Default::default()
        }
    }

    fn compose() -> JobCompose {
        JobCompose::new(
            &job(),
            "discoenv/porklock:latest",
            &Env::new(),
            "/tmp/wd",
            Path::new("/volumes/07b04ce2-7757-4b21-9e15-0b4c2f44be26"),
        )
    }

    #[test]
    fn document_contains_every_container() {
        let doc = compose();
        let names: Vec<&str> = doc.services.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["data_0", "input_0", "step_0", "upload_outputs"]);
        assert!(doc
            .volumes
            .contains_key("07b04ce2-7757-4b21-9e15-0b4c2f44be26"));
    }

    #[test]
    fn yaml_roundtrip_is_lossless() {
        let doc = compose();
        let yaml = doc.to_yaml().unwrap();
        let back = JobCompose::from_yaml(&yaml).unwrap();
        assert_eq!(doc, back);
    }

    #[test]
    fn services_keep_the_executor_labels() {
        let doc = compose();
        let step = &doc.services["step_0"];
        assert_eq!(
            step.labels.get("org.strider.invocation").map(String::as_str),
            Some("07b04ce2-7757-4b21-9e15-0b4c2f44be26")
        );
        assert_eq!(step.logging.as_ref().unwrap().driver, "none");
    }

    #[test]
    fn working_volume_uses_the_local_bind_driver() {
        let doc = compose();
        let vol = &doc.volumes["07b04ce2-7757-4b21-9e15-0b4c2f44be26"];
        assert_eq!(vol.driver, "local");
        assert_eq!(vol.driver_opts.get("o").map(String::as_str), Some("bind"));
        assert_eq!(
            vol.driver_opts.get("type").map(String::as_str),
            Some("none")
        );
    }
}

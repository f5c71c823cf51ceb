use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::container::{ContainerImage, VolumesFrom};
use crate::domain::Env;
use crate::error::ModelResult;
use crate::step::{Step, StepInput};

/// A file-metadata annotation applied to staged and uploaded objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub attribute: String,
    pub value: String,
    pub unit: String,
}

impl FileMetadata {
    /// The porklock `-m attr,value,unit` argument pair for this annotation.
    pub fn arguments(&self) -> Vec<String> {
        vec![
            "-m".to_string(),
            format!("{},{},{}", self.attribute, self.value, self.unit),
        ]
    }
}

/// A decoded job description.
///
/// Treated as immutable after intake; the only mutation the runner performs
/// is augmenting per-step environments with the submitter and invocation
/// identifiers, which happens through [`Job::step_environment`] rather than
/// in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    #[serde(default)]
    pub id: String,
    pub invocation_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_name: String,
    pub submitter: String,
    #[serde(default)]
    pub output_directory: String,
    #[serde(default)]
    pub file_metadata: Vec<FileMetadata>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Job {
    /// Decode a job from the JSON description file.
    pub fn from_json(data: &[u8]) -> ModelResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }

    /// The invocation identifier as a string, the form used for label
    /// values, volume names, and queue names.
    pub fn invocation(&self) -> String {
        self.invocation_id.to_string()
    }

    /// Every distinct image referenced by the job: step images first, then
    /// data-container images, deduplicated by reference.
    pub fn container_images(&self) -> Vec<ContainerImage> {
        let mut seen = Vec::new();
        let mut images = Vec::new();

        for step in &self.steps {
            let img = &step.container.image;
            if !seen.contains(&img.reference()) {
                seen.push(img.reference());
                images.push(img.clone());
            }
        }
        for vf in self.data_containers() {
            if !seen.contains(&vf.image_reference()) {
                seen.push(vf.image_reference());
                images.push(ContainerImage {
                    name: vf.name.clone(),
                    tag: vf.tag.clone(),
                    ..Default::default()
                });
            }
        }
        images
    }

    /// Data-container declarations across all steps, in declared order,
    /// deduplicated by name prefix.
    pub fn data_containers(&self) -> Vec<&VolumesFrom> {
        let mut out: Vec<&VolumesFrom> = Vec::new();
        for step in &self.steps {
            for vf in &step.container.volumes_from {
                if !out.iter().any(|v| v.name_prefix == vf.name_prefix) {
                    out.push(vf);
                }
            }
        }
        out
    }

    /// Inputs across all steps, in declared order.
    pub fn inputs(&self) -> Vec<&StepInput> {
        self.steps.iter().flat_map(|s| s.input.iter()).collect()
    }

    /// The environment for a step, augmented with the submitter and
    /// invocation identifiers.
    pub fn step_environment(&self, step: &Step) -> Env {
        step.environment
            .with_identity(&self.submitter, &self.invocation())
    }

    /// Staged inputs that must not be uploaded back with the outputs.
    fn excluded_outputs(&self) -> Vec<String> {
        self.inputs()
            .into_iter()
            .filter(|i| !i.retain)
            .map(|i| i.local_name().to_string())
            .collect()
    }

    /// The porklock argument vector that uploads the job outputs.
    pub fn final_output_arguments(&self) -> Vec<String> {
        let mut args = vec![
            "put".to_string(),
            "--user".to_string(),
            self.submitter.clone(),
            "--config".to_string(),
            "irods-config".to_string(),
            "--destination".to_string(),
            self.output_directory.clone(),
        ];
        for m in &self.file_metadata {
            args.extend(m.arguments());
        }
        let excluded = self.excluded_outputs();
        if !excluded.is_empty() {
            args.push("--exclude".to_string());
            args.push(excluded.join(","));
        }
        args
    }
}

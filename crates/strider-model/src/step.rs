use serde::{Deserialize, Serialize};

use crate::container::Container;
use crate::domain::Env;
use crate::job::FileMetadata;

/// One container execution within a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Path of the tool executable inside the container.
    #[serde(default)]
    pub executable: String,
    #[serde(default)]
    pub config: StepConfig,
    #[serde(default)]
    pub environment: Env,
    #[serde(default)]
    pub input: Vec<StepInput>,
    pub container: Container,
    /// Wall-clock limit for the step in seconds. Zero means unlimited.
    #[serde(default)]
    pub time_limit_seconds: u64,
}

impl Step {
    /// The argument vector passed to the step container, assembled from the
    /// configured parameters in order.
    pub fn arguments(&self) -> Vec<String> {
        let mut params: Vec<&StepParam> = self.config.params.iter().collect();
        params.sort_by_key(|p| p.order);

        let mut args = Vec::new();
        for param in params {
            if !param.name.is_empty() {
                args.push(param.name.clone());
            }
            if !param.value.is_empty() {
                args.push(param.value.clone());
            }
        }
        args
    }
}

/// Parameterization of a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepConfig {
    #[serde(default)]
    pub params: Vec<StepParam>,
}

/// One command-line parameter of a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepParam {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub order: i32,
}

/// A remote object staged into the working volume before the steps run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInput {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub property: String,
    /// Remote path of the object in the data store.
    pub value: String,
    #[serde(default)]
    pub multiplicity: String,
    /// Whether the staged copy should remain in the uploaded outputs.
    #[serde(default)]
    pub retain: bool,
}

impl StepInput {
    /// Remote path this input is staged from.
    pub fn irods_path(&self) -> &str {
        &self.value
    }

    /// Local file name of the staged copy, used for upload exclusion.
    pub fn local_name(&self) -> &str {
        if self.name.is_empty() {
            self.value.rsplit('/').next().unwrap_or(&self.value)
        } else {
            &self.name
        }
    }

    /// The porklock argument vector that stages this input.
    pub fn arguments(&self, submitter: &str, metadata: &[FileMetadata]) -> Vec<String> {
        let mut args = vec![
            "get".to_string(),
            "--user".to_string(),
            submitter.to_string(),
            "--source".to_string(),
            self.irods_path().to_string(),
            "--config".to_string(),
            "irods-config".to_string(),
        ];
        for m in metadata {
            args.extend(m.arguments());
        }
        args
    }
}

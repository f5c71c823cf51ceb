use strider_model::{
    ContainerType, Device, Env, Job, Labels, Step, StepInput, CONFIG_DIR, WORK_DIR,
};

/// A host-path or named-volume mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bind {
    /// Host path or volume name.
    pub source: String,
    /// Path inside the container.
    pub target: String,
    pub read_only: bool,
}

impl Bind {
    pub fn new(source: impl Into<String>, target: impl Into<String>, read_only: bool) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only,
        }
    }

    /// The `source:target:mode` form the engine expects.
    pub fn render(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!("{}:{}:{}", self.source, self.target, mode)
    }
}

/// Everything needed to create one container.
///
/// Constructed from the job model by the `for_*` builders below, one per
/// container type. Every builder stamps the invocation-identity and
/// container-type labels; cleanup depends on them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub command: Vec<String>,
    pub entrypoint: Option<String>,
    pub working_dir: Option<String>,
    pub env: Env,
    pub labels: Labels,
    pub binds: Vec<Bind>,
    pub volumes_from: Vec<String>,
    pub devices: Vec<Device>,
    pub memory_limit: i64,
    pub cpu_shares: i64,
    pub network_mode: Option<String>,
    pub disable_logging: bool,
}

impl ContainerSpec {
    /// Spec for a step container.
    ///
    /// The working volume is mounted read-write at the step's working
    /// directory and the volumes-from references are resolved to the names
    /// the data containers were created under.
    pub fn for_step(job: &Job, step: &Step, index: usize) -> Self {
        let invocation = job.invocation();
        let container = &step.container;

        let mut binds = vec![Bind::new(
            invocation.clone(),
            container.working_directory(),
            false,
        )];
        for vol in &container.volumes {
            if !vol.host_path.is_empty() {
                binds.push(Bind::new(
                    vol.host_path.clone(),
                    vol.container_path.clone(),
                    vol.read_only,
                ));
            }
        }

        let name = if container.name.is_empty() {
            format!("step-{index}-{invocation}")
        } else {
            container.name.clone()
        };

        Self {
            name,
            image: container.image.reference(),
            command: step.arguments(),
            entrypoint: if container.entry_point.is_empty() {
                None
            } else {
                Some(container.entry_point.clone())
            },
            working_dir: Some(container.working_directory().to_string()),
            env: job.step_environment(step),
            labels: Labels::for_invocation(&invocation, ContainerType::Step),
            binds,
            volumes_from: container
                .volumes_from
                .iter()
                .map(|vf| vf.container_name(&invocation))
                .collect(),
            devices: container.devices.clone(),
            memory_limit: container.memory_limit,
            cpu_shares: container.cpu_shares,
            network_mode: if container.network_mode.is_empty() {
                None
            } else {
                Some(container.network_mode.clone())
            },
            disable_logging: true,
        }
    }

    /// Spec for a one-shot transfer container that stages an input.
    ///
    /// The host working directory is mounted at the config path so porklock
    /// can find its irods-config file.
    pub fn for_input(
        job: &Job,
        input: &StepInput,
        index: usize,
        porklock_image: &str,
        transfer_env: &Env,
        host_config_dir: &str,
    ) -> Self {
        let invocation = job.invocation();
        Self {
            name: format!("input-{index}-{invocation}"),
            image: porklock_image.to_string(),
            command: input.arguments(&job.submitter, &job.file_metadata),
            working_dir: Some(WORK_DIR.to_string()),
            env: transfer_env.clone(),
            labels: Labels::for_invocation(&invocation, ContainerType::Input),
            binds: vec![
                Bind::new(invocation, WORK_DIR, false),
                Bind::new(host_config_dir, CONFIG_DIR, false),
            ],
            disable_logging: true,
            ..Default::default()
        }
    }

    /// Spec for the transfer container that uploads the job outputs.
    pub fn for_upload(
        job: &Job,
        porklock_image: &str,
        transfer_env: &Env,
        host_config_dir: &str,
    ) -> Self {
        let invocation = job.invocation();
        Self {
            name: format!("output-{invocation}"),
            image: porklock_image.to_string(),
            command: job.final_output_arguments(),
            working_dir: Some(WORK_DIR.to_string()),
            env: transfer_env.clone(),
            labels: Labels::for_invocation(&invocation, ContainerType::Output),
            binds: vec![
                Bind::new(invocation, WORK_DIR, false),
                Bind::new(host_config_dir, CONFIG_DIR, false),
            ],
            disable_logging: true,
            ..Default::default()
        }
    }

    /// Spec for a data container: a `/bin/true` run whose only purpose is to
    /// exist so steps can mount from it.
    pub fn for_data(vf: &strider_model::VolumesFrom, invocation_id: &str) -> Self {
        let mut binds = Vec::new();
        if !vf.host_path.is_empty() || !vf.container_path.is_empty() {
            binds.push(Bind::new(
                vf.host_path.clone(),
                vf.container_path.clone(),
                vf.read_only,
            ));
        }
        Self {
            name: vf.container_name(invocation_id),
            image: vf.image_reference(),
            command: vec!["/bin/true".to_string()],
            labels: Labels::for_invocation(invocation_id, ContainerType::Data),
            binds,
            disable_logging: true,
            ..Default::default()
        }
    }
}

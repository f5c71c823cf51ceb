//! Pure assembly of docker CLI argument vectors.
//!
//! Kept free of process spawning so the exact flags the engine sees are
//! unit-testable.
use std::path::Path;

use crate::spec::ContainerSpec;

/// Arguments for `docker create` from a container spec.
pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string()];

    if !spec.name.is_empty() {
        args.push("--name".into());
        args.push(spec.name.clone());
    }
    for (key, value) in spec.labels.iter() {
        args.push("--label".into());
        args.push(format!("{key}={value}"));
    }
    for var in spec.env.iter() {
        args.push("--env".into());
        args.push(var.render());
    }
    for bind in &spec.binds {
        args.push("--volume".into());
        args.push(bind.render());
    }
    for name in &spec.volumes_from {
        args.push("--volumes-from".into());
        args.push(name.clone());
    }
    for dev in &spec.devices {
        args.push("--device".into());
        if dev.cgroup_permissions.is_empty() {
            args.push(format!("{}:{}", dev.host_path, dev.container_path));
        } else {
            args.push(format!(
                "{}:{}:{}",
                dev.host_path, dev.container_path, dev.cgroup_permissions
            ));
        }
    }
    if let Some(workdir) = &spec.working_dir {
        args.push("--workdir".into());
        args.push(workdir.clone());
    }
    if spec.memory_limit > 0 {
        args.push("--memory".into());
        args.push(spec.memory_limit.to_string());
    }
    if spec.cpu_shares > 0 {
        args.push("--cpu-shares".into());
        args.push(spec.cpu_shares.to_string());
    }
    if let Some(mode) = &spec.network_mode {
        args.push("--network".into());
        args.push(mode.clone());
    }
    if spec.disable_logging {
        args.push("--log-driver".into());
        args.push("none".into());
    }
    if let Some(entrypoint) = &spec.entrypoint {
        args.push("--entrypoint".into());
        args.push(entrypoint.clone());
    }

    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}

/// Arguments for `docker volume create` binding a host directory.
pub fn volume_create_args(name: &str, device: &Path) -> Vec<String> {
    vec![
        "volume".into(),
        "create".into(),
        "--driver".into(),
        "local".into(),
        "--opt".into(),
        "type=none".into(),
        "--opt".into(),
        format!("device={}", device.display()),
        "--opt".into(),
        "o=bind".into(),
        name.to_string(),
    ]
}

/// Arguments for `docker ps` filtered by a label.
pub fn list_by_label_args(key: &str, value: &str, all: bool) -> Vec<String> {
    let mut args = vec!["ps".to_string(), "-q".to_string(), "--no-trunc".to_string()];
    if all {
        args.push("-a".into());
    }
    args.push("--filter".into());
    args.push(format!("label={key}={value}"));
    args
}

//! Capability surface the runner uses against the container engine.
//!
//! The [`ContainerBackend`] trait is the interface the lifecycle core is
//! written against; [`docker::DockerCli`] is the production implementation,
//! tests substitute recording stubs.
pub mod backend;
pub mod compose;
pub mod docker;
pub mod error;
pub mod spec;

pub use backend::{ContainerBackend, OutputSink};
pub use compose::JobCompose;
pub use docker::{DockerCli, DockerConfig, PorklockConfig, RegistryAuth};
pub use error::{ExecError, ExecResult};
pub use spec::{Bind, ContainerSpec};

pub mod prelude {
    pub use crate::backend::ContainerBackend;
    pub use crate::docker::{DockerCli, DockerConfig, PorklockConfig};
    pub use crate::error::{ExecError, ExecResult};
    pub use crate::spec::ContainerSpec;
}

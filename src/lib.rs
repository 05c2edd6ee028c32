#![forbid(unsafe_code)]
#![doc = include_str!("../README.md")]

mod builder;
mod cross;
mod error;
mod extension;
mod io;
mod naming;
mod package;
mod registry;
mod runner;
mod session;
mod shell;
#[cfg(test)]
mod testutil;

pub use crate::error::{ConfigError, RunError, TaskResult};
pub use crate::extension::ExtensionSpec;
pub use crate::naming::{
    BUILD_HELPER, FAKE_IDENTITY, MAKEFILE, REFERENCE_CONFIG, binary, host_platform, lib_path,
    tmp_path,
};
pub use crate::package::{ArchiveArtifact, PackageSpec};
pub use crate::registry::{Invocation, TaskKind, TaskNode, TaskRegistry};
pub use crate::session::{ENV_CROSS_VERSIONS, Session};
pub use crate::shell::{ManifestPackager, Packager, ShellToolchain, Toolchain};

/// Install a `tracing` subscriber reading its filter from `RUST_LOG`.
#[cfg(feature = "logging")]
pub fn init_logging() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

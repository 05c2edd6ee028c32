use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::builder;
use crate::error::{ConfigError, RunError};
use crate::extension::ExtensionSpec;
use crate::naming;
use crate::registry::TaskRegistry;
use crate::runner;
use crate::shell::{ManifestPackager, Packager, ShellToolchain, Toolchain};

/// Environment variable holding the `:`-delimited list of runtime versions
/// to cross-build for. Absent, cross builds target the session's own
/// runtime version.
pub const ENV_CROSS_VERSIONS: &str = "CROSS_RUNTIME_VERSIONS";

/// One build session: the shared task registry, the host identity, the
/// removable-path sets and the external collaborators.
///
/// All graph mutation is in-place on nodes inside the registry. That is
/// intentional — the cross-compilation surgery depends on rewriting the same
/// node other edges reference — but it is confined to two designated phases:
/// graph definition ([`define`](Self::define)) and the actions of the
/// `cross` umbrella. Actions never mutate prerequisite lists during ordinary
/// traversal.
pub struct Session {
    pub(crate) registry: TaskRegistry,
    pub(crate) host_platform: String,
    pub(crate) runtime_version: String,
    pub(crate) clean_paths: BTreeSet<Utf8PathBuf>,
    pub(crate) clobber_paths: BTreeSet<Utf8PathBuf>,
    pub(crate) config_store: Utf8PathBuf,
    pub(crate) cross_versions: Option<String>,
    pub(crate) toolchain: Box<dyn Toolchain>,
    pub(crate) packager: Box<dyn Packager>,
}

impl Session {
    /// Create a session for the given runtime version. The host platform is
    /// detected, the cross-version list is captured from
    /// [`ENV_CROSS_VERSIONS`], and the default shell toolchain and manifest
    /// packager are installed.
    pub fn new(runtime_version: impl Into<String>) -> Self {
        Self {
            registry: TaskRegistry::new(),
            host_platform: naming::host_platform(),
            runtime_version: runtime_version.into(),
            clean_paths: BTreeSet::new(),
            clobber_paths: BTreeSet::new(),
            config_store: default_config_store(),
            cross_versions: std::env::var(ENV_CROSS_VERSIONS).ok(),
            toolchain: Box::new(ShellToolchain::default()),
            packager: Box::new(ManifestPackager::default()),
        }
    }

    /// Override the detected host platform.
    pub fn with_host_platform(mut self, platform: impl Into<String>) -> Self {
        self.host_platform = platform.into();
        self
    }

    /// Override the cross-toolchain config store location.
    pub fn with_config_store(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.config_store = path.into();
        self
    }

    /// Override the captured cross-version list (same format as
    /// [`ENV_CROSS_VERSIONS`]).
    pub fn with_cross_versions(mut self, versions: impl Into<String>) -> Self {
        self.cross_versions = Some(versions.into());
        self
    }

    pub fn with_toolchain(mut self, toolchain: Box<dyn Toolchain>) -> Self {
        self.toolchain = toolchain;
        self
    }

    pub fn with_packager(mut self, packager: Box<dyn Packager>) -> Self {
        self.packager = packager;
        self
    }

    pub fn host_platform(&self) -> &str {
        &self.host_platform
    }

    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// Read access to the task registry, mostly useful for inspection.
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Build the task graph for one extension. Fatal if the extension name
    /// is empty; every other construction step is a side-effect-only
    /// registration.
    pub fn define(&mut self, spec: &ExtensionSpec) -> Result<(), ConfigError> {
        builder::define(self, spec)
    }

    /// Run a task and its prerequisites.
    pub fn invoke(&mut self, key: &str) -> Result<(), RunError> {
        runner::invoke(self, key)
    }

    /// Run several tasks in order, e.g. `["cross", "compile", "native"]`.
    pub fn invoke_all<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), RunError> {
        for key in keys {
            self.invoke(key)?;
        }

        Ok(())
    }

    /// Paths removed by [`clean`](Self::clean): the transient per-combination
    /// temp build directories.
    pub fn clean_paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.clean_paths.iter().map(Utf8PathBuf::as_path)
    }

    /// Paths removed by [`clobber`](Self::clobber) on top of the clean set:
    /// final binaries and the temp root.
    pub fn clobber_paths(&self) -> impl Iterator<Item = &Utf8Path> {
        self.clobber_paths.iter().map(Utf8PathBuf::as_path)
    }

    /// Remove the transient build directories.
    pub fn clean(&self) -> std::io::Result<()> {
        for path in &self.clean_paths {
            remove_path(path)?;
        }

        Ok(())
    }

    /// Remove everything this session can rebuild: the clean set, the final
    /// binaries and the temp root.
    pub fn clobber(&self) -> std::io::Result<()> {
        self.clean()?;

        for path in &self.clobber_paths {
            remove_path(path)?;
        }

        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("host_platform", &self.host_platform)
            .field("runtime_version", &self.runtime_version)
            .field("tasks", &self.registry.len())
            .finish()
    }
}

fn default_config_store() -> Utf8PathBuf {
    match std::env::var("HOME") {
        Ok(home) => Utf8PathBuf::from(home).join(".crosstask/config.json"),
        Err(_) => Utf8PathBuf::from(".crosstask/config.json"),
    }
}

fn remove_path(path: &Utf8Path) -> std::io::Result<()> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

//! The packaging bridge: derives a concrete, per-platform package
//! descriptor from the caller's generic one and delegates archive creation
//! to the [`Packager`](crate::Packager) collaborator.

use serde::{Deserialize, Serialize};

use camino::Utf8PathBuf;

use crate::error::TaskResult;
use crate::extension::ExtensionSpec;
use crate::naming;
use crate::registry::{Invocation, TaskKind};
use crate::session::Session;

/// A package descriptor.
///
/// The caller supplies one with the [`GENERIC`](Self::GENERIC) platform tag;
/// packaging tasks clone it per target platform, overwrite the tag, clear
/// the extension-script list (built binaries ship as plain files) and append
/// the binary paths. The caller's original is never mutated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub version: String,
    /// Platform tag; [`GENERIC`](Self::GENERIC) means "not yet bound to a
    /// native platform".
    pub platform: String,
    /// Files shipped in the archive.
    #[serde(default)]
    pub files: Vec<String>,
    /// Extension configure scripts an installer would have to build. Cleared
    /// in derived descriptors.
    #[serde(default)]
    pub extensions: Vec<String>,
    /// Minimum runtime version constraint, e.g. `">= 3.2"`.
    #[serde(default)]
    pub required_runtime: Option<String>,
}

impl PackageSpec {
    /// Platform tag of a descriptor not yet specialized to any native
    /// platform. Packaging only ever starts from a generic descriptor.
    pub const GENERIC: &'static str = "generic";

    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            platform: Self::GENERIC.into(),
            files: Vec::new(),
            extensions: Vec::new(),
            required_runtime: None,
        }
    }
}

/// Archive descriptor returned by the packaging collaborator; consumed to
/// wire the final dependency edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifact {
    pub output_dir: Utf8PathBuf,
    pub file_name: String,
}

/// Minimum-runtime constraint for the major runtime line being targeted.
fn runtime_floor(version: &str) -> String {
    let mut parts = version.split('.');

    match (parts.next(), parts.next()) {
        (Some(major), Some(minor)) => format!(">= {major}.{minor}"),
        _ => format!(">= {version}"),
    }
}

/// Register the packaging tasks for one (platform, version) combination.
///
/// No-op unless the extension carries a package descriptor that still has
/// the generic platform tag. Registers `native:<pkg>:<platform>` once per
/// platform, chains it under `native:<platform>`, and — only for the host
/// platform — under `native:<pkg>` and the global `native` umbrella.
pub(crate) fn define_package(
    session: &mut Session,
    spec: &ExtensionSpec,
    platform: &str,
    version: &str,
) {
    let Some(base) = &spec.package else { return };
    if base.platform != PackageSpec::GENERIC {
        return;
    }

    let lib_binary = naming::lib_path(&spec.lib_dir, &spec.name, platform);
    let copy_key = format!("copy:{}:{platform}:{version}", spec.name);

    // The packaged binary needs copy-wiring even off-host, where the
    // host-match gate did not create the lib file node.
    session
        .registry
        .register(lib_binary.as_str(), TaskKind::File)
        .prereq(copy_key);

    let pkg_key = format!("native:{}:{platform}", base.name);

    if !session.registry.contains(&pkg_key) {
        let base = base.clone();
        let platform = platform.to_string();
        let version = version.to_string();

        session
            .registry
            .register(pkg_key.as_str(), TaskKind::Phony)
            .prereq(lib_binary.as_str())
            .action(move |session, inv| package_action(session, inv, &base, &platform, &version));
    }

    let plat_key = format!("native:{platform}");
    session
        .registry
        .register(plat_key.as_str(), TaskKind::Phony)
        .prereq(pkg_key.as_str());

    if platform == session.host_platform {
        session
            .registry
            .register(format!("native:{}", base.name), TaskKind::Phony)
            .prereq(pkg_key.as_str());
        session
            .registry
            .register("native", TaskKind::Phony)
            .prereq(plat_key);
    }
}

/// Derive the concrete descriptor and hand it to the packager.
fn package_action(
    session: &mut Session,
    inv: &Invocation,
    base: &PackageSpec,
    platform: &str,
    version: &str,
) -> TaskResult<()> {
    // Every file-kind prerequisite is a binary this package ships.
    let binaries: Vec<String> = inv
        .prereqs
        .iter()
        .filter(|key| {
            session
                .registry
                .get(key)
                .is_some_and(|node| node.kind() == TaskKind::File)
        })
        .map(|key| key.to_string())
        .collect();

    let mut derived = base.clone();
    derived.platform = platform.into();
    derived.extensions.clear();
    derived.required_runtime = Some(runtime_floor(version));

    for binary in &binaries {
        if !derived.files.contains(binary) {
            derived.files.push(binary.clone());
        }
    }

    tracing::info!("packaging {} for {platform}", derived.name);
    let artifact = session.packager.package(&derived)?;

    // Wire the archive build to the binary copies.
    let archive = artifact.output_dir.join(&artifact.file_name);
    let node = session.registry.register(archive.as_str(), TaskKind::File);
    for binary in binaries {
        node.prereq(binary);
    }

    Ok(())
}

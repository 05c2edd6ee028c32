//! Task graph construction: the per-combination subgraph and the platform
//! fan-out.
//!
//! One call to [`define_combination`] registers the full chain for a single
//! (platform, runtime-version) pair:
//!
//! ```text
//! compile ── compile:<platform> ── compile:<name>:<platform>
//!                                        │
//!                              copy:<name>:<platform>:<version>
//!                               │                      │
//!                        dir(lib_dir)        tmp/<name>.<ext>  (make)
//!                                             │            │
//!                                      tmp/Makefile     sources…
//!                                       │        │
//!                                  dir(tmp)   configure script
//! ```
//!
//! Only the host combination is wired into the global `compile` chain (the
//! host-match gate). Cross combinations stay reachable solely through their
//! per-platform keys until the cross surgery activates them.

use camino::Utf8PathBuf;

use crate::cross;
use crate::error::{ConfigError, TaskResult};
use crate::extension::ExtensionSpec;
use crate::io;
use crate::naming;
use crate::package;
use crate::registry::{Invocation, TaskKind};
use crate::session::Session;

/// Fan out over every configured platform/version combination: the host
/// subgraph always, packaging when the descriptor is still generic, one
/// cross rewrite per cross target.
pub(crate) fn define(session: &mut Session, spec: &ExtensionSpec) -> Result<(), ConfigError> {
    if spec.name.trim().is_empty() {
        return Err(ConfigError::MissingName);
    }

    let host = session.host_platform.clone();
    let version = session.runtime_version.clone();

    define_combination(session, spec, &host, &version)?;
    package::define_package(session, spec, &host, &version);

    if spec.cross_compile {
        for target in &spec.cross_platforms {
            cross::define_cross(session, spec, target)?;
        }
    }

    Ok(())
}

/// Register the subgraph for one (platform, version) combination. Running
/// this twice for the same triple is idempotent: every registration is
/// check-before-create and every edge is deduplicated.
pub(crate) fn define_combination(
    session: &mut Session,
    spec: &ExtensionSpec,
    platform: &str,
    version: &str,
) -> Result<(), ConfigError> {
    let tmp = naming::tmp_path(&spec.tmp_dir, platform, &spec.name, version);
    let binary = naming::binary(&spec.name, platform);
    let tmp_binary = tmp.join(&binary);
    let lib_binary = spec.lib_dir.join(&binary);

    tracing::debug!("defining {}:{platform}:{version}", spec.name);

    // Removable paths: the combination dir is transient; the final binary
    // and the temp root only go away on a full clobber.
    session.clean_paths.insert(tmp.clone());
    session.clobber_paths.insert(lib_binary.clone());
    session.clobber_paths.insert(spec.tmp_dir.clone());

    session.registry.register(tmp.as_str(), TaskKind::Directory);
    session
        .registry
        .register(spec.lib_dir.as_str(), TaskKind::Directory);

    let copy_key = format!("copy:{}:{platform}:{version}", spec.name);
    if !session.registry.contains(&copy_key) {
        let src = tmp_binary.clone();
        let dst = lib_binary.clone();

        session
            .registry
            .register(copy_key.as_str(), TaskKind::Phony)
            .prereq(spec.lib_dir.as_str())
            .prereq(tmp_binary.as_str())
            .action(move |_, _| io::copy_file(&src, &dst));
    }

    let makefile = tmp.join(naming::MAKEFILE);

    if !session.registry.contains(tmp_binary.as_str()) {
        let sources = resolve_sources(spec)?;
        let dir = tmp.clone();

        let node = session.registry.register(tmp_binary.as_str(), TaskKind::File);
        node.prereq(makefile.as_str());
        for source in &sources {
            node.prereq(source.as_str());
        }
        node.action(move |session, _| session.toolchain.build(&dir));
    }

    if !session.registry.contains(makefile.as_str()) {
        let dir = tmp.clone();
        let script = spec.source_dir.join(&spec.config_script);
        let options = spec.config_options.clone();
        let cross_options = spec.cross_config_options.clone();

        session
            .registry
            .register(makefile.as_str(), TaskKind::File)
            .prereq(tmp.as_str())
            .prereq(script.as_str())
            .action(move |session, inv| {
                configure(session, inv, &dir, &script, &options, &cross_options)
            });
    }

    // Global and per-extension umbrellas exist exactly once per session.
    session.registry.register("compile", TaskKind::Phony);
    let ext_key = format!("compile:{}", spec.name);
    session.registry.register(ext_key.as_str(), TaskKind::Phony);

    let comb_key = format!("compile:{}:{platform}", spec.name);
    session
        .registry
        .register(comb_key.as_str(), TaskKind::Phony)
        .prereq(copy_key.as_str());

    let plat_key = format!("compile:{platform}");
    session
        .registry
        .register(plat_key.as_str(), TaskKind::Phony)
        .prereq(comb_key.as_str());

    // Host-match gate: only the host combination joins the global chain.
    if platform == session.host_platform {
        session
            .registry
            .register(lib_binary.as_str(), TaskKind::File)
            .prereq(copy_key.as_str());

        if let Some(node) = session.registry.get_mut(&ext_key) {
            node.prereq(comb_key.as_str());
        }
        if let Some(node) = session.registry.get_mut("compile") {
            node.prereq(plat_key.as_str());
        }
    }

    Ok(())
}

/// Compose and run the configure invocation. The same code path serves host
/// and cross builds; prerequisite-set membership is the only discriminator.
fn configure(
    session: &mut Session,
    inv: &Invocation,
    dir: &Utf8PathBuf,
    script: &Utf8PathBuf,
    options: &[String],
    cross_options: &[String],
) -> TaskResult<()> {
    let mut argv = vec!["-I.".to_string()];

    // A fake-identity prerequisite means this is a cross build; preload the
    // identity override before the configure script runs.
    if inv.has_prereq_named(naming::FAKE_IDENTITY) {
        argv.push(naming::FAKE_PRELOAD_FLAG.to_string());
    }

    argv.push(io::absolute(script).into_string());
    argv.extend(options.iter().cloned());

    if inv.has_prereq_named(naming::REFERENCE_CONFIG) {
        argv.extend(cross_options.iter().cloned());
    }

    session.toolchain.configure(dir, &argv)
}

/// Resolve the source file set once, at definition time. An empty match set
/// is not an error; a Makefile might still know how to build, and a missing
/// source only surfaces as a downstream build failure.
fn resolve_sources(spec: &ExtensionSpec) -> Result<Vec<Utf8PathBuf>, ConfigError> {
    let pattern = spec.source_dir.join(&spec.source_pattern);
    let mut sources = Vec::new();

    for entry in glob::glob(pattern.as_str())? {
        sources.push(Utf8PathBuf::try_from(entry?)?);
    }

    sources.sort();
    Ok(sources)
}

//! The cross-compilation rewriter.
//!
//! A cross target gets the same subgraph shape as a host build, plus an
//! isolated toolchain shim next to its Makefile: a generated `fake.rt`
//! identity override and copies of the reference runtime configuration and
//! the Makefile-generating helper. The subgraph is inert — the host-match
//! gate never wired it into `compile` — until the `cross` umbrella task is
//! invoked, whose action performs the graph surgery that retargets the
//! top-level entrypoints.
//!
//! Surgery is additive and idempotent: each invocation removes only the
//! host-wired edges and adds its own target's edge, so configuring several
//! cross targets in one run never discards another target's wiring.

use std::collections::BTreeMap;
use std::fs;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use crate::builder;
use crate::error::ConfigError;
use crate::extension::ExtensionSpec;
use crate::io;
use crate::naming;
use crate::package::PackageSpec;
use crate::registry::{Invocation, TaskKind};
use crate::session::Session;

/// Define the cross subgraph for one target platform, once per runtime
/// version in the captured cross-version list.
pub(crate) fn define_cross(
    session: &mut Session,
    spec: &ExtensionSpec,
    target: &str,
) -> Result<(), ConfigError> {
    let versions: Vec<String> = match &session.cross_versions {
        Some(list) => list
            .split(':')
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect(),
        None => vec![session.runtime_version.clone()],
    };

    for version in &versions {
        define_cross_combination(session, spec, target, version)?;
    }

    Ok(())
}

fn define_cross_combination(
    session: &mut Session,
    spec: &ExtensionSpec,
    target: &str,
    version: &str,
) -> Result<(), ConfigError> {
    // Missing config store or version entry degrades gracefully: warn and
    // skip this combination, leaving the registry untouched.
    let Some(config_path) = resolve_config(&session.config_store, version) else {
        return Ok(());
    };

    let Some(helper_src) = build_helper_path(&config_path) else {
        warn!(
            "can't locate '{}' near '{config_path}', not cross-compiling for {version}",
            naming::BUILD_HELPER
        );
        return Ok(());
    };

    builder::define_combination(session, spec, target, version)?;

    let tmp = naming::tmp_path(&spec.tmp_dir, target, &spec.name, version);
    let makefile = tmp.join(naming::MAKEFILE);
    let fake = tmp.join(naming::FAKE_IDENTITY);
    let reference = tmp.join(naming::REFERENCE_CONFIG);
    let helper = tmp.join(naming::BUILD_HELPER);

    if !session.registry.contains(fake.as_str()) {
        let path = fake.clone();
        let content = fake_identity(target, version);

        session
            .registry
            .register(fake.as_str(), TaskKind::File)
            .prereq(tmp.as_str())
            .action(move |_, _| {
                fs::write(&path, &content).with_context(|| format!("failed to write '{path}'"))?;
                Ok(())
            });
    }

    if !session.registry.contains(reference.as_str()) {
        let src = config_path.clone();
        let dst = reference.clone();

        session
            .registry
            .register(reference.as_str(), TaskKind::File)
            .prereq(tmp.as_str())
            .prereq(config_path.as_str())
            .action(move |_, _| io::copy_file(&src, &dst));
    }

    if !session.registry.contains(helper.as_str()) {
        let src = helper_src.clone();
        let dst = helper.clone();

        session
            .registry
            .register(helper.as_str(), TaskKind::File)
            .prereq(tmp.as_str())
            .prereq(helper_src.as_str())
            .action(move |_, _| io::copy_file(&src, &dst));
    }

    // The shim files join the Makefile node's prerequisites; their presence
    // there is what flips the configure action into cross mode.
    if let Some(node) = session.registry.get_mut(makefile.as_str()) {
        node.prereq(fake.as_str())
            .prereq(reference.as_str())
            .prereq(helper.as_str());
    }

    let packaged = spec
        .package
        .as_ref()
        .is_some_and(|base| base.platform == PackageSpec::GENERIC);
    if packaged {
        crate::package::define_package(session, spec, target, version);
    }

    // The surgery runs when `cross` is invoked, never at definition time.
    // The filter is additive: it removes only the host-wired edges, so
    // edges installed by other targets' surgery survive repetition.
    let host = session.host_platform.clone();
    let target = target.to_string();
    let lib_binary = naming::lib_path(&spec.lib_dir, &spec.name, &target);
    let copy_key = format!("copy:{}:{target}:{version}", spec.name);

    session.registry.register("cross", TaskKind::Phony).action(
        move |session: &mut Session, _: &Invocation| {
            info!("retargeting compile to {target}");

            if let Some(node) = session.registry.get_mut("compile") {
                node.remove_prereq(&format!("compile:{host}"));
                node.prereq(format!("compile:{target}"));
            }

            // The final-binary node, if the host build created one under
            // the same name, still points at the host copy task. Rewire it
            // to the single correct cross copy.
            if let Some(node) = session.registry.get_mut(lib_binary.as_str()) {
                node.clear_prereqs();
                node.prereq(copy_key.as_str());
            }

            if packaged {
                if let Some(node) = session.registry.get_mut("native") {
                    node.remove_prereq(&format!("native:{host}"));
                    node.prereq(format!("native:{target}"));
                }
            }

            Ok(())
        },
    );

    Ok(())
}

/// Look up `config-<version>` in the JSON config store. Any miss is a soft
/// failure: warn and return `None`.
fn resolve_config(store: &Utf8Path, version: &str) -> Option<Utf8PathBuf> {
    let text = match fs::read_to_string(store) {
        Ok(text) => text,
        Err(_) => {
            warn!("cross config store '{store}' not found, not cross-compiling for {version}");
            return None;
        }
    };

    let records: BTreeMap<String, String> = match serde_json::from_str(&text) {
        Ok(records) => records,
        Err(err) => {
            warn!("cross config store '{store}' is unreadable ({err}), skipping {version}");
            return None;
        }
    };

    let key = format!("config-{version}");
    match records.get(&key) {
        Some(path) => Some(Utf8PathBuf::from(path)),
        None => {
            warn!("no '{key}' in '{store}', not cross-compiling for {version}");
            None
        }
    }
}

/// The build helper ships next to the reference configuration, one
/// directory up: `dirname(config)/../mkbuild.rt`.
fn build_helper_path(config_path: &Utf8Path) -> Option<Utf8PathBuf> {
    config_path
        .parent()
        .and_then(Utf8Path::parent)
        .map(|dir| dir.join(naming::BUILD_HELPER))
}

/// Content of the identity override preloaded during cross configure runs.
/// Deterministic in (platform, version) so the file task never goes stale.
fn fake_identity(platform: &str, version: &str) -> String {
    format!(
        "# Generated by crosstask. Makes the configure script believe it is\n\
         # running under the cross target.\n\
         RUNTIME_PLATFORM = \"{platform}\"\n\
         RUNTIME_VERSION = \"{version}\"\n"
    )
}

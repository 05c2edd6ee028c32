//! Shared fixtures for the in-module tests.

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};

use crate::error::TaskResult;
use crate::extension::ExtensionSpec;
use crate::package::{ArchiveArtifact, PackageSpec};
use crate::shell::{Packager, Toolchain};

pub(crate) type Calls = Arc<Mutex<Vec<String>>>;

/// Records configure/build invocations and fabricates their outputs: the
/// Makefile on configure, the named product on build.
pub(crate) struct StubToolchain {
    product: String,
    calls: Calls,
}

impl StubToolchain {
    pub(crate) fn new(product: &str) -> (Box<dyn Toolchain>, Calls) {
        let calls = Calls::default();
        let stub = Self {
            product: product.to_string(),
            calls: calls.clone(),
        };

        (Box::new(stub), calls)
    }
}

impl Toolchain for StubToolchain {
    fn configure(&self, dir: &Utf8Path, args: &[String]) -> TaskResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("configure {dir} {}", args.join(" ")));
        fs::write(dir.join("Makefile"), "all:\n")?;
        Ok(())
    }

    fn build(&self, dir: &Utf8Path) -> TaskResult<()> {
        self.calls.lock().unwrap().push(format!("build {dir}"));
        fs::write(dir.join(&self.product), "binary")?;
        Ok(())
    }
}

pub(crate) type Packaged = Arc<Mutex<Vec<PackageSpec>>>;

/// Records the derived descriptors it is handed; writes nothing.
pub(crate) struct StubPackager {
    out_dir: Utf8PathBuf,
    packaged: Packaged,
}

impl StubPackager {
    pub(crate) fn new(out_dir: Utf8PathBuf) -> (Box<dyn Packager>, Packaged) {
        let packaged = Packaged::default();
        let stub = Self {
            out_dir,
            packaged: packaged.clone(),
        };

        (Box::new(stub), packaged)
    }
}

impl Packager for StubPackager {
    fn package(&self, spec: &PackageSpec) -> TaskResult<ArchiveArtifact> {
        self.packaged.lock().unwrap().push(spec.clone());

        Ok(ArchiveArtifact {
            output_dir: self.out_dir.clone(),
            file_name: format!("{}-{}-{}.json", spec.name, spec.version, spec.platform),
        })
    }
}

pub(crate) fn utf8(path: &std::path::Path) -> Utf8PathBuf {
    Utf8Path::from_path(path)
        .expect("tempdir path should be UTF-8")
        .to_owned()
}

/// An extension rooted inside `root` with one C source and a configure
/// script on disk.
pub(crate) fn fixture_spec(root: &Utf8Path, name: &str) -> ExtensionSpec {
    let source_dir = root.join("ext").join(name);
    fs::create_dir_all(&source_dir).unwrap();
    fs::write(source_dir.join(format!("{name}.c")), "int init;\n").unwrap();
    fs::write(source_dir.join("extconf.rt"), "create_makefile\n").unwrap();

    ExtensionSpec::new(name)
        .source_dir(source_dir)
        .lib_dir(root.join("lib"))
        .tmp_dir(root.join("tmp"))
}

/// Create (or extend) a cross-toolchain config store under `root` with an
/// entry for `version`, plus the reference config and build helper files it
/// points at. Returns the store path.
pub(crate) fn cross_store(root: &Utf8Path, version: &str) -> Utf8PathBuf {
    let cross_dir = root.join("cross");
    let config_dir = cross_dir.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config = config_dir.join(format!("rtconfig-{version}.rt"));
    fs::write(&config, format!("platform config for {version}\n")).unwrap();
    fs::write(cross_dir.join("mkbuild.rt"), "makefile helper\n").unwrap();

    let store = root.join("config.json");
    let mut records: BTreeMap<String, String> = match fs::read_to_string(&store) {
        Ok(text) => serde_json::from_str(&text).unwrap(),
        Err(_) => BTreeMap::new(),
    };
    records.insert(format!("config-{version}"), config.to_string());
    fs::write(&store, serde_json::to_string(&records).unwrap()).unwrap();

    store
}

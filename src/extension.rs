use camino::Utf8PathBuf;

use crate::package::PackageSpec;

/// Identity and configuration of one native extension to build.
///
/// Construct it with the builder-style methods, then hand it to
/// [`Session::define`](crate::Session::define). The spec is immutable once
/// graph construction begins; the builder owns it only for the duration of
/// `define`.
///
/// # Example
///
/// ```rust
/// use crosstask::ExtensionSpec;
///
/// let spec = ExtensionSpec::new("foo")
///     .config_option("--with-foo-dir=/opt/foo")
///     .cross_platform("i386-mingw32");
/// ```
#[derive(Debug, Clone)]
pub struct ExtensionSpec {
    pub(crate) name: String,
    pub(crate) source_dir: Utf8PathBuf,
    pub(crate) source_pattern: String,
    pub(crate) lib_dir: Utf8PathBuf,
    pub(crate) tmp_dir: Utf8PathBuf,
    pub(crate) config_script: String,
    pub(crate) config_options: Vec<String>,
    pub(crate) cross_compile: bool,
    pub(crate) cross_platforms: Vec<String>,
    pub(crate) cross_config_options: Vec<String>,
    pub(crate) package: Option<PackageSpec>,
}

impl ExtensionSpec {
    /// Create a spec with the conventional layout: sources under
    /// `ext/<name>`, output under `lib`, scratch space under `tmp`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            source_dir: Utf8PathBuf::from("ext").join(&name),
            source_pattern: "*.c".into(),
            lib_dir: "lib".into(),
            tmp_dir: "tmp".into(),
            config_script: "extconf.rt".into(),
            config_options: Vec::new(),
            cross_compile: false,
            cross_platforms: Vec::new(),
            cross_config_options: Vec::new(),
            package: None,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding the C sources and the configure script.
    pub fn source_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.source_dir = dir.into();
        self
    }

    /// Glob matched against `source_dir` to find the sources the binary
    /// depends on. An empty match set is not an error here; the Makefile may
    /// still know how to build.
    pub fn source_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.source_pattern = pattern.into();
        self
    }

    /// Directory the built binary is copied into.
    pub fn lib_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.lib_dir = dir.into();
        self
    }

    /// Root of the per-combination temp build directories.
    pub fn tmp_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.tmp_dir = dir.into();
        self
    }

    /// Name of the configure script inside `source_dir`.
    pub fn config_script(mut self, script: impl Into<String>) -> Self {
        self.config_script = script.into();
        self
    }

    /// Extra option passed to every configure invocation.
    pub fn config_option(mut self, option: impl Into<String>) -> Self {
        self.config_options.push(option.into());
        self
    }

    /// Add a cross-compilation target and enable cross-compilation.
    pub fn cross_platform(mut self, platform: impl Into<String>) -> Self {
        self.cross_platforms.push(platform.into());
        self.cross_compile = true;
        self
    }

    /// Extra option passed to configure only for cross builds.
    pub fn cross_config_option(mut self, option: impl Into<String>) -> Self {
        self.cross_config_options.push(option.into());
        self
    }

    /// Base package descriptor; packaging tasks are only defined when its
    /// platform tag is still [`PackageSpec::GENERIC`].
    pub fn package(mut self, package: PackageSpec) -> Self {
        self.package = Some(package);
        self
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_conventional_defaults() {
        let spec = ExtensionSpec::new("foo");
        assert_eq!(spec.source_dir, Utf8PathBuf::from("ext/foo"));
        assert_eq!(spec.source_pattern, "*.c");
        assert_eq!(spec.lib_dir, Utf8PathBuf::from("lib"));
        assert_eq!(spec.tmp_dir, Utf8PathBuf::from("tmp"));
        assert!(!spec.cross_compile);
    }

    #[test]
    fn test_cross_platform_enables_cross_compile() {
        let spec = ExtensionSpec::new("foo")
            .cross_platform("i386-mingw32")
            .cross_platform("x64-mingw-ucrt");

        assert!(spec.cross_compile);
        assert_eq!(spec.cross_platforms.len(), 2);
    }
}

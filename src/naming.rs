//! Canonical names and paths for build artifacts.
//!
//! Everything here is a pure function of the configuration strings; no I/O,
//! no failure modes. The task graph builder and the cross rewriter both key
//! their file tasks by these paths, so deriving them in one place is what
//! keeps duplicate registration checks meaningful.

use camino::{Utf8Path, Utf8PathBuf};

/// File produced by the configure step, consumed by the native build.
pub const MAKEFILE: &str = "Makefile";

/// Generated runtime-identity override, present only in cross builds.
pub const FAKE_IDENTITY: &str = "fake.rt";

/// Reference runtime configuration copied from the cross toolchain.
pub const REFERENCE_CONFIG: &str = "rtconfig.rt";

/// Makefile-generating helper copied from the cross toolchain.
pub const BUILD_HELPER: &str = "mkbuild.rt";

/// Interpreter flag preloading the fake identity during configure.
pub const FAKE_PRELOAD_FLAG: &str = "-rfake";

/// Temp build directory for one (platform, version) combination.
pub fn tmp_path(tmp_root: &Utf8Path, platform: &str, name: &str, version: &str) -> Utf8PathBuf {
    tmp_root.join(platform).join(name).join(version)
}

/// Binary file name for an extension on a given platform.
///
/// The platform match is a best-effort heuristic, not a platform database:
/// unrecognized platform strings fall back to the *host's* dynamic-library
/// extension, which may be wrong when cross-compiling to an exotic target.
pub fn binary(name: &str, platform: &str) -> String {
    let ext = if platform.contains("darwin") {
        "bundle"
    } else if ["mingw", "mswin", "linux"].iter().any(|p| platform.contains(p)) {
        "so"
    } else {
        std::env::consts::DLL_EXTENSION
    };

    format!("{name}.{ext}")
}

/// Final location of the built binary inside the extension's lib dir.
pub fn lib_path(lib_dir: &Utf8Path, name: &str, platform: &str) -> Utf8PathBuf {
    lib_dir.join(binary(name, platform))
}

/// Platform identifier of the machine the orchestration itself runs on.
pub fn host_platform() -> String {
    let arch = std::env::consts::ARCH;

    match std::env::consts::OS {
        "macos" => format!("{arch}-darwin"),
        "windows" => format!("{arch}-mingw32"),
        os => format!("{arch}-{os}"),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tmp_path_layout() {
        let path = tmp_path(Utf8Path::new("tmp"), "x86_64-linux", "foo", "3.2.0");
        assert_eq!(path, Utf8Path::new("tmp/x86_64-linux/foo/3.2.0"));
    }

    #[test]
    fn test_binary_darwin() {
        assert_eq!(binary("foo", "arm64-darwin24"), "foo.bundle");
    }

    #[test]
    fn test_binary_shared_object() {
        assert_eq!(binary("foo", "x86_64-linux"), "foo.so");
        assert_eq!(binary("foo", "i386-mingw32"), "foo.so");
        assert_eq!(binary("foo", "x64-mswin64"), "foo.so");
    }

    #[test]
    fn test_binary_fallback_is_host_extension() {
        let name = binary("foo", "some-exotic-platform");
        let ext = name.strip_prefix("foo.").unwrap();
        assert!(!ext.is_empty());
        assert_eq!(ext, std::env::consts::DLL_EXTENSION);
    }

    #[test]
    fn test_lib_path() {
        let path = lib_path(Utf8Path::new("lib"), "foo", "x86_64-linux");
        assert_eq!(path, Utf8Path::new("lib/foo.so"));
    }

    #[test]
    fn test_host_platform_is_non_empty() {
        let host = host_platform();
        assert!(host.contains('-'));
    }
}

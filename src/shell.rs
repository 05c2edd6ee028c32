//! Seams to the external tools the graph shells out to. The core never
//! parses compiler output or understands C; it only needs exit codes.

use std::fs;
use std::process::Command;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};

use crate::error::TaskResult;
use crate::package::{ArchiveArtifact, PackageSpec};

/// Invokes the configure script and the Makefile-driven native build.
pub trait Toolchain: Send + Sync {
    /// Run the runtime interpreter on the configure script inside `dir`,
    /// with the composed argument list. Produces the Makefile as a side
    /// effect; non-zero exit is an error.
    fn configure(&self, dir: &Utf8Path, args: &[String]) -> TaskResult<()>;

    /// Run the Makefile-driven build inside `dir`. Success is exit code
    /// zero.
    fn build(&self, dir: &Utf8Path) -> TaskResult<()>;
}

/// Default [`Toolchain`] shelling out to the runtime interpreter and
/// `make`/`nmake` via `std::process::Command`.
pub struct ShellToolchain {
    interpreter: String,
    make: String,
}

impl ShellToolchain {
    pub fn new(interpreter: impl Into<String>, make: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            make: make.into(),
        }
    }
}

impl Default for ShellToolchain {
    fn default() -> Self {
        let interpreter = std::env::var("CROSSTASK_RUNTIME").unwrap_or_else(|_| "rt".into());
        let make = if cfg!(windows) { "nmake" } else { "make" };

        Self::new(interpreter, make)
    }
}

impl Toolchain for ShellToolchain {
    fn configure(&self, dir: &Utf8Path, args: &[String]) -> TaskResult<()> {
        let status = Command::new(&self.interpreter)
            .args(args)
            .current_dir(dir)
            .status()
            .with_context(|| format!("failed to spawn '{}'", self.interpreter))?;

        anyhow::ensure!(status.success(), "configure failed in '{dir}' ({status})");
        Ok(())
    }

    fn build(&self, dir: &Utf8Path) -> TaskResult<()> {
        let status = Command::new(&self.make)
            .current_dir(dir)
            .status()
            .with_context(|| format!("failed to spawn '{}'", self.make))?;

        anyhow::ensure!(status.success(), "native build failed in '{dir}' ({status})");
        Ok(())
    }
}

/// Materializes a distributable archive from a derived package descriptor.
pub trait Packager: Send + Sync {
    fn package(&self, spec: &PackageSpec) -> TaskResult<ArchiveArtifact>;
}

/// Default [`Packager`]: writes the descriptor as a JSON manifest under the
/// output directory and reports it as the archive artifact.
pub struct ManifestPackager {
    out_dir: Utf8PathBuf,
}

impl ManifestPackager {
    pub fn new(out_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl Default for ManifestPackager {
    fn default() -> Self {
        Self::new("pkg")
    }
}

impl Packager for ManifestPackager {
    fn package(&self, spec: &PackageSpec) -> TaskResult<ArchiveArtifact> {
        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create '{}'", self.out_dir))?;

        let file_name = format!("{}-{}-{}.json", spec.name, spec.version, spec.platform);
        let path = self.out_dir.join(&file_name);
        let json = serde_json::to_string_pretty(spec)?;
        fs::write(&path, json).with_context(|| format!("failed to write '{path}'"))?;

        Ok(ArchiveArtifact {
            output_dir: self.out_dir.clone(),
            file_name,
        })
    }
}

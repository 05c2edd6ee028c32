use std::fmt::Display;
use std::fs;
use std::time::{Instant, SystemTime};

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use console::Style;

use crate::error::TaskResult;

const ANSI_BLUE: Style = Style::new().blue();

pub(crate) fn as_overhead(s: Instant) -> impl Display {
    let e = Instant::now();
    let f = format!("(+{}ms)", e.duration_since(s).as_millis());
    ANSI_BLUE.apply_to(f)
}

/// Modification time of a file, if it exists.
pub(crate) fn mtime(path: &Utf8Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

/// Copy a single file. A missing source is a hard error, never a silent
/// skip; the built binary has to be there for the copy to mean anything.
pub(crate) fn copy_file(src: &Utf8Path, dst: &Utf8Path) -> TaskResult<()> {
    fs::copy(src, dst).with_context(|| format!("failed to copy '{src}' to '{dst}'"))?;
    Ok(())
}

/// Resolve a path against the current working directory. Unlike
/// `fs::canonicalize` this never touches the file system, so it works for
/// paths that don't exist yet.
pub(crate) fn absolute(path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        return path.to_owned();
    }

    std::env::current_dir()
        .ok()
        .and_then(|pwd| Utf8PathBuf::from_path_buf(pwd).ok())
        .map(|pwd| pwd.join(path))
        .unwrap_or_else(|| path.to_owned())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_absolute_keeps_absolute_paths() {
        let path = Utf8Path::new("/usr/share/foo");
        assert_eq!(absolute(path), path);
    }

    #[test]
    fn test_absolute_resolves_relative_paths() {
        let path = absolute(Utf8Path::new("ext/foo/extconf.rt"));
        assert!(path.is_absolute());
        assert!(path.as_str().ends_with("ext/foo/extconf.rt"));
    }

    #[test]
    fn test_copy_file_missing_source_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let dir = Utf8Path::from_path(dir.path()).unwrap();
        let err = copy_file(&dir.join("absent.so"), &dir.join("out.so")).unwrap_err();
        assert!(err.to_string().contains("absent.so"));
    }
}

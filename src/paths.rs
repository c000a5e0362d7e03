//! Path handling shared by the facade and both engines

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Make `path` absolute against the working directory and fold `.`/`..`
/// lexically.
pub(crate) fn resolve_absolute(path: &Path) -> Result<PathBuf> {
    if path.as_os_str().is_empty() {
        return Err(Error::InvalidArgument("archive path is empty".to_string()));
    }
    let absolute = std::path::absolute(path)?;
    Ok(normalize(&absolute))
}

fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            other => result.push(other.as_os_str()),
        }
    }
    result
}

/// Name recorded in the archive for a source path: the path as given with
/// any root or drive prefix removed.
pub(crate) fn archive_name(path: &Path) -> PathBuf {
    let name: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    if name.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        name
    }
}

/// Where an entry stored as `entry_path` lands under `destination`.
///
/// Root and drive prefixes are dropped. Returns `None` for entries that name
/// the destination itself or carry a `..` component; those can never be
/// written safely. `/` always separates, `\` only on hosts where it is the
/// path separator.
pub(crate) fn entry_target(destination: &Path, entry_path: &str) -> Option<PathBuf> {
    let mut target = destination.to_path_buf();
    let mut pushed = false;
    for part in entry_path.split(['/', std::path::MAIN_SEPARATOR]) {
        match part {
            "" | "." => {}
            ".." => return None,
            part if part.contains(':') && cfg!(windows) => return None,
            part => {
                target.push(part);
                pushed = true;
            }
        }
    }
    pushed.then_some(target)
}

/// Check that `target`'s parent, after resolving symlinks already on disk,
/// is still inside the canonical `destination`.
///
/// Missing parents are fine: they will be created as plain directories
/// under a parent that was checked.
pub(crate) fn parent_within(destination: &Path, target: &Path) -> io::Result<bool> {
    let mut ancestor = match target.parent() {
        Some(parent) => parent,
        None => return Ok(false),
    };
    loop {
        match fs::canonicalize(ancestor) {
            Ok(real) => return Ok(real.starts_with(destination)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => match ancestor.parent() {
                Some(parent) => ancestor = parent,
                None => return Ok(false),
            },
            Err(e) => return Err(e),
        }
    }
}

/// Remove whatever currently sits at `path` without following symlinks
pub(crate) fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Prefix an I/O error with the path it concerns
pub(crate) fn with_path(e: io::Error, path: &Path) -> io::Error {
    io::Error::new(e.kind(), format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> &'static Path {
        if cfg!(windows) {
            Path::new("C:/out")
        } else {
            Path::new("/out")
        }
    }

    #[test]
    fn entry_targets_stay_under_destination() {
        assert_eq!(entry_target(base(), "a.txt"), Some(base().join("a.txt")));
        assert_eq!(entry_target(base(), "sub/"), Some(base().join("sub")));
        assert_eq!(entry_target(base(), "./sub/x"), Some(base().join("sub").join("x")));
        assert_eq!(entry_target(base(), "/etc/passwd"), Some(base().join("etc").join("passwd")));
    }

    #[test]
    fn parent_components_are_refused() {
        assert_eq!(entry_target(base(), "../../etc/evil"), None);
        assert_eq!(entry_target(base(), "a/.."), None);
        assert_eq!(entry_target(base(), "."), None);
        assert_eq!(entry_target(base(), ""), None);
    }

    #[test]
    fn backslash_separates_only_on_windows() {
        if cfg!(windows) {
            assert_eq!(entry_target(base(), "..\\evil"), None);
            assert_eq!(entry_target(base(), "a\\b.txt"), Some(base().join("a").join("b.txt")));
        } else {
            assert_eq!(entry_target(base(), "..\\evil"), Some(base().join("..\\evil")));
            assert_eq!(entry_target(base(), "a\\b.txt"), Some(base().join("a\\b.txt")));
        }
    }

    #[test]
    fn archive_names_drop_the_root() {
        assert_eq!(archive_name(Path::new("a.txt")), PathBuf::from("a.txt"));
        assert_eq!(archive_name(Path::new("sub/")), PathBuf::from("sub"));
        #[cfg(unix)]
        assert_eq!(archive_name(Path::new("/tmp/x")), PathBuf::from("tmp/x"));
        #[cfg(unix)]
        assert_eq!(archive_name(Path::new("/")), PathBuf::from("."));
    }

    #[test]
    fn resolve_folds_dot_components() {
        let resolved = resolve_absolute(Path::new("a/./b/../c.tar")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("a/c.tar"));
        assert!(resolve_absolute(Path::new("")).is_err());
    }

    #[test]
    fn parent_within_follows_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let dest = fs::canonicalize(dir.path()).unwrap();
        assert!(parent_within(&dest, &dest.join("a/b/c.txt")).unwrap());

        #[cfg(unix)]
        {
            let outside = tempfile::tempdir().unwrap();
            std::os::unix::fs::symlink(outside.path(), dest.join("link")).unwrap();
            assert!(!parent_within(&dest, &dest.join("link/evil")).unwrap());
        }
    }
}

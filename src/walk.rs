//! Flat file lists for `create`, built from a directory tree

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::Result;

/// Every path under `root`, depth-first with the root first and siblings in
/// file-name order. Symlinks are listed but not followed.
pub fn walk<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(root.as_ref())
        .follow_links(false)
        .sort_by_file_name()
    {
        paths.push(entry?.into_path());
    }
    Ok(paths)
}

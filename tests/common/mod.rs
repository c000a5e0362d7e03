#![allow(dead_code)]

use std::env;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use flate2::read::GzDecoder;
use tarfacade::{Archive, Config, EngineKind};

static CWD: Mutex<()> = Mutex::new(());

/// Holds the working directory for one test and restores it on drop
pub struct WorkDir {
    previous: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.previous);
    }
}

/// Archives store paths as given, so tests that want short entry names run
/// with the source tree as the working directory.
pub fn enter(dir: &Path) -> WorkDir {
    let lock = CWD.lock().unwrap_or_else(|e| e.into_inner());
    let previous = env::current_dir().unwrap();
    env::set_current_dir(dir).unwrap();
    WorkDir {
        previous,
        _lock: lock,
    }
}

pub const ENGINES: [EngineKind; 2] = [EngineKind::Fallback, EngineKind::Native];

/// Open `path` bound to `kind`, or `None` when libarchive is not on this host
pub fn open(path: &Path, kind: EngineKind) -> Option<Archive> {
    open_with(path, kind, false)
}

pub fn open_with(path: &Path, kind: EngineKind, empty: bool) -> Option<Archive> {
    let builder = Archive::builder(path).config(Config::default()).empty(empty);
    let archive = match kind {
        EngineKind::Fallback => builder.prefer_fallback().open().unwrap(),
        EngineKind::Native => builder.open().unwrap(),
    };
    if archive.engine_kind() != kind {
        eprintln!("skipping {kind} engine for {}: libarchive not loadable", path.display());
        return None;
    }
    Some(archive)
}

/// Source tree used by most tests: `a.txt`, `sub/`, `sub/b.txt`
pub fn sample_tree(root: &Path) -> Vec<&'static str> {
    std::fs::create_dir_all(root.join("sub")).unwrap();
    std::fs::write(root.join("a.txt"), b"hello").unwrap();
    std::fs::write(root.join("sub/b.txt"), b"nested").unwrap();
    vec!["a.txt", "sub", "sub/b.txt"]
}

/// Entry names as stored, read with the `tar` crate, directory slashes trimmed
pub fn entry_names(archive: &Path) -> Vec<String> {
    let mut file = BufReader::new(File::open(archive).unwrap());
    let mut magic = [0u8; 2];
    file.read_exact(&mut magic).unwrap();
    let file = BufReader::new(File::open(archive).unwrap());

    let reader: Box<dyn Read> = if magic == [0x1f, 0x8b] {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    let mut tar = tar::Archive::new(reader);
    tar.entries()
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();
            name.trim_end_matches('/').to_string()
        })
        .collect()
}

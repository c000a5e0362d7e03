//! Engine backed by the host's libarchive.
//!
//! libarchive does the format and codec work; this module only translates
//! the engine contract. Extraction rewrites each entry's path to an absolute
//! path under the destination instead of changing the process working
//! directory, and applies the same ignore, containment and permission rules
//! as the fallback engine.

mod disk;
mod entry;
mod ffi;
mod reader;
mod writer;

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use self::disk::{ExtractFlags, ReadDisk, WriteDisk};
use self::entry::{EntryMut, FileType};
use self::ffi::LibArchive;
use self::reader::ReadArchive;
use self::writer::WriteArchive;
use crate::diagnostics::Diagnostics;
use crate::engine::{Engine, EngineKind};
use crate::error::{Error, Result};
use crate::format::CompressionFormat;
use crate::ignore::IgnoreSet;
use crate::paths;

const BLOCK: usize = 64 * 1024;

/// Version string of the first loadable candidate
pub(crate) fn library_version(candidates: &[PathBuf]) -> Result<String> {
    Ok(LibArchive::load(candidates)?.version())
}

/// libarchive-backed engine bound to one archive path
pub struct NativeEngine {
    lib: LibArchive,
    archive: PathBuf,
    diag: Diagnostics,
}

impl NativeEngine {
    /// Load libarchive from the first usable candidate and bind it to
    /// `archive`
    pub(crate) fn load(archive: &Path, candidates: &[PathBuf], diag: Diagnostics) -> Result<Self> {
        let lib = LibArchive::load(candidates)?;
        diag.debug(format!(
            "using {} from {}",
            lib.version(),
            lib.source.display()
        ));
        Ok(NativeEngine {
            lib,
            archive: archive.to_path_buf(),
            diag,
        })
    }

    /// Path of the archive this engine reads and writes
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    /// Version string of the loaded libarchive
    pub fn version(&self) -> String {
        self.lib.version()
    }

    /// Which shared library was loaded
    pub fn library(&self) -> &Path {
        &self.lib.source
    }

    fn write_entries(&self, staged: &Path, files: &[PathBuf], gzip: bool) -> Result<()> {
        let mut writer =
            WriteArchive::open_file(&self.lib, staged, CompressionFormat::from_gzip(gzip))?;
        let mut disk = ReadDisk::new(&self.lib)?;
        let mut buf = vec![0u8; BLOCK];

        for path in files {
            fs::symlink_metadata(path).map_err(|e| paths::with_path(e, path))?;

            let mut owned = EntryMut::new(&self.lib)?;
            owned.set_sourcepath(path)?;
            let mut entry = owned.as_entry();
            entry.set_pathname(&paths::archive_name(path))?;
            disk.fill(&entry)?;
            writer.write_header(&entry)?;

            if entry.file_type() == FileType::RegularFile && entry.size() > 0 {
                let mut file = File::open(path).map_err(|e| paths::with_path(e, path))?;
                loop {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    let mut pending = &buf[..n];
                    while !pending.is_empty() {
                        let written = writer.write_data(pending)?;
                        if written == 0 {
                            return Err(io::Error::from(io::ErrorKind::WriteZero).into());
                        }
                        pending = &pending[written..];
                    }
                }
            }
        }

        writer.finish()
    }
}

impl std::fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeEngine")
            .field("library", &self.lib.source)
            .field("archive", &self.archive)
            .finish()
    }
}

impl Engine for NativeEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Native
    }

    fn create(&self, files: &[PathBuf], gzip: bool) -> Result<()> {
        let dir = self.archive.parent().unwrap_or(Path::new("."));
        let staged = tempfile::Builder::new()
            .prefix(".tarfacade")
            .tempfile_in(dir)?;

        self.write_entries(staged.path(), files, gzip)?;

        staged.persist(&self.archive).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn extract(&self, destination: &Path, perms: bool, ignore: &IgnoreSet) -> Result<()> {
        let destination = fs::canonicalize(destination)?;
        let mut reader = ReadArchive::open(&self.lib, &self.archive)?;
        let mut disk = WriteDisk::new(&self.lib, ExtractFlags::for_extract(perms))?;
        let mut buf = vec![0u8; BLOCK];

        while let Some(mut entry) = reader.next_entry()? {
            let Some(name) = entry.pathname() else {
                self.diag.warn("skipping entry without a path");
                continue;
            };
            if ignore.is_match(&name) {
                self.diag.warn(format!("ignoring entry {}", name));
                continue;
            }
            let Some(target) = paths::entry_target(&destination, &name) else {
                self.diag.warn(format!("refusing entry outside destination: {}", name));
                continue;
            };
            if !paths::parent_within(&destination, &target)? {
                self.diag.warn(format!("refusing entry through a symlink: {}", name));
                continue;
            }

            if let Some(link) = entry.hardlink() {
                let Some(source) = paths::entry_target(&destination, &link) else {
                    self.diag.warn(format!("refusing hard link outside destination: {}", name));
                    continue;
                };
                if !paths::parent_within(&destination, &source)? {
                    self.diag.warn(format!("refusing hard link through a symlink: {}", name));
                    continue;
                }
                entry.set_hardlink(&source)?;
            } else {
                match entry.file_type() {
                    FileType::RegularFile => {
                        if fs::symlink_metadata(&target)
                            .is_ok_and(|m| m.is_dir() || m.file_type().is_symlink())
                        {
                            paths::remove_existing(&target)?;
                        }
                    }
                    FileType::Directory | FileType::SymbolicLink => {}
                    FileType::Other => {
                        self.diag.warn(format!("unknown tar entry: {}", name));
                        continue;
                    }
                }
            }

            if !perms {
                entry.set_default_perm();
            }
            entry.set_pathname(&target)?;
            if let Some(warning) = disk.write_header(&entry)? {
                self.diag.warn(format!("{}: {}", name, warning));
            }

            if entry.size() > 0 {
                loop {
                    let n = reader.read_data(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    let mut pending = &buf[..n];
                    while !pending.is_empty() {
                        let written = disk.write_data(pending)?;
                        if written == 0 {
                            return Err(io::Error::from(io::ErrorKind::WriteZero).into());
                        }
                        pending = &pending[written..];
                    }
                }
            }

            if let Some(warning) = disk.finish_entry()? {
                self.diag.warn(format!("{}: {}", name, warning));
            }
        }

        if let Some(warning) = disk.close()? {
            self.diag.warn(warning);
        }
        Ok(())
    }
}

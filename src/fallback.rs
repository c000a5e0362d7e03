//! Built-in tar engine used when libarchive cannot be loaded.
//!
//! Archives are written through `tar::Builder`, wrapped in gzip when asked,
//! into a temporary file next to the target that is renamed into place on
//! success. Reading sniffs the gzip magic and walks the entries one by one so
//! that ignore rules, containment checks and the permission policy are
//! applied here rather than by `tar::Entry::unpack`.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use tar::EntryType;

use crate::diagnostics::Diagnostics;
use crate::engine::{Engine, EngineKind};
use crate::error::{Error, Result};
use crate::format::CompressionFormat;
use crate::ignore::IgnoreSet;
use crate::paths;

/// Pure-Rust tar(+gzip) engine bound to one archive path
#[derive(Debug)]
pub struct FallbackEngine {
    archive: PathBuf,
    diag: Diagnostics,
}

impl FallbackEngine {
    /// Bind the engine to `archive`, which must name a file
    pub fn new<P: Into<PathBuf>>(archive: P) -> Result<Self> {
        Self::with_diagnostics(archive.into(), Diagnostics::default())
    }

    pub(crate) fn with_diagnostics(archive: PathBuf, diag: Diagnostics) -> Result<Self> {
        if archive.file_name().is_none() || archive.parent().is_none() {
            return Err(Error::InvalidArgument(format!(
                "archive path does not name a file: {}",
                archive.display()
            )));
        }
        Ok(FallbackEngine { archive, diag })
    }

    /// Path of the archive this engine reads and writes
    pub fn archive(&self) -> &Path {
        &self.archive
    }

    fn append_all<W: Write>(&self, writer: W, files: &[PathBuf]) -> Result<W> {
        let mut builder = tar::Builder::new(writer);
        builder.follow_symlinks(false);

        for path in files {
            fs::symlink_metadata(path).map_err(|e| paths::with_path(e, path))?;
            let name = paths::archive_name(path);
            builder
                .append_path_with_name(path, &name)
                .map_err(|e| paths::with_path(e, path))?;
        }

        Ok(builder.into_inner()?)
    }

    fn unpack<R: Read>(
        &self,
        mut archive: tar::Archive<R>,
        destination: &Path,
        perms: bool,
        ignore: &IgnoreSet,
    ) -> Result<()> {
        let mut dir_modes = Vec::new();

        for entry in archive.entries().map_err(Error::from_stream)? {
            let mut entry = entry.map_err(Error::from_stream)?;
            let name = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

            if ignore.is_match(&name) {
                self.diag.warn(format!("ignoring entry {}", name));
                continue;
            }
            let Some(target) = paths::entry_target(destination, &name) else {
                self.diag.warn(format!("refusing entry outside destination: {}", name));
                continue;
            };
            if !paths::parent_within(destination, &target)? {
                self.diag.warn(format!("refusing entry through a symlink: {}", name));
                continue;
            }

            let mode = entry.header().mode().ok();
            match entry.header().entry_type() {
                EntryType::Directory => {
                    self.make_dir(&target, mode, perms, &mut dir_modes)?;
                }
                EntryType::Regular if name.ends_with('/') => {
                    self.make_dir(&target, mode, perms, &mut dir_modes)?;
                }
                EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                    write_file(&mut entry, &target)?;
                    if perms {
                        if let Some(mode) = mode {
                            set_mode(&target, mode)?;
                        }
                    }
                }
                EntryType::Symlink => {
                    let link = entry.link_name().map_err(Error::from_stream)?;
                    let Some(link) = link else {
                        return Err(Error::format(format!("symlink without target: {}", name)));
                    };
                    self.make_symlink(&link, &target)?;
                }
                EntryType::Link => {
                    let link = entry.link_name_bytes().map(|b| String::from_utf8_lossy(&b).into_owned());
                    let source = link.as_deref().and_then(|l| paths::entry_target(destination, l));
                    let Some(source) = source else {
                        self.diag.warn(format!("refusing hard link outside destination: {}", name));
                        continue;
                    };
                    if !paths::parent_within(destination, &source)? {
                        self.diag.warn(format!("refusing hard link through a symlink: {}", name));
                        continue;
                    }
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    paths::remove_existing(&target)?;
                    fs::hard_link(&source, &target)?;
                }
                EntryType::XGlobalHeader | EntryType::XHeader => {}
                other => {
                    self.diag.warn(format!("unknown tar entry: {} type: {:?}", name, other));
                }
            }
        }

        // children first, so a read-only directory does not block its own contents
        for (dir, mode) in dir_modes.into_iter().rev() {
            let still_dir = fs::symlink_metadata(&dir).is_ok_and(|m| m.is_dir());
            if !still_dir || !paths::parent_within(destination, &dir)? {
                self.diag.warn(format!("not restoring mode of replaced directory {}", dir.display()));
                continue;
            }
            set_mode(&dir, mode)?;
        }
        Ok(())
    }

    fn make_dir(
        &self,
        target: &Path,
        mode: Option<u32>,
        perms: bool,
        dir_modes: &mut Vec<(PathBuf, u32)>,
    ) -> Result<()> {
        if fs::symlink_metadata(target).is_ok_and(|m| !m.is_dir()) {
            fs::remove_file(target)?;
        }
        fs::create_dir_all(target)?;
        if perms {
            if let Some(mode) = mode {
                dir_modes.push((target.to_path_buf(), mode));
            }
        }
        Ok(())
    }

    #[cfg(unix)]
    fn make_symlink(&self, link: &Path, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        paths::remove_existing(target)?;
        std::os::unix::fs::symlink(link, target)?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn make_symlink(&self, link: &Path, target: &Path) -> Result<()> {
        self.diag.warn(format!(
            "skipping symlink {} -> {}: not supported on this platform",
            target.display(),
            link.display()
        ));
        Ok(())
    }
}

impl Engine for FallbackEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Fallback
    }

    fn create(&self, files: &[PathBuf], gzip: bool) -> Result<()> {
        let dir = self.archive.parent().unwrap_or(Path::new("."));
        let mut staged = tempfile::Builder::new()
            .prefix(".tarfacade")
            .tempfile_in(dir)?;

        {
            let out = BufWriter::new(staged.as_file_mut());
            match CompressionFormat::from_gzip(gzip) {
                CompressionFormat::Gzip => {
                    let name = self
                        .archive
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    let encoder = GzBuilder::new()
                        .filename(name)
                        .mtime(unix_now())
                        .write(out, Compression::best());
                    let encoder = self.append_all(encoder, files)?;
                    encoder.finish()?.flush()?;
                }
                CompressionFormat::None => {
                    let mut out = self.append_all(out, files)?;
                    out.flush()?;
                }
            }
        }

        staged.persist(&self.archive).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    fn extract(&self, destination: &Path, perms: bool, ignore: &IgnoreSet) -> Result<()> {
        let destination = fs::canonicalize(destination)?;
        let mut reader = BufReader::new(File::open(&self.archive)?);
        let (compression, prefix) = CompressionFormat::sniff(&mut reader)?;
        let stream = Cursor::new(prefix).chain(reader);

        match compression {
            CompressionFormat::Gzip => self.unpack(
                tar::Archive::new(GzDecoder::new(stream)),
                &destination,
                perms,
                ignore,
            ),
            CompressionFormat::None => {
                self.unpack(tar::Archive::new(stream), &destination, perms, ignore)
            }
        }
    }
}

fn write_file<R: Read>(entry: &mut R, target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    paths::remove_existing(target)?;

    let mut file = File::create(target)?;
    let mut buf = [0u8; 8192];
    loop {
        let n = entry.read(&mut buf).map_err(Error::from_stream)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    fs::set_permissions(path, permissions)
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

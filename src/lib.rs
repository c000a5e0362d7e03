//! Create and extract tar archives, optionally gzip-compressed.
//!
//! Each [`Archive`] is bound to an engine when it is opened. If the host has
//! libarchive it is loaded at runtime and does the work; otherwise a built-in
//! engine based on the `tar` and `flate2` crates is used. Callers see the same
//! behavior either way, including the extraction guards: entries naming the
//! destination itself, entries with a parent-directory component and entries
//! that would escape through an existing symlink are skipped.
//!
//! # Examples
//!
//! ## Creating an archive
//!
//! ```no_run
//! use tarfacade::Archive;
//!
//! let archive = Archive::new("backup.tar.gz")?;
//! archive.create(&["notes.txt", "docs", "docs/readme.md"], true)?;
//! # Ok::<(), tarfacade::Error>(())
//! ```
//!
//! ## Extracting with extra ignore rules
//!
//! ```no_run
//! use tarfacade::{Archive, ExtractOptions};
//!
//! let archive = Archive::builder("backup.tar.gz").empty(true).open()?;
//! let options = ExtractOptions::default().perms(false).ignore(r"\.tmp$");
//! archive.extract_with("restore", &options)?;
//! # Ok::<(), tarfacade::Error>(())
//! ```
//!
//! ## Archiving a whole directory
//!
//! ```no_run
//! let archive = tarfacade::archive_directory("site", "site.tar", false)?;
//! println!("wrote {} with the {} engine", archive.path().display(), archive.engine_kind());
//! # Ok::<(), tarfacade::Error>(())
//! ```

#![deny(missing_docs)]

mod archive;
mod config;
mod diagnostics;
mod engine;
mod error;
mod fallback;
mod format;
mod ignore;
mod native;
mod paths;
mod walk;

use std::path::Path;

pub use archive::{Archive, ArchiveBuilder, ExtractOptions};
pub use config::{Config, LIBARCHIVE_ENV, LOG_ENV};
pub use engine::{Engine, EngineKind, try_load_native};
pub use error::{Error, Result};
pub use fallback::FallbackEngine;
pub use format::CompressionFormat;
pub use ignore::IgnoreSet;
pub use native::NativeEngine;
pub use walk::walk;

/// Archive everything under `path` (the directory itself first) into
/// `archive`, replacing any existing file
pub fn archive_directory<P, A>(path: P, archive: A, gzip: bool) -> Result<Archive>
where
    P: AsRef<Path>,
    A: AsRef<Path>,
{
    let files = walk(path)?;
    let archive = Archive::new(archive)?;
    archive.create(&files, gzip)?;
    Ok(archive)
}

/// Returns the version string of the host libarchive, if it can be loaded
/// with the settings from [`Config::from_env`]
pub fn native_version() -> Option<String> {
    native::library_version(&Config::from_env().native_libraries).ok()
}

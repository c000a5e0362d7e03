//! The capability contract shared by the native and fallback engines

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::ignore::IgnoreSet;
use crate::native::NativeEngine;

/// Which engine a [`crate::Archive`] is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// libarchive loaded from the host
    Native,
    /// Built-in tar/gzip engine
    Fallback,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Native => f.write_str("native"),
            EngineKind::Fallback => f.write_str("fallback"),
        }
    }
}

/// Byte-level archive work for one archive file.
///
/// Implementations own the archive path they were built for. `extract` is
/// handed an already provisioned destination and the effective ignore set;
/// implementations must skip ignored entries and anything that would land
/// outside the destination.
pub trait Engine: Send {
    /// Which implementation this is
    fn kind(&self) -> EngineKind;

    /// Write (or overwrite) the archive with one entry per path, in order
    fn create(&self, files: &[PathBuf], gzip: bool) -> Result<()>;

    /// Unpack every non-ignored entry under `destination`
    fn extract(&self, destination: &Path, perms: bool, ignore: &IgnoreSet) -> Result<()>;
}

/// Try to bind libarchive for `archive`.
///
/// Any load failure is expected on hosts without libarchive and yields
/// `None`.
pub fn try_load_native(archive: &Path, config: &Config) -> Option<NativeEngine> {
    let diag = Diagnostics::new(config.log_level);
    match NativeEngine::load(archive, &config.native_libraries, diag) {
        Ok(engine) => Some(engine),
        Err(e) => {
            diag.debug(format!("falling back to built-in tar engine: {}", e));
            None
        }
    }
}

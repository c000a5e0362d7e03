//! The caller-facing archive handle

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::diagnostics::Diagnostics;
use crate::engine::{self, Engine, EngineKind};
use crate::error::Result;
use crate::fallback::FallbackEngine;
use crate::ignore::IgnoreSet;
use crate::paths;

/// Options for [`Archive::extract_with`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    perms: bool,
    ignore: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        ExtractOptions {
            perms: true,
            ignore: Vec::new(),
        }
    }
}

impl ExtractOptions {
    /// Restore stored permission bits (default) or leave the process default
    pub fn perms(mut self, perms: bool) -> Self {
        self.perms = perms;
        self
    }

    /// Skip entries whose stored path matches this regular expression.
    ///
    /// Adds to the built-in traversal guards; it can never replace them.
    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.ignore.push(pattern.into());
        self
    }

    /// Whether permission bits are restored
    pub fn restores_perms(&self) -> bool {
        self.perms
    }

    /// Caller-supplied ignore patterns
    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore
    }
}

/// Builder for [`Archive`]
#[derive(Debug, Clone)]
pub struct ArchiveBuilder {
    path: PathBuf,
    empty: bool,
    prefer_fallback: bool,
    config: Option<Config>,
}

impl ArchiveBuilder {
    /// Remove everything inside the destination before each extraction
    pub fn empty(mut self, empty: bool) -> Self {
        self.empty = empty;
        self
    }

    /// Use these settings instead of [`Config::from_env`]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Skip the libarchive probe and bind the built-in engine
    pub fn prefer_fallback(mut self) -> Self {
        self.prefer_fallback = true;
        self
    }

    /// Resolve the path and bind an engine
    pub fn open(self) -> Result<Archive> {
        let path = paths::resolve_absolute(&self.path)?;
        let config = self.config.unwrap_or_else(Config::from_env);
        let diag = Diagnostics::new(config.log_level);

        let native = if self.prefer_fallback {
            None
        } else {
            engine::try_load_native(&path, &config)
        };
        let engine: Box<dyn Engine> = match native {
            Some(native) => Box::new(native),
            None => Box::new(FallbackEngine::with_diagnostics(path.clone(), diag)?),
        };
        diag.debug(format!(
            "{} bound to the {} engine",
            path.display(),
            engine.kind()
        ));

        Ok(Archive {
            path,
            empty: self.empty,
            config,
            engine,
        })
    }
}

/// One archive file plus the engine that reads and writes it.
///
/// The engine is chosen once, when the handle is opened: libarchive if the
/// host has it, the built-in tar engine otherwise.
///
/// # Examples
///
/// ```no_run
/// use tarfacade::{Archive, ExtractOptions};
///
/// let archive = Archive::new("site.tar.gz")?;
/// archive.create(&["index.html", "assets"], true)?;
///
/// let archive = Archive::builder("site.tar.gz").empty(true).open()?;
/// archive.extract_with("public", &ExtractOptions::default().ignore(r"\.git/"))?;
/// # Ok::<(), tarfacade::Error>(())
/// ```
pub struct Archive {
    path: PathBuf,
    empty: bool,
    config: Config,
    engine: Box<dyn Engine>,
}

impl Archive {
    /// Open a handle for `path` with default settings
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::builder(path).open()
    }

    /// Start configuring a handle for `path`
    pub fn builder<P: AsRef<Path>>(path: P) -> ArchiveBuilder {
        ArchiveBuilder {
            path: path.as_ref().to_path_buf(),
            empty: false,
            prefer_fallback: false,
            config: None,
        }
    }

    /// Bind a caller-provided engine; the engine must target `path`
    pub fn with_engine<P: AsRef<Path>>(
        path: P,
        empty: bool,
        config: Config,
        engine: Box<dyn Engine>,
    ) -> Result<Self> {
        Ok(Archive {
            path: paths::resolve_absolute(path.as_ref())?,
            empty,
            config,
            engine,
        })
    }

    /// Absolute path of the archive file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Which engine this handle is bound to
    pub fn engine_kind(&self) -> EngineKind {
        self.engine.kind()
    }

    /// Whether extraction clears the destination first
    pub fn is_empty_on_extract(&self) -> bool {
        self.empty
    }

    /// Settings this handle was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Write the archive with one entry per path, in order.
    ///
    /// Directories are stored as entries, not recursed into; see
    /// [`crate::walk`] for building a full list. An existing archive is
    /// replaced.
    pub fn create<I, P>(&self, files: I, gzip: bool) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let files: Vec<PathBuf> = files
            .into_iter()
            .map(|p| p.as_ref().to_path_buf())
            .collect();
        self.engine.create(&files, gzip)
    }

    /// Extract into `destination`, restoring permissions, with only the
    /// traversal guards as ignore rules
    pub fn extract<P: AsRef<Path>>(&self, destination: P) -> Result<()> {
        self.extract_with(destination, &ExtractOptions::default())
    }

    /// Extract into `destination`.
    ///
    /// The destination is created if missing and, for handles opened with
    /// `empty(true)`, cleared first. Entries matching `.` alone, containing a
    /// parent-directory marker followed by the path separator, or matching
    /// any pattern in `options` are skipped.
    pub fn extract_with<P: AsRef<Path>>(
        &self,
        destination: P,
        options: &ExtractOptions,
    ) -> Result<()> {
        let destination = destination.as_ref();
        let ignore = IgnoreSet::guarded(self.config.path_separator, &options.ignore)?;

        fs::create_dir_all(destination)?;
        if self.empty {
            clear_dir(destination)?;
        }

        self.engine.extract(destination, options.perms, &ignore)
    }
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.path)
            .field("empty", &self.empty)
            .field("engine", &self.engine.kind())
            .finish()
    }
}

/// Remove every entry directly inside `dir`, whether or not the archive
/// will write there
fn clear_dir(dir: &Path) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

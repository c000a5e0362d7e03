//! Process-level settings resolved once and threaded into each [`Archive`](crate::Archive)

use std::env;
use std::path::PathBuf;

use log::LevelFilter;

/// Environment variable naming a libarchive shared library to try first.
///
/// The value `none` disables the native engine.
pub const LIBARCHIVE_ENV: &str = "TARFACADE_LIBARCHIVE";

/// Environment variable holding the diagnostic level (`error`, `warn`, ...)
pub const LOG_ENV: &str = "TARFACADE_LOG";

/// Settings shared by the facade and its engines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Separator used to build the parent-directory traversal guard
    pub path_separator: char,
    /// Shared library names tried, in order, when loading libarchive
    pub native_libraries: Vec<PathBuf>,
    /// Threshold for diagnostics emitted through the `log` facade
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            path_separator: std::path::MAIN_SEPARATOR,
            native_libraries: default_native_libraries(),
            log_level: LevelFilter::Error,
        }
    }
}

impl Config {
    /// Defaults overridden by `TARFACADE_LIBARCHIVE` and `TARFACADE_LOG`
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(lib) = env::var(LIBARCHIVE_ENV) {
            let lib = lib.trim();
            if lib.eq_ignore_ascii_case("none") {
                config.native_libraries.clear();
            } else if !lib.is_empty() {
                config.native_libraries.insert(0, PathBuf::from(lib));
            }
        }

        if let Some(level) = env::var(LOG_ENV).ok().and_then(|v| v.trim().parse().ok()) {
            config.log_level = level;
        }

        config
    }

    /// Set the path separator used by the traversal guard
    pub fn with_path_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    /// Replace the libarchive candidates; an empty list disables the native engine
    pub fn with_native_libraries<I, P>(mut self, libraries: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.native_libraries = libraries.into_iter().map(Into::into).collect();
        self
    }

    /// Set the diagnostic threshold
    pub fn with_log_level(mut self, level: LevelFilter) -> Self {
        self.log_level = level;
        self
    }
}

fn default_native_libraries() -> Vec<PathBuf> {
    let names: &[&str] = if cfg!(target_os = "macos") {
        &[
            "libarchive.13.dylib",
            "libarchive.dylib",
            "/opt/homebrew/opt/libarchive/lib/libarchive.13.dylib",
            "/usr/local/opt/libarchive/lib/libarchive.13.dylib",
            "/usr/lib/libarchive.2.dylib",
        ]
    } else if cfg!(unix) {
        &["libarchive.so.13", "libarchive.so"]
    } else {
        &[]
    };
    names.iter().map(PathBuf::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_error_only() {
        let config = Config::default();
        assert_eq!(config.log_level, LevelFilter::Error);
        assert_eq!(config.path_separator, std::path::MAIN_SEPARATOR);
    }

    #[test]
    fn empty_library_list_disables_native() {
        let config = Config::default().with_native_libraries(Vec::<PathBuf>::new());
        assert!(config.native_libraries.is_empty());
    }
}

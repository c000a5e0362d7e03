//! Leveled diagnostics handed to each engine.
//!
//! The crate never installs a logger. Messages go through the `log` facade
//! only when they pass the threshold carried here, which defaults to errors
//! only.

use log::{Level, LevelFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Diagnostics {
    level: LevelFilter,
}

impl Diagnostics {
    pub(crate) fn new(level: LevelFilter) -> Self {
        Diagnostics { level }
    }

    pub(crate) fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    pub(crate) fn warn(&self, message: impl AsRef<str>) {
        self.emit(Level::Warn, message.as_ref());
    }

    pub(crate) fn debug(&self, message: impl AsRef<str>) {
        self.emit(Level::Debug, message.as_ref());
    }

    fn emit(&self, level: Level, message: &str) {
        if self.enabled(level) {
            log::log!(target: "tarfacade", level, "{}", message);
        }
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new(LevelFilter::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_drops_warnings() {
        let diag = Diagnostics::default();
        assert!(diag.enabled(Level::Error));
        assert!(!diag.enabled(Level::Warn));
        assert!(!diag.enabled(Level::Debug));
    }

    #[test]
    fn raised_threshold_lets_warnings_through() {
        let diag = Diagnostics::new(LevelFilter::Warn);
        assert!(diag.enabled(Level::Warn));
        assert!(!diag.enabled(Level::Debug));
    }
}

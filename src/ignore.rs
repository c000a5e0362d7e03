//! Entry filtering applied during extraction.
//!
//! Patterns are regular expressions searched anywhere in the entry path as it
//! is stored in the archive. The guarded set always carries the two traversal
//! guards ahead of any caller pattern.

use crate::error::Result;
use regex::Regex;

/// Ordered set of patterns; an entry matching any of them is skipped
#[derive(Debug, Clone)]
pub struct IgnoreSet {
    patterns: Vec<Regex>,
}

impl IgnoreSet {
    /// Build the effective extraction set: the current-directory entry, the
    /// `..` + `separator` traversal marker, then `extra` in order.
    ///
    /// Returns `InvalidArgument` if a caller pattern does not compile.
    pub fn guarded<I, S>(separator: char, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut patterns = vec![
            Regex::new(r"^\.$")?,
            Regex::new(&format!(r"\.{{2}}{}", regex::escape(&separator.to_string())))?,
        ];
        for pattern in extra {
            patterns.push(Regex::new(pattern.as_ref())?);
        }
        Ok(IgnoreSet { patterns })
    }

    /// Returns true if `entry_path` matches any pattern
    pub fn is_match(&self, entry_path: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(entry_path))
    }

    /// Number of patterns, guards included
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Always false for a guarded set
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Iterate over the pattern sources
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_are_always_present() {
        let set = IgnoreSet::guarded('/', Vec::<String>::new()).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.is_match("."));
        assert!(set.is_match("../../etc/evil"));
        assert!(set.is_match("a/../b"));
        assert!(!set.is_match("./a.txt"));
        assert!(!set.is_match("sub/"));
        assert!(!set.is_match("..hidden"));
    }

    #[test]
    fn backslash_separator_is_escaped() {
        let set = IgnoreSet::guarded('\\', Vec::<String>::new()).unwrap();
        assert!(set.is_match("..\\windows\\system32"));
        assert_eq!(set.patterns().nth(1), Some(r"\.{2}\\"));
    }

    #[test]
    fn caller_patterns_are_additive() {
        let set = IgnoreSet::guarded('/', ["\\.git/", "^tmp"]).unwrap();
        assert_eq!(set.len(), 4);
        assert!(set.is_match("repo/.git/config"));
        assert!(set.is_match("tmp/file"));
        assert!(set.is_match("../escape"));
        assert!(!set.is_match("src/main.rs"));
    }

    #[test]
    fn bad_caller_pattern_is_rejected() {
        let err = IgnoreSet::guarded('/', ["("]).unwrap_err();
        assert!(matches!(err, crate::Error::InvalidArgument(_)));
    }
}

//! Change-path glob matching
//!
//! Patterns use a small dialect: `*` matches any run of
//! characters (path separators included), `?` matches one character and
//! everything else is literal. Matching is anchored at both ends.

use regex::Regex;

/// Pattern that matches every path
pub const MATCH_ALL: &str = "*";

/// A compiled set of change-path globs
#[derive(Debug, Clone)]
pub struct GlobSet {
    match_all: bool,
    patterns: Vec<Regex>,
}

impl GlobSet {
    /// Compile a set of patterns; an empty set matches everything
    #[must_use]
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let match_all =
            patterns.is_empty() || patterns.iter().any(|p| p.as_ref().trim() == MATCH_ALL);
        let patterns = if match_all {
            Vec::new()
        } else {
            patterns.iter().map(|p| compile(p.as_ref().trim())).collect()
        };
        Self {
            match_all,
            patterns,
        }
    }

    #[must_use]
    pub fn is_match(&self, path: &str) -> bool {
        self.match_all || self.patterns.iter().any(|re| re.is_match(path))
    }

    /// True if any of `paths` matches
    #[must_use]
    pub fn matches_any<S: AsRef<str>>(&self, paths: &[S]) -> bool {
        paths.iter().any(|p| self.is_match(p.as_ref()))
    }
}

fn compile(pattern: &str) -> Regex {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }
    source.push('$');
    // Every non-wildcard character is escaped, so the source is always valid.
    Regex::new(&source).unwrap_or_else(|_| unreachable!("escaped glob must compile"))
}

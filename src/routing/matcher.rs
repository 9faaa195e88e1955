//! Path matching logic.
//!
//! # Responsibilities
//! - Match a request path against one rule condition
//! - Build the matcher for a rule's kind and pattern
//!
//! # Design Decisions
//! - Prefix, suffix and exact conditions are literal, case-sensitive string
//!   comparisons
//! - Regex conditions use the pattern as-is: no implicit anchoring, so
//!   `api` matches anywhere in the path

use regex::Regex;

use crate::model::MatchKind;

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches a leading substring of the path.
#[derive(Debug, Clone)]
pub struct PrefixMatcher {
    prefix: String,
}

impl PrefixMatcher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Matcher for PrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}

/// Matches a trailing substring of the path.
#[derive(Debug, Clone)]
pub struct SuffixMatcher {
    suffix: String,
}

impl SuffixMatcher {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl Matcher for SuffixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.ends_with(&self.suffix)
    }
}

#[derive(Debug, Clone)]
pub struct ExactMatcher {
    path: String,
}

impl ExactMatcher {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Matcher for ExactMatcher {
    fn matches(&self, path: &str) -> bool {
        path == self.path
    }
}

/// Unanchored regular expression search.
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

impl Matcher for RegexMatcher {
    fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

/// Never matches. Stands in for rules that cannot fire.
#[derive(Debug, Clone, Copy)]
pub struct NeverMatcher;

impl Matcher for NeverMatcher {
    fn matches(&self, _path: &str) -> bool {
        false
    }
}

/// Build the matcher for a rule condition.
pub fn build_matcher(kind: MatchKind, pattern: &str) -> Result<Box<dyn Matcher>, regex::Error> {
    Ok(match kind {
        MatchKind::Prefix => Box::new(PrefixMatcher::new(pattern)),
        MatchKind::Suffix => Box::new(SuffixMatcher::new(pattern)),
        MatchKind::Exact => Box::new(ExactMatcher::new(pattern)),
        MatchKind::Regex => Box::new(RegexMatcher::new(pattern)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_matcher() {
        let matcher = PrefixMatcher::new("/api");
        assert!(matcher.matches("/api/v1"));
        assert!(matcher.matches("/apiary"));
        assert!(!matcher.matches("/images"));
        assert!(!matcher.matches("/API")); // Case sensitive
    }

    #[test]
    fn test_suffix_and_exact() {
        assert!(SuffixMatcher::new(".php").matches("/index.php"));
        assert!(!SuffixMatcher::new(".php").matches("/index.php5"));
        assert!(ExactMatcher::new("/health").matches("/health"));
        assert!(!ExactMatcher::new("/health").matches("/health/"));
    }

    #[test]
    fn test_regex_is_unanchored() {
        let matcher = RegexMatcher::new("v[0-9]+").unwrap();
        assert!(matcher.matches("/api/v2/users"));
        assert!(!matcher.matches("/api/latest"));

        let anchored = RegexMatcher::new("^/v[0-9]+$").unwrap();
        assert!(!anchored.matches("/api/v2"));
    }

    #[test]
    fn test_build_matcher_rejects_bad_regex() {
        assert!(build_matcher(MatchKind::Regex, "(").is_err());
        assert!(build_matcher(MatchKind::Exact, "/").unwrap().matches("/"));
    }
}

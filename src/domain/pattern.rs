//! Wildcard pattern compilation and matching.
//!
//! A subscription pattern is a plain string in which `*` matches any
//! sequence of characters (including the empty one) and every other
//! character matches itself. Patterns are compiled to anchored regular
//! expressions with all literal segments escaped, so `"a.b"` only ever
//! matches the literal `"a.b"`.
//!
//! [`PatternMatcher`] keeps compiled matchers in a bounded cache keyed by
//! the exact pattern string. Many connections tend to subscribe to the same
//! handful of patterns (`"en*"`, `"*wiki"`), so each distinct pattern is
//! compiled once while it stays hot. Client-supplied patterns are unbounded
//! in variety, hence the capacity limit; an evicted pattern is recompiled
//! on its next use with identical behavior.

use std::fmt;

use moka::sync::Cache;
use regex::Regex;

use crate::error::RelayError;

/// Default number of compiled patterns kept in the cache.
pub const DEFAULT_PATTERN_CACHE_CAPACITY: u64 = 10_000;

/// The only metacharacter recognised in subscription patterns.
pub const WILDCARD: char = '*';

/// A compiled, reusable wildcard pattern.
///
/// Cloning is cheap: the underlying [`Regex`] shares its compiled program.
#[derive(Debug, Clone)]
pub struct Matcher {
    regex: Regex,
}

impl Matcher {
    /// Compiles `pattern` into a whole-string, case-sensitive matcher.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidPattern`] if the regex engine refuses
    /// the translated expression (in practice only when the pattern exceeds
    /// the engine's size limit).
    pub fn compile(pattern: &str) -> Result<Self, RelayError> {
        Self::build(pattern).map_err(|err| RelayError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        })
    }

    fn build(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&translate(pattern)).map(|regex| Self { regex })
    }

    /// Returns `true` if the whole of `value` matches the pattern.
    #[must_use]
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

/// Translates a wildcard pattern into an anchored regular expression.
///
/// `(?s)` lets `*` span newlines too, so it truly matches any sequence.
fn translate(pattern: &str) -> String {
    let body = pattern
        .split(WILDCARD)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("(?s)^{body}$")
}

/// Compiles wildcard patterns through a bounded, shared cache and tests
/// routing keys against pattern lists.
///
/// One instance is created at startup and shared (`Arc`) between the
/// connection lifecycle, which warms the cache on subscribe, and the
/// broadcaster, which matches every event against it.
pub struct PatternMatcher {
    cache: Cache<String, Matcher>,
}

impl PatternMatcher {
    /// Creates a matcher whose cache holds at most `capacity` patterns.
    #[must_use]
    pub fn new(capacity: u64) -> Self {
        Self {
            cache: Cache::new(capacity),
        }
    }

    /// Returns the compiled matcher for `pattern`, compiling it on a cache
    /// miss.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidPattern`] if the pattern cannot be
    /// compiled. Failures are not cached.
    pub fn compile(&self, pattern: &str) -> Result<Matcher, RelayError> {
        self.cache
            .try_get_with_by_ref(pattern, || Matcher::build(pattern))
            .map_err(|err| RelayError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: err.to_string(),
            })
    }

    /// Returns `true` iff at least one of `patterns` matches the whole of
    /// `value`. Stops at the first match; an empty list never matches and a
    /// pattern that fails to compile never matches.
    #[must_use]
    pub fn match_any<P: AsRef<str>>(&self, value: &str, patterns: &[P]) -> bool {
        patterns.iter().any(|pattern| {
            self.compile(pattern.as_ref())
                .is_ok_and(|matcher| matcher.is_match(value))
        })
    }

    /// Number of cached matchers once pending cache maintenance has run.
    #[cfg(test)]
    pub(crate) fn cached_patterns(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_CACHE_CAPACITY)
    }
}

impl fmt::Debug for PatternMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("cached_patterns", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn matcher(pattern: &str) -> Matcher {
        let Ok(m) = Matcher::compile(pattern) else {
            panic!("pattern {pattern:?} should compile");
        };
        m
    }

    #[test]
    fn prefix_wildcard() {
        let pm = PatternMatcher::default();
        assert!(pm.match_any("enwiki", &["en*"]));
        assert!(!pm.match_any("dewiki", &["en*"]));
    }

    #[test]
    fn dots_are_literal() {
        let m = matcher("a.b");
        assert!(m.is_match("a.b"));
        assert!(!m.is_match("axb"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        for pattern in ["a+b", "(x)", "[ab]", "a?", "a|b", "^a$", r"a\d", "{1}"] {
            let m = matcher(pattern);
            assert!(m.is_match(pattern), "{pattern:?} should match itself");
        }
        assert!(!matcher("a+b").is_match("aab"));
        assert!(!matcher("[ab]").is_match("a"));
        assert!(!matcher("a|b").is_match("b"));
    }

    #[test]
    fn whole_string_only() {
        let m = matcher("wiki");
        assert!(m.is_match("wiki"));
        assert!(!m.is_match("enwiki"));
        assert!(!m.is_match("wikis"));
    }

    #[test]
    fn wildcard_matches_empty_and_any_sequence() {
        let star = matcher("*");
        assert!(star.is_match(""));
        assert!(star.is_match("anything at all"));
        assert!(star.is_match("multi\nline"));

        let infix = matcher("en*wiki");
        assert!(infix.is_match("enwiki"));
        assert!(infix.is_match("en.m.wiki"));
        assert!(!infix.is_match("enwiktionary"));
    }

    #[test]
    fn matching_is_case_sensitive() {
        let pm = PatternMatcher::default();
        assert!(!pm.match_any("ENWIKI", &["en*"]));
    }

    #[test]
    fn empty_pattern_list_never_matches() {
        let pm = PatternMatcher::default();
        let none: [&str; 0] = [];
        assert!(!pm.match_any("enwiki", &none));
    }

    #[test]
    fn any_of_several_patterns() {
        let pm = PatternMatcher::default();
        let patterns = vec!["de*".to_string(), "*wiki".to_string()];
        assert!(pm.match_any("enwiki", &patterns));
        assert!(!pm.match_any("commons", &patterns));
    }

    #[test]
    fn compiling_twice_is_deterministic() {
        let pm = PatternMatcher::default();
        let inputs = ["", "en", "enwiki", "en.wiki", "xenwiki", "en*"];
        for pattern in ["en*", "*.wiki", "a*b*c", "", "*"] {
            let Ok(first) = pm.compile(pattern) else {
                panic!("compile failed");
            };
            let second = matcher(pattern);
            for input in inputs {
                assert_eq!(first.is_match(input), second.is_match(input));
            }
        }
    }

    #[test]
    fn cache_is_bounded() {
        let pm = PatternMatcher::new(4);
        for i in 0..64 {
            assert!(pm.compile(&format!("site{i}*")).is_ok());
        }
        assert!(pm.cached_patterns() <= 4);
        // Evicted patterns still compile and behave the same.
        assert!(pm.match_any("site0wiki", &["site0*"]));
    }

    #[test]
    fn oversized_pattern_is_rejected() {
        let huge = "a*".repeat(500_000);
        let pm = PatternMatcher::default();
        assert!(matches!(
            pm.compile(&huge),
            Err(RelayError::InvalidPattern { .. })
        ));
        assert!(!pm.match_any("a", &[huge]));
    }
}

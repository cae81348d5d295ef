//! Per-connection subscription store.
//!
//! Tracks the wildcard patterns a WebSocket client is subscribed to. The
//! list is capped at [`MAX_SUBSCRIPTIONS`], never holds duplicates and is
//! kept sorted after every mutation: patterns containing `*` first, then
//! shorter before longer, then lexicographic.

use std::cmp::Ordering;

use crate::domain::pattern::WILDCARD;
use crate::error::RelayError;

/// Maximum number of distinct patterns one connection may hold.
pub const MAX_SUBSCRIPTIONS: usize = 10;

/// Ordered, bounded, duplicate-free list of subscription patterns.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SubscriptionStore {
    patterns: Vec<String>,
}

impl SubscriptionStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds patterns in the given order.
    ///
    /// Patterns already present are skipped. Returns the number of patterns
    /// actually added.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SubscriptionCapacityExceeded`] when a new
    /// pattern arrives while the store is full. That pattern and every one
    /// after it in `patterns` are left out; patterns added earlier in the
    /// same call stay.
    pub fn add<S: AsRef<str>>(&mut self, patterns: &[S]) -> Result<usize, RelayError> {
        self.add_accepted(patterns, |_| true)
    }

    /// Like [`SubscriptionStore::add`], but a new pattern is appended only
    /// if `accept` returns `true` for it; rejected patterns are skipped.
    ///
    /// `accept` runs only for patterns that would otherwise be appended:
    /// never for duplicates, and never once the store is full.
    ///
    /// # Errors
    ///
    /// See [`SubscriptionStore::add`].
    pub fn add_accepted<S, F>(&mut self, patterns: &[S], mut accept: F) -> Result<usize, RelayError>
    where
        S: AsRef<str>,
        F: FnMut(&str) -> bool,
    {
        let mut added = 0;
        for pattern in patterns {
            let pattern = pattern.as_ref();
            if self.contains(pattern) {
                continue;
            }
            if self.patterns.len() >= MAX_SUBSCRIPTIONS {
                return Err(RelayError::SubscriptionCapacityExceeded {
                    limit: MAX_SUBSCRIPTIONS,
                });
            }
            if !accept(pattern) {
                continue;
            }
            self.patterns.push(pattern.to_string());
            self.patterns.sort_by(|a, b| subscription_order(a, b));
            added += 1;
        }
        Ok(added)
    }

    /// Removes every listed pattern that is present. Absent patterns are
    /// ignored. Returns the number of patterns removed.
    pub fn remove<S: AsRef<str>>(&mut self, patterns: &[S]) -> usize {
        let before = self.patterns.len();
        self.patterns
            .retain(|held| !patterns.iter().any(|p| p.as_ref() == held));
        before - self.patterns.len()
    }

    /// Returns `true` if `pattern` is held.
    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        self.patterns.iter().any(|held| held == pattern)
    }

    /// The held patterns, in subscription order.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns the number of held patterns.
    #[must_use]
    pub fn count(&self) -> usize {
        self.patterns.len()
    }

    /// Returns `true` if no pattern is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Total order over patterns: wildcard-bearing first, then by length in
/// characters, then lexicographic.
fn subscription_order(a: &str, b: &str) -> Ordering {
    let a_wild = a.contains(WILDCARD);
    let b_wild = b.contains(WILDCARD);
    b_wild
        .cmp(&a_wild)
        .then_with(|| a.chars().count().cmp(&b.chars().count()))
        .then_with(|| a.cmp(b))
}

// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Ordered (pattern, value) list with first-match glob lookup. Backs the
//! package-name blacklist, the extra-package rules, and the URL-prefix to
//! project-group heuristic.

use glob::Pattern;

/// An insertion-ordered table of shell-glob patterns to values, resolved by
/// first match.
#[derive(Debug, Default)]
pub struct GlobValueTable<V> {
    entries: Vec<(Pattern, V)>,
}

impl<V> GlobValueTable<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registers `pattern -> value`. Invalid glob syntax is rejected by the
    /// caller via `push_checked`; this method panics on bad syntax, since
    /// every caller here registers a fixed, compile-time-known glob table.
    pub fn push(&mut self, pattern: &str, value: V) {
        let pattern = Pattern::new(pattern).expect("glob_table: invalid pattern literal");
        self.entries.push((pattern, value));
    }

    pub fn push_checked(&mut self, pattern: &str, value: V) -> Result<(), glob::PatternError> {
        self.entries.push((Pattern::new(pattern)?, value));
        Ok(())
    }

    /// Returns the value of the first pattern that matches `needle`.
    pub fn search(&self, needle: &str) -> Option<&V> {
        self.entries
            .iter()
            .find(|(pattern, _)| pattern.matches(needle))
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_match_wins() {
        let mut table = GlobValueTable::new();
        table.push("foo-*", "first");
        table.push("foo-bar", "second");
        assert_eq!(table.search("foo-bar"), Some(&"first"));
    }

    #[test]
    fn no_match_is_none() {
        let mut table: GlobValueTable<&str> = GlobValueTable::new();
        table.push("foo-*", "x");
        assert_eq!(table.search("bar-baz"), None);
    }

    #[test]
    fn character_classes_work() {
        let mut table = GlobValueTable::new();
        table.push("libgtk-[0-9]*", "gtk");
        assert_eq!(table.search("libgtk-3.so.0"), Some(&"gtk"));
        assert_eq!(table.search("libgtk-x.so.0"), None);
    }
}

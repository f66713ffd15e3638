//! Keyed tallies: "how many X per category" metrics.
//!
//! A [`Counter`] maps a [`CounterKey`] to a non-negative count. Keys keep the
//! order in which they were first seen, counts only ever grow, and nothing is
//! ever removed. Providers build a fresh counter on every collection cycle and
//! hand it to the aggregator, which only reads it.

use std::collections::HashMap;
use std::fmt;

/// Category label of a [`Counter`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CounterKey {
    /// Named category, e.g. a collection name.
    Text(String),
    /// Numeric category, e.g. "users with N sessions".
    Integer(i64),
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Integer(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for CounterKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CounterKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&String> for CounterKey {
    fn from(s: &String) -> Self {
        Self::Text(s.clone())
    }
}

impl From<i64> for CounterKey {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<u64> for CounterKey {
    fn from(n: u64) -> Self {
        Self::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<usize> for CounterKey {
    fn from(n: usize) -> Self {
        Self::Integer(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

/// Insertion-ordered tally of category keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counter {
    entries: Vec<(CounterKey, u64)>,
    index: HashMap<CounterKey, usize>,
}

impl Counter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more occurrence of `key`, creating it at 1 if absent.
    pub fn increment(&mut self, key: impl Into<CounterKey>) {
        self.increment_by(key, 1);
    }

    /// Count `n` more occurrences of `key`.
    ///
    /// The key is created even when `n` is zero, so a category that exists
    /// but is currently empty still shows up in the output.
    pub fn increment_by(&mut self, key: impl Into<CounterKey>, n: u64) {
        let key = key.into();
        match self.index.get(&key) {
            Some(&slot) => {
                let count = &mut self.entries[slot].1;
                *count = count.saturating_add(n);
            }
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, n));
            }
        }
    }

    /// Current count for `key`, if it was ever incremented.
    pub fn get(&self, key: &CounterKey) -> Option<u64> {
        self.index.get(key).map(|&slot| self.entries[slot].1)
    }

    /// Iterate `(key, count)` pairs in insertion order.
    ///
    /// Reading never mutates the counter; call again to restart.
    pub fn entries(&self) -> Entries<'_> {
        Entries {
            inner: self.entries.iter(),
        }
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries
            .iter()
            .fold(0u64, |acc, (_, n)| acc.saturating_add(*n))
    }
}

/// Iterator returned by [`Counter::entries`].
#[derive(Debug, Clone)]
pub struct Entries<'a> {
    inner: std::slice::Iter<'a, (CounterKey, u64)>,
}

impl<'a> Iterator for Entries<'a> {
    type Item = (&'a CounterKey, u64);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, n)| (k, *n))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Entries<'_> {}

impl<'a> IntoIterator for &'a Counter {
    type Item = (&'a CounterKey, u64);
    type IntoIter = Entries<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries()
    }
}

impl<K: Into<CounterKey>> FromIterator<K> for Counter {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        let mut counter = Counter::new();
        for key in iter {
            counter.increment(key);
        }
        counter
    }
}

impl<K: Into<CounterKey>> Extend<K> for Counter {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        for key in iter {
            self.increment(key);
        }
    }
}

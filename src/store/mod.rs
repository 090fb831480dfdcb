//! Run-scoped substitution and extraction store.
//!
//! The feedback channel from response N to request N+1: extraction rules
//! register values here, request resolution reads them back out. One
//! reader/writer lock guards the whole store; rules are append-only and
//! applied strictly in insertion order.

mod extract;


use std::borrow::Cow;
use std::sync::{PoisonError, RwLock};

use regex::{NoExpand, Regex};

use crate::error::StoreError;

pub use extract::{extract_json, extract_regex, extract_xml};

#[derive(Debug)]
struct Replacement {
    pattern: String,
    matcher: Regex,
    value: String,
}

/// Ordered substitution rules plus their registered values.
///
/// Shared across every concurrent attempt in a burst: readers resolve
/// request templates, writers register extracted values. Partial visibility
/// of a freshly added rule across calls is fine; torn state is not, hence
/// the single lock.
#[derive(Debug, Default)]
pub struct DataStore {
    rules: RwLock<Vec<Replacement>>,
}

impl DataStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `pattern` and appends a rule mapping it to `value`.
    /// Existing rules are never reordered or mutated in place.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Pattern`] when the pattern does not compile.
    pub fn add_replacement(&self, pattern: &str, value: &str) -> Result<(), StoreError> {
        let matcher = Regex::new(pattern).map_err(|err| StoreError::Pattern {
            pattern: pattern.to_owned(),
            source: err,
        })?;
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        rules.push(Replacement {
            pattern: pattern.to_owned(),
            matcher,
            value: value.to_owned(),
        });
        Ok(())
    }

    /// Applies every rule in insertion order, replacing all non-overlapping
    /// matches literally. Each rule sees the previous rule's output, so the
    /// order is load-bearing when replacement values can alias later
    /// patterns.
    #[must_use]
    pub fn replace(&self, text: &str) -> String {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = text.to_owned();
        for rule in rules.iter() {
            if let Cow::Owned(replaced) = rule.matcher.replace_all(&out, NoExpand(&rule.value)) {
                out = replaced;
            }
        }
        out
    }

    /// Returns the value most recently registered under `name`, verbatim.
    /// Diagnostic use only.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<String> {
        let rules = self.rules.read().unwrap_or_else(PoisonError::into_inner);
        rules
            .iter()
            .rev()
            .find(|rule| rule.pattern == name)
            .map(|rule| rule.value.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

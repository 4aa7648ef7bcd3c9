//! Ordered placeholder replacement.
//!
//! Tokens are literal strings such as `__PACKAGE__`. Substitution is
//! sequential: each token is replaced everywhere in the current buffer, in
//! insertion order, and text inserted by an earlier token is visible to later
//! tokens but is never re-scanned by the token that produced it.

use crate::error::{KitestError, KitestResult};

/// Insertion-ordered mapping from placeholder token to replacement text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replacements {
    entries: Vec<(String, String)>,
}

impl Replacements {
    /// Create an empty replacement set.
    pub fn new() -> Self {
        Replacements::default()
    }

    /// Set the replacement for `token`.
    ///
    /// A token that is already present keeps its position and gets the new
    /// value. Empty tokens are rejected.
    pub fn insert(
        &mut self,
        token: impl Into<String>,
        value: impl Into<String>,
    ) -> KitestResult<()> {
        let token = token.into();
        if token.is_empty() {
            return Err(KitestError::invalid_args("placeholder token cannot be empty"));
        }
        let value = value.into();

        match self.entries.iter_mut().find(|(t, _)| *t == token) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((token, value)),
        }
        Ok(())
    }

    /// Builder form of [`Replacements::insert`].
    pub fn with(mut self, token: impl Into<String>, value: impl Into<String>) -> KitestResult<Self> {
        self.insert(token, value)?;
        Ok(self)
    }

    /// Iterate over `(token, value)` pairs in application order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply every replacement to `text`, one token at a time.
    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (token, value) in &self.entries {
            if result.contains(token.as_str()) {
                result = result.replace(token.as_str(), value);
            }
        }
        result
    }
}

// ============================================================================
// Tests
// ============================================================================

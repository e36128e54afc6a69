//! Ordered, case-insensitive header map

use core::fmt;

/// Header collection with case-insensitive names and stable insertion order.
///
/// An entry can hold a tombstone instead of a value: merging a tombstone
/// over a default removes that default from the merged result. That is the
/// per-call escape hatch for "send this request without header X even
/// though the client always adds it".
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Option<String>)>,
}

impl Headers {
    /// Empty header map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any existing entry with the same
    /// case-insensitive name. The position of a replaced entry is kept;
    /// the new spelling of the name wins.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.put(name.into(), Some(value.into()));
    }

    /// Mark a header as removed. When these headers are merged over
    /// defaults the tombstone deletes the default entry; a tombstone with
    /// no matching default is inert.
    pub fn unset(&mut self, name: impl Into<String>) {
        self.put(name.into(), None);
    }

    fn put(&mut self, name: String, value: Option<String>) {
        match self.position(&name) {
            Some(idx) => self.entries[idx] = (name, value),
            None => self.entries.push((name, value)),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    /// Look up a header value by case-insensitive name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.iter().find_map(|(existing, value)| {
            if existing.eq_ignore_ascii_case(name) {
                value.as_deref()
            } else {
                None
            }
        })
    }

    /// Whether a live (non-tombstone) entry exists for this name.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Drop the entry with this name entirely, tombstone or not.
    pub fn remove(&mut self, name: &str) {
        if let Some(idx) = self.position(name) {
            self.entries.remove(idx);
        }
    }

    /// Overlay `overrides` on top of these headers.
    ///
    /// Defaults come first in their original order, overridden in place
    /// where names collide; new names are appended in override order.
    /// Tombstones in `overrides` delete the matching default and never
    /// appear in the result.
    pub fn merge(&self, overrides: &Headers) -> Headers {
        let mut merged = self.clone();
        for (name, value) in &overrides.entries {
            match value {
                Some(value) => merged.set(name.clone(), value.clone()),
                None => merged.remove(name),
            }
        }
        merged.entries.retain(|(_, value)| value.is_some());
        merged
    }

    /// Iterate live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(name, value)| value.as_deref().map(|v| (name.as_str(), v)))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no live entries exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<N, V> FromIterator<(N, V)> for Headers
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.set(name, value);
        }
        headers
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
            first = false;
        }
        Ok(())
    }
}

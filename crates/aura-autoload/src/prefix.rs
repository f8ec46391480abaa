//! Ordered prefix-to-directory registry.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::class_file::{LEGACY_SEPARATOR, NAMESPACE_SEPARATOR};

/// A prefix and the base directories registered for it, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixEntry {
    /// Namespace (`Vendor\Package\`) or legacy prefix (`Vendor_`).
    pub prefix: String,

    /// Candidate base directories.
    #[serde(default)]
    pub dirs: Vec<PathBuf>,
}

/// Result of a longest-prefix lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    /// The matched prefix.
    pub prefix: &'a str,

    /// Directories registered for the prefix.
    pub dirs: &'a [PathBuf],

    /// Class name with the prefix and the separator right after it removed.
    /// Falls back to the full class name when nothing is left.
    pub remainder: &'a str,
}

/// Prefix registry. Keys keep first-registration order; directories for a
/// prefix keep call order and are never deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixMap {
    entries: Vec<PrefixEntry>,
}

impl PrefixMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `dir` to the directories for `prefix`.
    pub fn add(&mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) {
        let prefix = prefix.into();
        let dir = dir.into();
        match self.entries.iter_mut().find(|e| e.prefix == prefix) {
            Some(entry) => entry.dirs.push(dir),
            None => self.entries.push(PrefixEntry {
                prefix,
                dirs: vec![dir],
            }),
        }
    }

    /// Directories registered for exactly `prefix`.
    pub fn get(&self, prefix: &str) -> Option<&[PathBuf]> {
        self.entries
            .iter()
            .find(|e| e.prefix == prefix)
            .map(|e| e.dirs.as_slice())
    }

    /// Find the longest registered prefix of `class`.
    ///
    /// On equal lengths the earlier registration wins.
    pub fn longest_match<'a>(&'a self, class: &'a str) -> Option<PrefixMatch<'a>> {
        let mut best: Option<&PrefixEntry> = None;
        for entry in &self.entries {
            if !class.starts_with(entry.prefix.as_str()) {
                continue;
            }
            let longer = match best {
                Some(b) => entry.prefix.len() > b.prefix.len(),
                None => true,
            };
            if longer {
                best = Some(entry);
            }
        }

        best.map(|entry| {
            let remainder = strip_boundary(&entry.prefix, &class[entry.prefix.len()..]);
            PrefixMatch {
                prefix: &entry.prefix,
                dirs: &entry.dirs,
                remainder: if remainder.is_empty() { class } else { remainder },
            }
        })
    }

    /// Iterate entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[PathBuf])> {
        self.entries
            .iter()
            .map(|e| (e.prefix.as_str(), e.dirs.as_slice()))
    }

    /// Whether no prefix is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct prefixes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether `dir` is registered for any prefix.
    pub fn contains_dir(&self, dir: &Path) -> bool {
        self.entries.iter().any(|e| e.dirs.iter().any(|d| d == dir))
    }
}

/// Drop the single separator joining `prefix` to `rest`.
///
/// A prefix that already ends in a separator owns it, so `rest` is kept
/// intact: with prefix `Aura\` the `_` in `Aura\_Private` belongs to the
/// next segment.
fn strip_boundary<'a>(prefix: &str, rest: &'a str) -> &'a str {
    if prefix.ends_with([NAMESPACE_SEPARATOR, LEGACY_SEPARATOR]) {
        return rest;
    }
    rest.strip_prefix([NAMESPACE_SEPARATOR, LEGACY_SEPARATOR])
        .unwrap_or(rest)
}

impl FromIterator<PrefixEntry> for PrefixMap {
    fn from_iter<T: IntoIterator<Item = PrefixEntry>>(iter: T) -> Self {
        let mut map = PrefixMap::new();
        for entry in iter {
            for dir in entry.dirs {
                map.add(entry.prefix.clone(), dir);
            }
        }
        map
    }
}

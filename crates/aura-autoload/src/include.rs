//! File inclusion.
//!
//! The loader never interprets class files itself; it hands the winning path
//! to a [`FileIncluder`]. [`FsIncluder`] reads the file and records which
//! classes it declares, which is enough for resolution tooling and tests.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::class_file::NAMESPACE_SEPARATOR;

lazy_static! {
    /// `namespace Vendor\Package;` or `namespace Vendor\Package {`.
    static ref NAMESPACE_DECL: Regex =
        Regex::new(r"(?m)^\s*namespace\s+([A-Za-z_][A-Za-z0-9_\\]*)\s*[;{]").unwrap();
    /// Class-like declarations, optionally abstract/final.
    static ref TYPE_DECL: Regex = Regex::new(
        r"\b(?:(?:abstract|final)\s+)?(?:class|interface|trait)\s+([A-Za-z_][A-Za-z0-9_]*)"
    )
    .unwrap();
    /// `extends`/`implements` clauses, possibly with a comma-separated list.
    static ref PARENT_CLAUSE: Regex = Regex::new(
        r"\b(?:extends|implements)\s+(\\?[A-Za-z_][A-Za-z0-9_\\]*(?:\s*,\s*\\?[A-Za-z_][A-Za-z0-9_\\]*)*)"
    )
    .unwrap();
    /// `use Vendor\Package\Name;` or `use Vendor\Package\Name as Alias;`.
    static ref USE_IMPORT: Regex = Regex::new(
        r"(?m)^\s*use\s+\\?([A-Za-z_][A-Za-z0-9_\\]*)(?:\s+as\s+([A-Za-z_][A-Za-z0-9_]*))?\s*;"
    )
    .unwrap();
}

/// Loads a located class file.
pub trait FileIncluder {
    /// Include the file at `path`. Called at most once per loaded class.
    fn include(&mut self, path: &Path) -> io::Result<()>;
}

/// A file handed to [`FsIncluder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludedFile {
    /// Path as given by the loader.
    pub path: PathBuf,

    /// Fully-qualified names declared in the file, in source order.
    pub declared: Vec<String>,
}

/// Reads class files from disk and keeps track of what they declare.
#[derive(Debug, Default)]
pub struct FsIncluder {
    included: Vec<IncludedFile>,
    seen: HashSet<PathBuf>,
}

impl FsIncluder {
    /// Create an includer with nothing included.
    pub fn new() -> Self {
        Self::default()
    }

    /// Files included so far, in include order.
    pub fn included(&self) -> &[IncludedFile] {
        &self.included
    }

    /// Every declared class across included files, in declaration order.
    pub fn declared_classes(&self) -> impl Iterator<Item = &str> {
        self.included
            .iter()
            .flat_map(|f| f.declared.iter().map(String::as_str))
    }

    /// Whether `class` was declared by an included file.
    pub fn is_declared(&self, class: &str) -> bool {
        let class = class.trim_start_matches(NAMESPACE_SEPARATOR);
        self.declared_classes().any(|c| c == class)
    }
}

impl FileIncluder for FsIncluder {
    fn include(&mut self, path: &Path) -> io::Result<()> {
        if self.seen.contains(path) {
            debug!(path = %path.display(), "file already included");
            return Ok(());
        }

        let source = fs::read_to_string(path)?;
        let declared = scan_declarations(&source);
        debug!(path = %path.display(), declared = declared.len(), "included file");

        self.seen.insert(path.to_path_buf());
        self.included.push(IncludedFile {
            path: path.to_path_buf(),
            declared,
        });
        Ok(())
    }
}

/// Extract fully-qualified class, interface and trait names from PHP source.
///
/// Only a single file-level namespace is honoured: every declaration after a
/// `namespace` statement is qualified with it.
pub fn scan_declarations(source: &str) -> Vec<String> {
    let namespaces = scan_namespaces(source);

    TYPE_DECL
        .captures_iter(source)
        .filter_map(|c| c.get(1))
        .map(|name| qualify(namespace_at(&namespaces, name.start()), name.as_str()))
        .collect()
}

/// Extract fully-qualified names from `extends` and `implements` clauses.
///
/// Names are resolved the way PHP resolves them: a leading `\` is absolute,
/// a first segment matching a `use` import is replaced by the import, and
/// anything else is relative to the current namespace. Duplicates are dropped.
pub fn scan_parents(source: &str) -> Vec<String> {
    let namespaces = scan_namespaces(source);
    let imports: Vec<(&str, &str)> = USE_IMPORT
        .captures_iter(source)
        .filter_map(|c| {
            let target = c.get(1)?.as_str();
            let alias = match c.get(2) {
                Some(alias) => alias.as_str(),
                None => target.rsplit(NAMESPACE_SEPARATOR).next().unwrap_or(target),
            };
            Some((alias, target))
        })
        .collect();

    let mut parents: Vec<String> = Vec::new();
    for clause in PARENT_CLAUSE.captures_iter(source).filter_map(|c| c.get(1)) {
        for name in clause.as_str().split(',').map(str::trim) {
            let resolved = if let Some(absolute) = name.strip_prefix(NAMESPACE_SEPARATOR) {
                absolute.to_string()
            } else {
                let (first, rest) = match name.split_once(NAMESPACE_SEPARATOR) {
                    Some((first, rest)) => (first, Some(rest)),
                    None => (name, None),
                };
                match imports.iter().find(|(alias, _)| *alias == first) {
                    Some((_, target)) => match rest {
                        Some(rest) => format!("{}\\{}", target, rest),
                        None => target.to_string(),
                    },
                    None => qualify(namespace_at(&namespaces, clause.start()), name),
                }
            };
            if !parents.contains(&resolved) {
                parents.push(resolved);
            }
        }
    }
    parents
}

fn scan_namespaces(source: &str) -> Vec<(usize, &str)> {
    NAMESPACE_DECL
        .captures_iter(source)
        .filter_map(|c| c.get(1).map(|m| (m.start(), m.as_str())))
        .collect()
}

/// Namespace in effect at byte offset `pos`.
fn namespace_at<'a>(namespaces: &[(usize, &'a str)], pos: usize) -> Option<&'a str> {
    namespaces
        .iter()
        .rev()
        .find(|(start, _)| *start < pos)
        .map(|&(_, ns)| ns.trim_matches(NAMESPACE_SEPARATOR))
}

fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}\\{}", ns, name),
        _ => name.to_string(),
    }
}

//! Loader configuration.
//!
//! The default search path (PHP's `include_path`) is injected here rather than
//! read from process state at lookup time.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{LoaderError, LoaderResult};
use crate::prefix::PrefixEntry;

/// Environment variable holding the default search path, in the platform's
/// path-list format (`:` on Unix, `;` on Windows).
pub const INCLUDE_PATH_ENV: &str = "AURA_AUTOLOAD_INCLUDE_PATH";

/// Environment variable toggling the directory caches.
pub const CACHE_DIRS_ENV: &str = "AURA_AUTOLOAD_CACHE_DIRS";

fn default_cache_dirs() -> bool {
    true
}

/// Loader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Directories searched, in order, when no prefix directory has the file.
    #[serde(default)]
    pub include_path: Vec<PathBuf>,

    /// Prefixes registered when the loader is built.
    #[serde(default)]
    pub prefixes: Vec<PrefixEntry>,

    /// Explicit class-to-file mappings registered when the loader is built.
    #[serde(default)]
    pub classes: BTreeMap<String, PathBuf>,

    /// Try the cached class directory before probing prefix directories.
    #[serde(default = "default_cache_dirs")]
    pub cache_dirs: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            include_path: Vec::new(),
            prefixes: Vec::new(),
            classes: BTreeMap::new(),
            cache_dirs: default_cache_dirs(),
        }
    }
}

impl LoaderConfig {
    /// Build from environment variables.
    ///
    /// Without `AURA_AUTOLOAD_INCLUDE_PATH` the search path is the current
    /// directory only.
    pub fn from_env() -> Self {
        let include_path = std::env::var_os(INCLUDE_PATH_ENV)
            .map(|value| {
                std::env::split_paths(&value)
                    .filter(|p| !p.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_else(|| vec![PathBuf::from(".")]);

        Self {
            include_path,
            cache_dirs: std::env::var(CACHE_DIRS_ENV)
                .map(|v| !(v == "0" || v.eq_ignore_ascii_case("false")))
                .unwrap_or_else(|_| default_cache_dirs()),
            ..Default::default()
        }
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read loader config: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("invalid loader config: {}", path.display()))?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> LoaderResult<Self> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| LoaderError::Config {
            message: format!("failed to parse loader config YAML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject entries that could never match anything.
    pub fn validate(&self) -> LoaderResult<()> {
        if let Some(entry) = self.prefixes.iter().find(|e| e.dirs.is_empty()) {
            return Err(LoaderError::Config {
                message: format!("prefix '{}' has no directories", entry.prefix),
            });
        }
        if self.classes.keys().any(|class| class.is_empty()) {
            return Err(LoaderError::Config {
                message: "class map contains an empty class name".to_string(),
            });
        }
        Ok(())
    }

    /// Set the default search path.
    pub fn with_include_path<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.include_path = dirs.into_iter().map(Into::into).collect();
        self
    }

    /// Append a directory to the default search path.
    pub fn with_include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.include_path.push(dir.into());
        self
    }

    /// Seed a prefix directory.
    pub fn with_prefix(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let prefix = prefix.into();
        let dir = dir.into();
        match self.prefixes.iter_mut().find(|e| e.prefix == prefix) {
            Some(entry) => entry.dirs.push(dir),
            None => self.prefixes.push(PrefixEntry {
                prefix,
                dirs: vec![dir],
            }),
        }
        self
    }

    /// Seed an explicit class mapping.
    pub fn with_class(mut self, class: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        self.classes.insert(class.into(), file.into());
        self
    }

    /// Enable or disable the directory caches.
    pub fn with_cache_dirs(mut self, enabled: bool) -> Self {
        self.cache_dirs = enabled;
        self
    }
}

//! Class loader.
//!
//! Resolves class names with the following priority:
//! 1. Explicit class map entry
//! 2. Directories of the longest matching prefix, in registration order
//! 3. Default search path (include path), in order
//!
//! A class is loaded at most once; a repeat request is an error.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::class_file::{class_to_file, class_to_subdir, CLASS_FILE_EXTENSION};
use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::include::{scan_parents, FileIncluder, FsIncluder};
use crate::prefix::PrefixMap;
use crate::resolver::{AutoloadStack, ClassResolver};

/// Where a class file was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadSource {
    /// Explicit class map entry.
    ClassMap,

    /// Directory registered for a prefix.
    Prefix(String),

    /// Default search path entry.
    IncludePath(PathBuf),
}

impl std::fmt::Display for LoadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClassMap => write!(f, "classmap"),
            Self::Prefix(prefix) => write!(f, "prefix:{}", prefix),
            Self::IncludePath(dir) => write!(f, "include_path:{}", dir.display()),
        }
    }
}

/// A located class file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClass {
    /// File to include.
    pub path: PathBuf,

    /// How the file was found.
    pub source: LoadSource,
}

/// PSR-0 class loader.
#[derive(Debug)]
pub struct Loader<I: FileIncluder = FsIncluder> {
    /// Prefix to base directories.
    prefixes: PrefixMap,

    /// Explicit class to file overrides.
    classes: BTreeMap<String, PathBuf>,

    /// Classes loaded so far and the file each came from.
    loaded: BTreeMap<String, PathBuf>,

    /// Fallback search path.
    include_path: Vec<PathBuf>,

    /// Try the cached class directory before probing prefix directories.
    cache_dirs: bool,

    /// Class to the prefix directory its file was found in.
    dir_cache: BTreeMap<String, PathBuf>,

    /// Class to its own directory under that prefix directory.
    subdir_cache: BTreeMap<String, PathBuf>,

    /// Class to the prefix it matched.
    prefix_cache: BTreeMap<String, String>,

    includer: I,
}

impl Default for Loader<FsIncluder> {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader<FsIncluder> {
    /// Create a loader with an empty search path.
    pub fn new() -> Self {
        Self::build(LoaderConfig::default(), FsIncluder::new())
    }

    /// Create a loader from configuration.
    pub fn with_config(config: LoaderConfig) -> LoaderResult<Self> {
        Self::with_includer(config, FsIncluder::new())
    }

    /// Create a loader configured from the environment.
    pub fn from_env() -> Self {
        Self::build(LoaderConfig::from_env(), FsIncluder::new())
    }
}

impl<I: FileIncluder> Loader<I> {
    /// Create a loader with a custom includer.
    pub fn with_includer(config: LoaderConfig, includer: I) -> LoaderResult<Self> {
        config.validate()?;
        Ok(Self::build(config, includer))
    }

    fn build(config: LoaderConfig, includer: I) -> Self {
        Self {
            prefixes: config.prefixes.into_iter().collect(),
            classes: config.classes,
            loaded: BTreeMap::new(),
            include_path: config.include_path,
            cache_dirs: config.cache_dirs,
            dir_cache: BTreeMap::new(),
            subdir_cache: BTreeMap::new(),
            prefix_cache: BTreeMap::new(),
            includer,
        }
    }

    /// Register a base directory for a namespace or legacy prefix.
    ///
    /// Directories accumulate; registering the same one twice searches it twice.
    pub fn add_prefix(&mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) {
        let prefix = prefix.into();
        let dir = dir.into();
        debug!(prefix = %prefix, dir = %dir.display(), "added prefix");
        self.prefixes.add(prefix, dir);

        // Longest-match results may have changed.
        self.dir_cache.clear();
        self.subdir_cache.clear();
        self.prefix_cache.clear();
    }

    /// Map a class directly to a file, replacing any earlier mapping.
    pub fn add_class(&mut self, class: impl Into<String>, file: impl Into<PathBuf>) {
        let class = class.into();
        let file = file.into();
        debug!(class = %class, file = %file.display(), "added class");
        self.classes.insert(class, file);
    }

    /// Registered prefixes.
    pub fn prefixes(&self) -> &PrefixMap {
        &self.prefixes
    }

    /// Explicit class mappings.
    pub fn classes(&self) -> &BTreeMap<String, PathBuf> {
        &self.classes
    }

    /// Classes loaded so far.
    pub fn loaded(&self) -> &BTreeMap<String, PathBuf> {
        &self.loaded
    }

    /// Whether `class` has been loaded.
    pub fn is_loaded(&self, class: &str) -> bool {
        self.loaded.contains_key(class)
    }

    /// Fallback search path.
    pub fn include_path(&self) -> &[PathBuf] {
        &self.include_path
    }

    /// The includer.
    pub fn includer(&self) -> &I {
        &self.includer
    }

    /// Relative file path for `class`.
    pub fn class_to_file(&self, class: &str) -> PathBuf {
        class_to_file(class)
    }

    /// Prefix directory each cached class was found in.
    ///
    /// Resolves `class` and, transitively, the classes its file extends or
    /// implements, caching every one found under a prefix directory.
    pub fn dirs(&mut self, class: &str) -> &BTreeMap<String, PathBuf> {
        self.cache_with_parents(class);
        &self.dir_cache
    }

    /// Directory of each cached class under its prefix directory
    /// (`<dir>/<Class>`), resolved the same way as [`Loader::dirs`].
    pub fn subdirs(&mut self, class: &str) -> &BTreeMap<String, PathBuf> {
        self.cache_with_parents(class);
        &self.subdir_cache
    }

    fn cache_with_parents(&mut self, class: &str) {
        let mut pending = vec![class.to_string()];
        let mut seen = HashSet::new();

        while let Some(next) = pending.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            let Some(resolved) = self.find_in_prefix(&next) else {
                continue;
            };
            match fs::read_to_string(&resolved.path) {
                Ok(source) => {
                    let parents = scan_parents(&source);
                    debug!(class = %next, parents = parents.len(), "scanned class file for parents");
                    pending.extend(parents);
                }
                Err(e) => {
                    debug!(class = %next, path = %resolved.path.display(), error = %e, "could not scan class file");
                }
            }
        }
    }

    /// Search the longest matching prefix's directories, caching the hit.
    fn find_in_prefix(&mut self, class: &str) -> Option<ResolvedClass> {
        if self.cache_dirs {
            if let (Some(prefix), Some(subdir)) =
                (self.prefix_cache.get(class), self.subdir_cache.get(class))
            {
                let path = subdir.with_extension(CLASS_FILE_EXTENSION);
                if path.is_file() {
                    debug!(class, path = %path.display(), "using cached class directory");
                    return Some(ResolvedClass {
                        path,
                        source: LoadSource::Prefix(prefix.clone()),
                    });
                }
            }
        }

        let found = self.prefixes.longest_match(class)?;
        let prefix = found.prefix.to_string();
        let relative = class_to_subdir(found.remainder);

        let mut hit = None;
        for dir in found.dirs {
            let subdir = dir.join(&relative);
            let path = subdir.with_extension(CLASS_FILE_EXTENSION);
            debug!(class, path = %path.display(), "probing prefix directory");
            if path.is_file() {
                hit = Some((dir.clone(), subdir, path));
                break;
            }
        }

        let (dir, subdir, path) = hit?;
        self.dir_cache.insert(class.to_string(), dir);
        self.subdir_cache.insert(class.to_string(), subdir);
        self.prefix_cache.insert(class.to_string(), prefix.clone());
        Some(ResolvedClass {
            path,
            source: LoadSource::Prefix(prefix),
        })
    }

    /// Locate the file for `class` without loading it.
    pub fn find_file(&mut self, class: &str) -> Option<ResolvedClass> {
        // 1. Explicit mapping always wins
        if let Some(path) = self.classes.get(class) {
            debug!(class, path = %path.display(), "found class in class map");
            return Some(ResolvedClass {
                path: path.clone(),
                source: LoadSource::ClassMap,
            });
        }

        // 2. Longest matching prefix
        if let Some(resolved) = self.find_in_prefix(class) {
            return Some(resolved);
        }

        // 3. Default search path
        let relative = class_to_file(class);
        for dir in &self.include_path {
            let path = dir.join(&relative);
            debug!(class, path = %path.display(), "probing include path");
            if path.is_file() {
                return Some(ResolvedClass {
                    path,
                    source: LoadSource::IncludePath(dir.clone()),
                });
            }
        }

        None
    }

    /// Locate, include and record `class`.
    pub fn load(&mut self, class: &str) -> LoaderResult<ResolvedClass> {
        if let Some(path) = self.loaded.get(class) {
            return Err(LoaderError::AlreadyLoaded {
                class: class.to_string(),
                path: path.clone(),
            });
        }

        let Some(resolved) = self.find_file(class) else {
            return Err(LoaderError::NotFound {
                class: class.to_string(),
                relative: class_to_file(class),
                prefix_relative: self
                    .prefixes
                    .longest_match(class)
                    .map(|found| class_to_file(found.remainder)),
            });
        };

        if let Err(source) = self.includer.include(&resolved.path) {
            warn!(class, path = %resolved.path.display(), error = %source, "include failed");
            return Err(LoaderError::Include {
                class: class.to_string(),
                path: resolved.path,
                source,
            });
        }

        info!(class, path = %resolved.path.display(), source = %resolved.source, "loaded class");
        self.loaded
            .insert(class.to_string(), resolved.path.clone());
        Ok(resolved)
    }

    /// Append this loader to an autoload stack.
    pub fn register<'a>(&'a mut self, stack: &mut AutoloadStack<'a>)
    where
        I: 'a,
    {
        stack.register(self);
    }
}

impl<I: FileIncluder> ClassResolver for Loader<I> {
    fn resolve(&mut self, class: &str) -> LoaderResult<()> {
        self.load(class).map(|_| ())
    }

    fn name(&self) -> &str {
        "loader"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io;
    use std::path::Path;
    use tempfile::TempDir;

    /// Records include calls without touching the filesystem.
    #[derive(Debug, Default)]
    struct RecordingIncluder {
        calls: Vec<PathBuf>,
        fail: bool,
    }

    impl FileIncluder for RecordingIncluder {
        fn include(&mut self, path: &Path) -> io::Result<()> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            self.calls.push(path.to_path_buf());
            Ok(())
        }
    }

    fn write_class(dir: &Path, relative: &str, class: &str) -> PathBuf {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, format!("<?php class {} {{}}", class)).unwrap();
        path
    }

    fn recording_loader() -> Loader<RecordingIncluder> {
        Loader::with_includer(LoaderConfig::default(), RecordingIncluder::default()).unwrap()
    }

    #[test]
    fn test_add_prefix_and_prefixes() {
        let mut loader = Loader::new();
        loader.add_prefix("Foo_", "/path/to/Foo");

        let prefixes: Vec<(&str, &[PathBuf])> = loader.prefixes().iter().collect();
        assert_eq!(prefixes.len(), 1);
        assert_eq!(prefixes[0].0, "Foo_");
        assert_eq!(prefixes[0].1, &[PathBuf::from("/path/to/Foo")]);
    }

    #[test]
    fn test_add_class_and_classes() {
        let mut loader = Loader::new();
        loader.add_class("FooBar", "/path/to/FooBar.php");
        loader.add_class("FooBar", "/other/FooBar.php");

        let mut expected = BTreeMap::new();
        expected.insert("FooBar".to_string(), PathBuf::from("/other/FooBar.php"));
        assert_eq!(loader.classes(), &expected);
    }

    #[test]
    fn test_load_via_prefix_strips_prefix() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_class(temp_dir.path(), "MockAutoloadClass.php", "MockAutoloadClass");

        let mut loader = recording_loader();
        loader.add_prefix("Aura\\Autoload\\", temp_dir.path());

        let resolved = loader.load("Aura\\Autoload\\MockAutoloadClass").unwrap();
        assert_eq!(resolved.path, file);
        assert_eq!(
            resolved.source,
            LoadSource::Prefix("Aura\\Autoload\\".to_string())
        );
        assert_eq!(loader.includer().calls, vec![file.clone()]);

        let mut expected = BTreeMap::new();
        expected.insert("Aura\\Autoload\\MockAutoloadClass".to_string(), file);
        assert_eq!(loader.loaded(), &expected);
    }

    #[test]
    fn test_prefix_dirs_searched_in_order() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let third = TempDir::new().unwrap();
        let in_second = write_class(second.path(), "Table/Row.php", "Zend_Table_Row");
        write_class(third.path(), "Table/Row.php", "Zend_Table_Row");

        let mut loader = recording_loader();
        loader.add_prefix("Zend_", first.path());
        loader.add_prefix("Zend_", second.path());
        loader.add_prefix("Zend_", third.path());

        let resolved = loader.load("Zend_Table_Row").unwrap();
        assert_eq!(resolved.path, in_second);
    }

    #[test]
    fn test_longest_prefix_is_used() {
        let general = TempDir::new().unwrap();
        let specific = TempDir::new().unwrap();
        write_class(general.path(), "Web/Page.php", "Page");
        let expected = write_class(specific.path(), "Page.php", "Page");

        let mut loader = recording_loader();
        loader.add_prefix("Aura\\", general.path());
        loader.add_prefix("Aura\\Web\\", specific.path());

        let resolved = loader.load("Aura\\Web\\Page").unwrap();
        assert_eq!(resolved.path, expected);
        assert_eq!(resolved.source.to_string(), "prefix:Aura\\Web\\");
    }

    #[test]
    fn test_class_map_takes_precedence() {
        let prefix_dir = TempDir::new().unwrap();
        write_class(prefix_dir.path(), "Thing.php", "Thing");
        let mapped = TempDir::new().unwrap();
        let explicit = write_class(mapped.path(), "Elsewhere.php", "Thing");

        let mut loader = recording_loader();
        loader.add_prefix("Vendor\\", prefix_dir.path());
        loader.add_class("Vendor\\Thing", &explicit);

        let resolved = loader.load("Vendor\\Thing").unwrap();
        assert_eq!(resolved.path, explicit);
        assert_eq!(resolved.source, LoadSource::ClassMap);
    }

    #[test]
    fn test_falls_back_to_include_path() {
        let prefix_dir = TempDir::new().unwrap();
        let include_dir = TempDir::new().unwrap();
        let file = write_class(include_dir.path(), "Vendor/Thing.php", "Thing");

        let config = LoaderConfig::default()
            .with_include_dir("/nonexistent/include/dir")
            .with_include_dir(include_dir.path());
        let mut loader = Loader::with_includer(config, RecordingIncluder::default()).unwrap();
        loader.add_prefix("Vendor\\", prefix_dir.path());

        let resolved = loader.load("Vendor\\Thing").unwrap();
        assert_eq!(resolved.path, file);
        assert_eq!(
            resolved.source,
            LoadSource::IncludePath(include_dir.path().to_path_buf())
        );
    }

    #[test]
    fn test_not_found_leaves_state_unchanged() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = recording_loader();
        loader.add_prefix("Aura\\Autoload\\", temp_dir.path());

        let err = loader.load("Aura\\Autoload\\NoSuchClass").unwrap_err();
        match err {
            LoaderError::NotFound {
                class,
                relative,
                prefix_relative,
            } => {
                assert_eq!(class, "Aura\\Autoload\\NoSuchClass");
                assert_eq!(relative, PathBuf::from("Aura/Autoload/NoSuchClass.php"));
                assert_eq!(prefix_relative, Some(PathBuf::from("NoSuchClass.php")));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(loader.loaded().is_empty());
        assert!(loader.includer().calls.is_empty());
    }

    #[test]
    fn test_load_twice_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_class(temp_dir.path(), "MockAutoloadAlready.php", "MockAutoloadAlready");

        let mut loader = recording_loader();
        loader.add_prefix("Aura\\Autoload\\", temp_dir.path());
        loader.load("Aura\\Autoload\\MockAutoloadAlready").unwrap();

        let err = loader.load("Aura\\Autoload\\MockAutoloadAlready").unwrap_err();
        match err {
            LoaderError::AlreadyLoaded { path, .. } => assert_eq!(path, file),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(loader.loaded().len(), 1);
        assert_eq!(loader.includer().calls.len(), 1);
    }

    #[test]
    fn test_include_failure_is_not_recorded() {
        let temp_dir = TempDir::new().unwrap();
        write_class(temp_dir.path(), "Foo.php", "Foo");

        let includer = RecordingIncluder {
            fail: true,
            ..Default::default()
        };
        let config = LoaderConfig::default().with_include_dir(temp_dir.path());
        let mut loader = Loader::with_includer(config, includer).unwrap();

        let err = loader.load("Foo").unwrap_err();
        assert!(matches!(err, LoaderError::Include { .. }));
        assert!(!loader.is_loaded("Foo"));
    }

    #[test]
    fn test_dirs_hold_the_directory_that_had_the_file() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let file = write_class(second.path(), "X.php", "X");

        let mut loader = recording_loader();
        loader.add_prefix("V\\", first.path());
        loader.add_prefix("V\\", second.path());
        loader.load("V\\X").unwrap();

        assert_eq!(
            loader.dirs("V\\X").get("V\\X"),
            Some(&second.path().to_path_buf())
        );
        assert_eq!(
            loader.subdirs("V\\X").get("V\\X"),
            Some(&second.path().join("X"))
        );
        assert_eq!(loader.find_file("V\\X").unwrap().path, file);
    }

    #[test]
    fn test_dirs_follow_parent_classes() {
        let temp_dir = TempDir::new().unwrap();
        write_class(temp_dir.path(), "MockAutoloadClass.php", "MockAutoloadClass");
        fs::write(
            temp_dir.path().join("MockAutoloadChild.php"),
            "<?php\nnamespace Aura\\Autoload;\nclass MockAutoloadChild extends MockAutoloadClass {}\n",
        )
        .unwrap();

        let mut loader = recording_loader();
        loader.add_prefix("Aura\\Autoload\\", temp_dir.path());

        let dirs = loader.dirs("Aura\\Autoload\\MockAutoloadChild").clone();
        let mut expected = BTreeMap::new();
        expected.insert(
            "Aura\\Autoload\\MockAutoloadChild".to_string(),
            temp_dir.path().to_path_buf(),
        );
        expected.insert(
            "Aura\\Autoload\\MockAutoloadClass".to_string(),
            temp_dir.path().to_path_buf(),
        );
        assert_eq!(dirs, expected);

        // Resolving for the caches neither loads nor includes anything.
        assert!(loader.loaded().is_empty());
        assert!(loader.includer().calls.is_empty());

        let subdirs = loader.subdirs("Aura\\Autoload\\MockAutoloadChild").clone();
        assert_eq!(
            subdirs.get("Aura\\Autoload\\MockAutoloadClass"),
            Some(&temp_dir.path().join("MockAutoloadClass"))
        );
        assert_eq!(loader.subdirs("Aura\\Autoload\\MockAutoloadChild"), &subdirs);
    }

    #[test]
    fn test_dirs_skip_unresolvable_classes() {
        let mut loader = recording_loader();
        loader.add_prefix("Aura\\", "/nonexistent/aura");

        assert!(loader.dirs("Aura\\Missing").is_empty());
        assert!(loader.subdirs("Unprefixed").is_empty());
    }

    #[test]
    fn test_add_prefix_invalidates_cache() {
        let aura = TempDir::new().unwrap();
        let autoload = TempDir::new().unwrap();
        write_class(aura.path(), "Autoload/Loader.php", "Loader");
        write_class(autoload.path(), "Loader.php", "Loader");

        let mut loader = recording_loader();
        loader.add_prefix("Aura\\", aura.path());
        assert_eq!(
            loader.dirs("Aura\\Autoload\\Loader").get("Aura\\Autoload\\Loader"),
            Some(&aura.path().to_path_buf())
        );

        loader.add_prefix("Aura\\Autoload\\", autoload.path());
        assert_eq!(
            loader.dirs("Aura\\Autoload\\Loader").get("Aura\\Autoload\\Loader"),
            Some(&autoload.path().to_path_buf())
        );
        assert_eq!(
            loader.subdirs("Aura\\Autoload\\Loader").get("Aura\\Autoload\\Loader"),
            Some(&autoload.path().join("Loader"))
        );
    }

    #[test]
    fn test_segment_underscore_after_prefix_is_kept() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_class(temp_dir.path(), "_Private/Thing.php", "Thing");

        let mut loader = recording_loader();
        loader.add_prefix("Aura\\", temp_dir.path());

        let resolved = loader.load("Aura\\_Private\\Thing").unwrap();
        assert_eq!(resolved.path, file);
    }

    #[test]
    fn test_not_found_reports_prefix_relative_path() {
        let temp_dir = TempDir::new().unwrap();
        let mut loader = recording_loader();
        loader.add_prefix("Aura\\", temp_dir.path());

        let err = loader.load("Aura\\_Private\\Missing").unwrap_err();
        match &err {
            LoaderError::NotFound {
                relative,
                prefix_relative,
                ..
            } => {
                assert_eq!(relative, &PathBuf::from("Aura/_Private/Missing.php"));
                assert_eq!(
                    prefix_relative.as_deref(),
                    Some(Path::new("_Private/Missing.php"))
                );
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(err.to_string().contains("_Private/Missing.php under prefix dirs"));

        let err = loader.load("Unprefixed").unwrap_err();
        assert!(matches!(
            err,
            LoaderError::NotFound {
                prefix_relative: None,
                ..
            }
        ));
    }

    #[test]
    fn test_uncached_lookup_matches_cached() {
        let temp_dir = TempDir::new().unwrap();
        let file = write_class(temp_dir.path(), "Baz/Dib.php", "Foo_Baz_Dib");

        let config = LoaderConfig::default().with_cache_dirs(false);
        let mut uncached = Loader::with_includer(config, RecordingIncluder::default()).unwrap();
        uncached.add_prefix("Foo_", temp_dir.path());
        let mut cached = recording_loader();
        cached.add_prefix("Foo_", temp_dir.path());

        assert_eq!(uncached.find_file("Foo_Baz_Dib").unwrap().path, file);
        assert_eq!(cached.find_file("Foo_Baz_Dib").unwrap().path, file);
        assert_eq!(cached.find_file("Foo_Baz_Dib").unwrap().path, file);
    }

    #[test]
    fn test_register() {
        let mut loader = Loader::new();
        let mut stack = AutoloadStack::new();
        loader.register(&mut stack);

        assert_eq!(stack.names().last(), Some(&"loader"));
        assert!(stack.resolve("NoSuchClass").unwrap_err().is_not_found());
    }
}

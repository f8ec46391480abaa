//! Error types for the autoloader.

use std::path::{Path, PathBuf};

/// Autoloader errors.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Class was already loaded by this loader.
    #[error("class already loaded: {class} (from {})", .path.display())]
    AlreadyLoaded { class: String, path: PathBuf },

    /// No class map entry, prefix directory or include path entry had a file.
    ///
    /// `relative` is the path probed on the include path; `prefix_relative`
    /// is the path probed under the matched prefix's directories, if any.
    #[error("class not found: {class} ({})", describe_probes(.relative, .prefix_relative.as_deref()))]
    NotFound {
        class: String,
        relative: PathBuf,
        prefix_relative: Option<PathBuf>,
    },

    /// The includer failed on a file that was located.
    #[error("failed to include {} for {class}: {source}", .path.display())]
    Include {
        class: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl LoaderError {
    /// Whether the class could not be located anywhere.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the class was rejected as a repeat load.
    pub fn is_already_loaded(&self) -> bool {
        matches!(self, Self::AlreadyLoaded { .. })
    }

    /// Class name the error refers to, if any.
    pub fn class(&self) -> Option<&str> {
        match self {
            Self::AlreadyLoaded { class, .. }
            | Self::NotFound { class, .. }
            | Self::Include { class, .. } => Some(class),
            Self::Config { .. } => None,
        }
    }
}

fn describe_probes(relative: &Path, prefix_relative: Option<&Path>) -> String {
    match prefix_relative {
        Some(under_prefix) => format!(
            "no file for {} under prefix dirs or {} on include path",
            under_prefix.display(),
            relative.display()
        ),
        None => format!("no file for {}", relative.display()),
    }
}

/// Result type for autoloader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LoaderError::NotFound {
            class: "Vendor\\Missing".to_string(),
            relative: PathBuf::from("Vendor/Missing.php"),
            prefix_relative: None,
        };
        assert_eq!(
            err.to_string(),
            "class not found: Vendor\\Missing (no file for Vendor/Missing.php)"
        );

        let err = LoaderError::NotFound {
            class: "Aura\\_Private\\Thing".to_string(),
            relative: PathBuf::from("Aura/_Private/Thing.php"),
            prefix_relative: Some(PathBuf::from("_Private/Thing.php")),
        };
        assert_eq!(
            err.to_string(),
            "class not found: Aura\\_Private\\Thing (no file for _Private/Thing.php under prefix dirs or Aura/_Private/Thing.php on include path)"
        );

        let err = LoaderError::AlreadyLoaded {
            class: "Foo".to_string(),
            path: PathBuf::from("/src/Foo.php"),
        };
        assert_eq!(
            err.to_string(),
            "class already loaded: Foo (from /src/Foo.php)"
        );
    }

    #[test]
    fn test_error_predicates() {
        let not_found = LoaderError::NotFound {
            class: "Foo".to_string(),
            relative: PathBuf::from("Foo.php"),
            prefix_relative: None,
        };
        assert!(not_found.is_not_found());
        assert!(!not_found.is_already_loaded());
        assert_eq!(not_found.class(), Some("Foo"));

        let config = LoaderError::Config {
            message: "bad".to_string(),
        };
        assert!(!config.is_not_found());
        assert_eq!(config.class(), None);
    }
}

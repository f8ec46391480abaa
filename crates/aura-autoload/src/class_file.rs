//! Class name to relative path transform.
//!
//! Namespace separators (`\`) become directory separators. Within the final
//! segment only, the legacy pseudo-namespace separator (`_`) also becomes a
//! directory separator, so `foo_bar\Baz_Dib` maps to `foo_bar/Baz/Dib.php`.

use std::path::PathBuf;

/// Namespace separator in PHP class names.
pub const NAMESPACE_SEPARATOR: char = '\\';

/// Legacy pseudo-namespace separator (`Zend_Db_Table` style).
pub const LEGACY_SEPARATOR: char = '_';

/// Extension appended to every class file.
pub const CLASS_FILE_EXTENSION: &str = "php";

/// Split a class name into its path segments.
fn path_segments(class: &str) -> Vec<&str> {
    let class = class.trim_start_matches(NAMESPACE_SEPARATOR);
    let (namespace, tail) = match class.rfind(NAMESPACE_SEPARATOR) {
        Some(idx) => (&class[..idx], &class[idx + 1..]),
        None => ("", class),
    };

    namespace
        .split(NAMESPACE_SEPARATOR)
        .chain(tail.split(LEGACY_SEPARATOR))
        .filter(|segment| !segment.is_empty())
        .collect()
}

/// Transform a class name into the relative path of the file declaring it.
///
/// ```
/// use std::path::PathBuf;
/// use aura_autoload::class_to_file;
///
/// assert_eq!(class_to_file("foo_bar\\Baz_Dib"), PathBuf::from("foo_bar/Baz/Dib.php"));
/// ```
pub fn class_to_file(class: &str) -> PathBuf {
    let segments = path_segments(class);
    let mut path = PathBuf::new();
    if let Some((last, dirs)) = segments.split_last() {
        path.extend(dirs);
        path.push(format!("{}.{}", last, CLASS_FILE_EXTENSION));
    }
    path
}

/// Same as [`class_to_file`] without the extension: the directory holding
/// files nested under the class.
pub fn class_to_subdir(class: &str) -> PathBuf {
    path_segments(class).into_iter().collect()
}

//! PSR-0 class resolution for PHP class names.
//!
//! This crate provides:
//!
//! - The class-name to relative-path transform (`Vendor\Pkg\Foo_Bar` →
//!   `Vendor/Pkg/Foo/Bar.php`)
//! - An ordered prefix registry with longest-prefix matching
//! - Explicit class-to-file overrides
//! - A loader that records what it loaded and refuses repeat loads
//! - A resolver stack standing in for the host's autoload hooks
//!
//! # Quick Start
//!
//! ```no_run
//! use aura_autoload::{Loader, LoaderConfig};
//!
//! # fn example() -> aura_autoload::LoaderResult<()> {
//! let mut loader = Loader::with_config(LoaderConfig::from_env())?;
//! loader.add_prefix("Aura\\Autoload\\", "src/Aura/Autoload");
//! loader.add_class("Legacy_Helper", "lib/helpers.php");
//!
//! let resolved = loader.load("Aura\\Autoload\\Loader")?;
//! println!("loaded from {} ({})", resolved.path.display(), resolved.source);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `AURA_AUTOLOAD_INCLUDE_PATH` | Fallback search path, platform path-list format (default: `.`) |
//! | `AURA_AUTOLOAD_CACHE_DIRS` | Memoize prefix lookups per class (default: true) |

pub mod class_file;
pub mod config;
pub mod error;
pub mod include;
pub mod loader;
pub mod prefix;
pub mod resolver;

// Re-export main types
pub use class_file::{class_to_file, class_to_subdir};
pub use config::LoaderConfig;
pub use error::{LoaderError, LoaderResult};
pub use include::{FileIncluder, FsIncluder, IncludedFile};
pub use loader::{LoadSource, Loader, ResolvedClass};
pub use prefix::{PrefixEntry, PrefixMap};
pub use resolver::{AutoloadStack, ClassResolver};

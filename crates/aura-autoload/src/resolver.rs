//! Fallback class resolution.
//!
//! [`AutoloadStack`] stands in for the host runtime's list of autoload hooks:
//! when a class reference cannot be satisfied, each registered
//! [`ClassResolver`] is asked in registration order until one succeeds.

use tracing::debug;

use crate::class_file::class_to_file;
use crate::error::{LoaderError, LoaderResult};

/// Something that can make a class available on demand.
pub trait ClassResolver {
    /// Resolve and load `class`.
    ///
    /// Returns [`LoaderError::NotFound`] when this resolver has no file for
    /// the class, letting the next resolver try.
    fn resolve(&mut self, class: &str) -> LoaderResult<()>;

    /// Short name used for introspection.
    fn name(&self) -> &str {
        "anonymous"
    }
}

impl<F> ClassResolver for F
where
    F: FnMut(&str) -> LoaderResult<()>,
{
    fn resolve(&mut self, class: &str) -> LoaderResult<()> {
        self(class)
    }
}

/// Ordered list of fallback resolvers.
#[derive(Default)]
pub struct AutoloadStack<'a> {
    resolvers: Vec<&'a mut dyn ClassResolver>,
}

impl<'a> AutoloadStack<'a> {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver. Later registrations are consulted last.
    pub fn register(&mut self, resolver: &'a mut dyn ClassResolver) {
        debug!(resolver = resolver.name(), "registered class resolver");
        self.resolvers.push(resolver);
    }

    /// Names of registered resolvers, in consultation order.
    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Number of registered resolvers.
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Whether no resolver is registered.
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    /// Ask each resolver in turn for `class`.
    ///
    /// A `NotFound` from one resolver moves on to the next; any other error
    /// stops the search and is returned as is.
    pub fn resolve(&mut self, class: &str) -> LoaderResult<()> {
        for resolver in self.resolvers.iter_mut() {
            match resolver.resolve(class) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_not_found() => {
                    debug!(class, resolver = resolver.name(), "resolver has no file");
                }
                Err(e) => return Err(e),
            }
        }

        Err(LoaderError::NotFound {
            class: class.to_string(),
            relative: class_to_file(class),
            prefix_relative: None,
        })
    }
}

impl std::fmt::Debug for AutoloadStack<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoloadStack")
            .field("resolvers", &self.names())
            .finish()
    }
}

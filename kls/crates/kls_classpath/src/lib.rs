//! Class-name resolution for module classpaths.
//!
//! Every classpath tier of a module (its own compiled sources, its declared
//! dependencies and the platform boot classpath) is reduced to a sorted set
//! of top-level class names. Scanning only reads archive directories and
//! file names, so large platform jars never have to be inflated.

mod boot;
mod cache;
mod class_names;
mod classfile;
mod resolver;
mod scanner;

pub use boot::{BootClasspathCache, BootSnapshot};
pub use cache::{CacheError, CacheFingerprint, CacheMetrics, CachedClasses, ClassIndexCache};
pub use class_names::ClassNameSet;
pub use classfile::{read_class_name, ClassParseError};
pub use resolver::{ClasspathResolver, ResolveError};
pub use scanner::{top_level_class_name, ClasspathScanner, ScanError, ScanOutcome, SkippedEntry};

#[cfg(test)]
pub(crate) mod test_support;

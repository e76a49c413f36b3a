use crate::cache::ClassIndexCache;
use crate::class_names::ClassNameSet;
use crate::classfile::{read_class_name, ClassParseError};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("classpath entry {path} does not exist")]
    Missing { path: PathBuf },
    #[error("IO error while scanning {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("ZIP error while scanning {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: ZipError,
    },
    #[error("class parse error in {path}: {source}")]
    ClassFile {
        path: PathBuf,
        #[source]
        source: ClassParseError,
    },
    #[error("unsupported classpath entry {path}")]
    Unsupported { path: PathBuf },
}

impl ScanError {
    pub fn path(&self) -> &Path {
        match self {
            ScanError::Missing { path }
            | ScanError::Io { path, .. }
            | ScanError::Zip { path, .. }
            | ScanError::ClassFile { path, .. }
            | ScanError::Unsupported { path } => path,
        }
    }
}

/// A classpath entry left out of a best-effort scan.
#[derive(Debug)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub error: ScanError,
}

/// Result of scanning several classpath entries.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub classes: ClassNameSet,
    pub skipped: Vec<SkippedEntry>,
}

/// Extracts top-level class names from archives, class directories and
/// standalone class files.
#[derive(Debug, Clone, Default)]
pub struct ClasspathScanner {
    cache: Option<ClassIndexCache>,
}

impl ClasspathScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist per-entry results in `cache` and consult it before scanning.
    pub fn with_cache(cache: ClassIndexCache) -> Self {
        Self { cache: Some(cache) }
    }

    pub fn cache(&self) -> Option<&ClassIndexCache> {
        self.cache.as_ref()
    }

    /// Scan every entry, skipping (and logging) the ones that cannot be read.
    pub fn scan_entries<'a, I>(&self, entries: I) -> ScanOutcome
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let mut outcome = ScanOutcome::default();
        for path in entries {
            match self.scan_entry(path) {
                Ok(classes) => outcome.classes.merge(&classes),
                Err(error) => {
                    warn!(path = %path.display(), error = %error, "skipping unreadable classpath entry");
                    outcome.skipped.push(SkippedEntry {
                        path: path.clone(),
                        error,
                    });
                }
            }
        }
        outcome
    }

    /// Scan a single classpath entry, using the persistent cache when configured.
    pub fn scan_entry(&self, path: &Path) -> Result<ClassNameSet, ScanError> {
        if !path.exists() {
            return Err(ScanError::Missing {
                path: path.to_path_buf(),
            });
        }

        let Some(cache) = &self.cache else {
            return scan_artifact(path);
        };

        let fingerprint = match cache.fingerprint(path) {
            Ok(fingerprint) => fingerprint,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "class index fingerprint failed");
                return scan_artifact(path);
            }
        };

        match cache.load(&fingerprint) {
            Ok(Some(cached)) => {
                debug!(path = %path.display(), classes = cached.classes.len(), "class index cache hit");
                return Ok(cached.classes);
            }
            Ok(None) => {}
            Err(error) => {
                warn!(path = %path.display(), error = %error, "discarding unusable class index cache entry");
            }
        }

        let started = Instant::now();
        let classes = scan_artifact(path)?;
        if let Err(error) = cache.store(&fingerprint, &classes, started.elapsed()) {
            warn!(path = %path.display(), error = %error, "failed to store class index cache entry");
        }
        Ok(classes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveLayout {
    Jar,
    Jmod,
}

fn scan_artifact(path: &Path) -> Result<ClassNameSet, ScanError> {
    if path.is_dir() {
        return scan_directory(path);
    }

    if let Some(layout) = archive_layout(path) {
        return scan_archive(path, layout);
    }

    if has_extension(path, "class") {
        return scan_class_file(path);
    }

    Err(ScanError::Unsupported {
        path: path.to_path_buf(),
    })
}

fn scan_directory(root: &Path) -> Result<ClassNameSet, ScanError> {
    let mut classes = ClassNameSet::new();
    let mut dirs = vec![root.to_path_buf()];
    while let Some(dir) = dirs.pop() {
        let entries = fs::read_dir(&dir).map_err(|source| ScanError::Io {
            path: dir.clone(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| ScanError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|source| ScanError::Io {
                path: path.clone(),
                source,
            })?;
            if file_type.is_dir() {
                dirs.push(path);
                continue;
            }

            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let relative = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if let Some(name) = top_level_class_name(&relative) {
                classes.insert(name);
            }
        }
    }
    Ok(classes)
}

fn scan_archive(path: &Path, layout: ArchiveLayout) -> Result<ClassNameSet, ScanError> {
    let file = File::open(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let archive = ZipArchive::new(BufReader::new(file)).map_err(|source| ScanError::Zip {
        path: path.to_path_buf(),
        source,
    })?;

    let mut classes = ClassNameSet::new();
    for name in archive.file_names() {
        let name = match layout {
            ArchiveLayout::Jar => name,
            ArchiveLayout::Jmod => match name.strip_prefix("classes/") {
                Some(stripped) => stripped,
                None => continue,
            },
        };
        if let Some(class_name) = top_level_class_name(name) {
            classes.insert(class_name);
        }
    }
    Ok(classes)
}

fn scan_class_file(path: &Path) -> Result<ClassNameSet, ScanError> {
    let bytes = fs::read(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let name = read_class_name(&bytes).map_err(|source| ScanError::ClassFile {
        path: path.to_path_buf(),
        source,
    })?;

    let mut classes = ClassNameSet::new();
    let simple = name.rsplit('.').next().unwrap_or(&name);
    if !simple.contains('$') {
        classes.insert(name);
    }
    Ok(classes)
}

/// Map an archive or directory relative path (`/`-separated) to the
/// top-level class it defines.
///
/// Nested and anonymous classes, `module-info`, `package-info` and anything
/// under `META-INF/` yield `None`.
pub fn top_level_class_name(entry: &str) -> Option<String> {
    if entry.starts_with("META-INF/") {
        return None;
    }
    let stem = entry.strip_suffix(".class")?;
    let simple = stem.rsplit('/').next().unwrap_or(stem);
    if simple.is_empty()
        || simple.contains('$')
        || simple == "module-info"
        || simple == "package-info"
    {
        return None;
    }
    Some(stem.replace('/', "."))
}

fn archive_layout(path: &Path) -> Option<ArchiveLayout> {
    let ext = path.extension().and_then(OsStr::to_str)?;
    if ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip") {
        Some(ArchiveLayout::Jar)
    } else if ext.eq_ignore_ascii_case("jmod") {
        Some(ArchiveLayout::Jmod)
    } else {
        None
    }
}

fn has_extension(path: &Path, expected: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

use crate::class_names::ClassNameSet;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

const CACHE_VERSION: u32 = 1;
const FINGERPRINT_VERSION: u32 = 1;

/// Error type for class index cache load/store operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cache encoding error: {0}")]
    Encode(#[from] bincode::Error),
    #[error("cache version mismatch (expected {expected}, found {found})")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("cache fingerprint mismatch")]
    FingerprintMismatch,
}

/// Metrics captured when the cache entry was produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheMetrics {
    pub scan_ms: u64,
    pub class_count: u32,
    pub recorded_at_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    fingerprint: CacheFingerprint,
    metrics: CacheMetrics,
    classes: ClassNameSet,
}

/// Fingerprint of one classpath entry as it was on disk when it was scanned.
///
/// Two fingerprints of the same path compare equal only while the entry's
/// size and modification stamps are unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheFingerprint {
    version: u32,
    path: String,
    stamp: EntryStamp,
}

impl CacheFingerprint {
    pub(crate) fn capture(path: &Path) -> Result<Self, CacheError> {
        Ok(Self {
            version: FINGERPRINT_VERSION,
            path: path.to_string_lossy().into_owned(),
            stamp: EntryStamp::read(path)?,
        })
    }
}

/// On-disk state of an entry. Class directories only count `.class` files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
enum EntryStamp {
    Absent,
    Archive {
        len: u64,
        modified_ms: Option<u64>,
    },
    ClassTree(TreeTotals),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
struct TreeTotals {
    class_files: u64,
    bytes: u64,
    newest_ms: Option<u64>,
}

impl EntryStamp {
    fn read(path: &Path) -> Result<Self, CacheError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Self::Absent),
            Err(error) => return Err(error.into()),
        };
        if !metadata.is_dir() {
            return Ok(Self::Archive {
                len: metadata.len(),
                modified_ms: modified_ms(&metadata),
            });
        }

        let mut totals = TreeTotals {
            newest_ms: modified_ms(&metadata),
            ..TreeTotals::default()
        };
        totals.add_tree(path)?;
        Ok(Self::ClassTree(totals))
    }
}

impl TreeTotals {
    fn add_tree(&mut self, dir: &Path) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            // Directory stamps move when class files are added or removed.
            self.newest_ms = self.newest_ms.max(modified_ms(&metadata));
            if metadata.is_dir() {
                self.add_tree(&entry.path())?;
            } else if entry.path().extension().is_some_and(|ext| ext == "class") {
                self.class_files += 1;
                self.bytes += metadata.len();
            }
        }
        Ok(())
    }
}

fn modified_ms(metadata: &fs::Metadata) -> Option<u64> {
    let since_epoch = metadata.modified().ok()?.duration_since(UNIX_EPOCH).ok()?;
    u64::try_from(since_epoch.as_millis()).ok()
}

/// Cached class names alongside the metrics captured when storing them.
#[derive(Debug)]
pub struct CachedClasses {
    pub classes: ClassNameSet,
    pub metrics: CacheMetrics,
}

/// Persistent per-entry class index.
#[derive(Debug, Clone)]
pub struct ClassIndexCache {
    root: PathBuf,
}

impl ClassIndexCache {
    /// Construct a cache rooted under the provided directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Cache under `KLS_CACHE_DIR`, or a `kls/class-index` directory in the
    /// system temp dir when the variable is unset.
    pub fn with_default_location() -> Self {
        let root = env::var_os("KLS_CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| env::temp_dir().join("kls").join("class-index"));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute the cache key (hex digest) for the supplied fingerprint.
    pub fn cache_key(&self, fingerprint: &CacheFingerprint) -> Result<String, CacheError> {
        let encoded = bincode::serialize(fingerprint)?;
        Ok(blake3::hash(&encoded).to_hex().to_string())
    }

    pub fn fingerprint(&self, path: &Path) -> Result<CacheFingerprint, CacheError> {
        CacheFingerprint::capture(path)
    }

    /// Attempt to load cached class names for an entry.
    pub fn load(&self, fingerprint: &CacheFingerprint) -> Result<Option<CachedClasses>, CacheError> {
        let path = self.entry_path(fingerprint)?;
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let entry: CacheFile = bincode::deserialize_from(&mut reader)?;

        if entry.version != CACHE_VERSION {
            return Err(CacheError::VersionMismatch {
                expected: CACHE_VERSION,
                found: entry.version,
            });
        }

        if entry.fingerprint != *fingerprint {
            return Err(CacheError::FingerprintMismatch);
        }

        Ok(Some(CachedClasses {
            classes: entry.classes,
            metrics: entry.metrics,
        }))
    }

    /// Persist freshly scanned class names.
    pub fn store(
        &self,
        fingerprint: &CacheFingerprint,
        classes: &ClassNameSet,
        scan_duration: Duration,
    ) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root)?;
        let path = self.entry_path(fingerprint)?;

        let metrics = CacheMetrics {
            scan_ms: scan_duration.as_millis().min(u128::from(u64::MAX)) as u64,
            class_count: classes.len().min(u32::MAX as usize) as u32,
            recorded_at_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)),
        };

        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let entry = CacheFile {
            version: CACHE_VERSION,
            fingerprint: fingerprint.clone(),
            metrics,
            classes: classes.clone(),
        };

        bincode::serialize_into(&mut writer, &entry)?;
        Ok(())
    }

    fn entry_path(&self, fingerprint: &CacheFingerprint) -> Result<PathBuf, CacheError> {
        let key = self.cache_key(fingerprint)?;
        Ok(self.root.join(format!("class-index-{key}.bin")))
    }
}

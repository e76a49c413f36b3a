use crate::cache::CacheFingerprint;
use crate::class_names::ClassNameSet;
use crate::scanner::ClasspathScanner;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
struct IndexedEntry {
    /// `None` when the entry could not be stat'ed; such entries are rescanned
    /// on every lookup.
    fingerprint: Option<CacheFingerprint>,
    classes: Arc<ClassNameSet>,
}

/// Immutable view of every boot classpath entry scanned so far.
#[derive(Debug, Default)]
pub struct BootSnapshot {
    current: Vec<PathBuf>,
    classes: HashMap<PathBuf, Arc<IndexedEntry>>,
}

impl BootSnapshot {
    /// Entries named by the most recent update.
    pub fn current_entries(&self) -> &[PathBuf] {
        &self.current
    }

    pub fn is_scanned(&self, entry: &PathBuf) -> bool {
        self.classes.contains_key(entry)
    }

    pub fn scanned_entries(&self) -> usize {
        self.classes.len()
    }

    fn is_up_to_date(&self, entry: &PathBuf, fingerprint: Option<&CacheFingerprint>) -> bool {
        match (self.classes.get(entry), fingerprint) {
            (Some(indexed), Some(fingerprint)) => indexed.fingerprint.as_ref() == Some(fingerprint),
            _ => false,
        }
    }

    fn union_of(&self, entries: &[PathBuf]) -> ClassNameSet {
        ClassNameSet::union(
            entries
                .iter()
                .filter_map(|entry| self.classes.get(entry))
                .map(|indexed| indexed.classes.as_ref()),
        )
    }
}

/// Platform boot classpath index shared by every platform module of a project.
///
/// Readers always observe a complete snapshot: updates build a new
/// [`BootSnapshot`] off to the side and publish it with a single swap.
/// Entries whose file changed on disk since they were indexed are scanned
/// again on the next update or lookup.
#[derive(Debug)]
pub struct BootClasspathCache {
    scanner: ClasspathScanner,
    snapshot: ArcSwap<BootSnapshot>,
}

impl BootClasspathCache {
    pub fn new(scanner: ClasspathScanner) -> Self {
        Self {
            scanner,
            snapshot: ArcSwap::from_pointee(BootSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> Arc<BootSnapshot> {
        self.snapshot.load_full()
    }

    /// Make `entries` the current boot classpath, scanning the ones not seen
    /// yet or changed since they were indexed.
    pub fn update(&self, entries: &[PathBuf]) {
        let scanned = self.scan_outdated(entries);
        self.publish(entries, scanned, true);
    }

    /// Top-level classes visible from `entries`. Entries not yet indexed, or
    /// changed on disk, are scanned into the shared index first.
    pub fn top_level_classes(&self, entries: &[PathBuf]) -> ClassNameSet {
        let scanned = self.scan_outdated(entries);
        if !scanned.is_empty() {
            self.publish(entries, scanned, false);
        }
        self.snapshot.load().union_of(entries)
    }

    /// Forget every indexed entry.
    pub fn clear(&self) {
        let previous = self.snapshot.swap(Arc::new(BootSnapshot::default()));
        debug!(entries = previous.scanned_entries(), "boot classpath index cleared");
    }

    fn scan_outdated(&self, entries: &[PathBuf]) -> Vec<(PathBuf, Arc<IndexedEntry>)> {
        let snapshot = self.snapshot.load();
        let outdated = entries
            .iter()
            .map(|entry| (entry, CacheFingerprint::capture(entry).ok()))
            .filter(|(entry, fingerprint)| !snapshot.is_up_to_date(entry, fingerprint.as_ref()))
            .map(|(entry, fingerprint)| (entry.clone(), fingerprint))
            .collect::<Vec<_>>();
        drop(snapshot);

        outdated
            .into_iter()
            .filter_map(|(entry, fingerprint)| match self.scanner.scan_entry(&entry) {
                Ok(classes) => {
                    let indexed = IndexedEntry {
                        fingerprint,
                        classes: Arc::new(classes),
                    };
                    Some((entry, Arc::new(indexed)))
                }
                Err(error) => {
                    warn!(path = %entry.display(), error = %error, "skipping unreadable boot classpath entry");
                    None
                }
            })
            .collect()
    }

    fn publish(
        &self,
        entries: &[PathBuf],
        scanned: Vec<(PathBuf, Arc<IndexedEntry>)>,
        make_current: bool,
    ) {
        self.snapshot.rcu(|previous| {
            let mut classes = previous.classes.clone();
            for (entry, indexed) in &scanned {
                classes.insert(entry.clone(), Arc::clone(indexed));
            }
            let current = if make_current {
                entries.to_vec()
            } else {
                previous.current.clone()
            };
            BootSnapshot { current, classes }
        });
        debug!(
            entries = entries.len(),
            scanned = scanned.len(),
            "boot classpath snapshot published"
        );
    }
}

impl Default for BootClasspathCache {
    fn default() -> Self {
        Self::new(ClasspathScanner::new())
    }
}

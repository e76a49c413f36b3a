use crate::ModelError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Kind tag deciding which boot classpath strategy applies to a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModuleKind {
    /// Targets the JVM only; boot classes come from the configured default boot classpath.
    #[default]
    Plain,
    /// Targets a platform (e.g. an Android SDK level) that declares its own boot classpath.
    Platform,
}

impl ModuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Plain => "plain",
            ModuleKind::Platform => "platform",
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compilation unit as seen by the analysis layer.
///
/// Implementations are owned by the surrounding project system. The analysis
/// layer only reads them and never mutates a module.
pub trait ModuleProject: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn path(&self) -> &Path;

    fn kind(&self) -> ModuleKind;

    /// Whether the module is still backed by a loaded project.
    ///
    /// Project systems flip this to `false` when the module object is torn
    /// down or replaced while requests may still hold it.
    fn is_live(&self) -> bool {
        true
    }

    /// Monotonic configuration counter; bumped whenever the declared
    /// classpath of the same module object changes.
    fn generation(&self) -> u64 {
        0
    }

    /// Declared dependency classpath entries (archives or class directories).
    fn compile_classpaths(&self) -> Result<Vec<PathBuf>, ModelError>;

    /// Declared boot classpath entries. Only consulted for platform modules.
    fn boot_classpaths(&self) -> Result<Vec<PathBuf>, ModelError> {
        Ok(Vec::new())
    }

    /// Fully-qualified names of the classes declared by the module's own sources.
    fn source_classes(&self) -> Result<BTreeSet<String>, ModelError>;

    /// Compiled-source output directories of the module, scanned for local classes.
    fn source_output_dirs(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Shared handle to a module owned by the project system.
pub type ModuleRef = Arc<dyn ModuleProject>;

/// Identity of a module object.
///
/// Two modules with equal contents created independently have different
/// keys. A key is only meaningful while the module it was taken from is
/// kept alive, which every cache holding a key guarantees by also holding
/// the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(usize);

impl ModuleKey {
    pub fn of<M: ModuleProject + ?Sized>(module: &Arc<M>) -> Self {
        Self(Arc::as_ptr(module) as *const () as usize)
    }
}

/// Declared configuration of a [`ProjectModule`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleSettings {
    pub kind: ModuleKind,
    pub compile_classpaths: Vec<PathBuf>,
    pub boot_classpaths: Vec<PathBuf>,
    pub source_classes: BTreeSet<String>,
    pub source_output_dirs: Vec<PathBuf>,
}

impl ModuleSettings {
    pub fn plain() -> Self {
        Self::default()
    }

    pub fn platform<I>(boot_classpaths: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        Self {
            kind: ModuleKind::Platform,
            boot_classpaths: boot_classpaths.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_compile_classpaths<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.compile_classpaths = entries.into_iter().collect();
        self
    }

    pub fn with_source_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_classes = classes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source_output_dirs<I>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.source_output_dirs = dirs.into_iter().collect();
        self
    }
}

/// In-memory module backed by [`ModuleSettings`].
#[derive(Debug)]
pub struct ProjectModule {
    name: String,
    path: PathBuf,
    settings: RwLock<ModuleSettings>,
    generation: AtomicU64,
    live: AtomicBool,
}

impl ProjectModule {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, settings: ModuleSettings) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            settings: RwLock::new(settings),
            generation: AtomicU64::new(0),
            live: AtomicBool::new(true),
        }
    }

    pub fn settings(&self) -> ModuleSettings {
        self.settings.read().clone()
    }

    /// Replace the declared configuration of this module object in place.
    pub fn reconfigure(&self, settings: ModuleSettings) {
        *self.settings.write() = settings;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(module = %self.name, generation, "module reconfigured");
    }

    /// Mark the module as no longer backed by a loaded project.
    pub fn detach(&self) {
        if self.live.swap(false, Ordering::AcqRel) {
            tracing::debug!(module = %self.name, "module detached");
        }
    }
}

impl ModuleProject for ProjectModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> ModuleKind {
        self.settings.read().kind
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    fn compile_classpaths(&self) -> Result<Vec<PathBuf>, ModelError> {
        Ok(self.settings.read().compile_classpaths.clone())
    }

    fn boot_classpaths(&self) -> Result<Vec<PathBuf>, ModelError> {
        Ok(self.settings.read().boot_classpaths.clone())
    }

    fn source_classes(&self) -> Result<BTreeSet<String>, ModelError> {
        Ok(self.settings.read().source_classes.clone())
    }

    fn source_output_dirs(&self) -> Vec<PathBuf> {
        self.settings.read().source_output_dirs.clone()
    }
}

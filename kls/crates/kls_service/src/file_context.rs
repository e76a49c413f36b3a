use crate::environment::EngineEnvironment;
use kls_classpath::{BootClasspathCache, ResolveError};
use kls_project::{ModelError, ModuleKey, ModuleKind, ModuleProject, ModuleRef};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Classpath view of one module as handed to the analysis engine.
///
/// Entry sets are captured at construction. A context built for the absent
/// module is empty and reports itself as non-platform.
#[derive(Debug)]
pub struct ModuleFileContext {
    module: Option<ModuleRef>,
    generation: u64,
    platform: bool,
    class_paths: BTreeSet<PathBuf>,
    boot_class_paths: BTreeSet<PathBuf>,
    destroyed: AtomicBool,
}

impl ModuleFileContext {
    pub fn no_module() -> Self {
        Self {
            module: None,
            generation: 0,
            platform: false,
            class_paths: BTreeSet::new(),
            boot_class_paths: BTreeSet::new(),
            destroyed: AtomicBool::new(false),
        }
    }

    fn build(
        module: &ModuleRef,
        platform_home: Option<&Path>,
        environment: &dyn EngineEnvironment,
        boot: &BootClasspathCache,
    ) -> Result<Self, ResolveError> {
        if let Some(home) = platform_home {
            environment.configure_platform_home(home);
        }

        let generation = module.generation();
        let class_paths = module
            .compile_classpaths()
            .map_err(|source| model_error(module.as_ref(), source))?
            .into_iter()
            .collect::<BTreeSet<_>>();

        let platform = module.kind() == ModuleKind::Platform;
        let boot_class_paths = if platform {
            let entries = module
                .boot_classpaths()
                .map_err(|source| model_error(module.as_ref(), source))?
                .into_iter()
                .collect::<BTreeSet<_>>();
            boot.update(&entries.iter().cloned().collect::<Vec<_>>());
            entries
        } else {
            BTreeSet::new()
        };

        debug!(
            module = %module.name(),
            generation,
            class_paths = class_paths.len(),
            boot_class_paths = boot_class_paths.len(),
            "module file context created"
        );

        Ok(Self {
            module: Some(Arc::clone(module)),
            generation,
            platform,
            class_paths,
            boot_class_paths,
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn module(&self) -> Option<&ModuleRef> {
        self.module.as_ref()
    }

    /// Module generation the entry sets were read at.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn class_paths(&self) -> &BTreeSet<PathBuf> {
        &self.class_paths
    }

    pub fn boot_class_paths(&self) -> &BTreeSet<PathBuf> {
        &self.boot_class_paths
    }

    pub fn all_class_paths(&self) -> BTreeSet<PathBuf> {
        self.class_paths
            .union(&self.boot_class_paths)
            .cloned()
            .collect()
    }

    pub fn is_platform_module(&self) -> bool {
        self.platform
    }

    /// Every entry, sorted and joined with the platform path separator.
    pub fn classpath_string(&self) -> String {
        let separator = if cfg!(windows) { ";" } else { ":" };
        self.all_class_paths()
            .iter()
            .map(|path| path.to_string_lossy())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Release the context. Entry sets stay readable afterwards.
    pub fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            if let Some(module) = &self.module {
                debug!(module = %module.name(), "module file context destroyed");
            }
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    fn is_current_for(&self, module: &dyn ModuleProject) -> bool {
        !self.is_destroyed() && self.generation == module.generation()
    }
}

fn model_error(module: &dyn ModuleProject, source: ModelError) -> ResolveError {
    ResolveError::Model {
        module: module.name().to_string(),
        source,
    }
}

/// Process-wide cache of file contexts, one per module identity.
#[derive(Debug)]
pub struct FileContextCache {
    contexts: RwLock<HashMap<ModuleKey, Arc<ModuleFileContext>>>,
    environment: Arc<dyn EngineEnvironment>,
    boot: Arc<BootClasspathCache>,
    platform_home: Option<PathBuf>,
}

impl FileContextCache {
    pub fn new(
        environment: Arc<dyn EngineEnvironment>,
        boot: Arc<BootClasspathCache>,
        platform_home: Option<PathBuf>,
    ) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            environment,
            boot,
            platform_home,
        }
    }

    /// Cached context for `module`, rebuilt when the module was reconfigured
    /// or the cached context was destroyed. Concurrent callers for the same
    /// module observe one instance.
    pub fn for_module(&self, module: &ModuleRef) -> Result<Arc<ModuleFileContext>, ResolveError> {
        let key = ModuleKey::of(module);
        if let Some(context) = self.contexts.read().get(&key) {
            if context.is_current_for(module.as_ref()) {
                return Ok(Arc::clone(context));
            }
        }

        let built = Arc::new(ModuleFileContext::build(
            module,
            self.platform_home.as_deref(),
            self.environment.as_ref(),
            &self.boot,
        )?);

        let mut contexts = self.contexts.write();
        if let Some(existing) = contexts.get(&key) {
            if existing.is_current_for(module.as_ref()) {
                return Ok(Arc::clone(existing));
            }
        }
        if let Some(previous) = contexts.insert(key, Arc::clone(&built)) {
            previous.destroy();
        }
        Ok(built)
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }

    /// Destroy and forget contexts whose module was detached or reconfigured.
    /// Returns how many were removed.
    pub fn purge_stale(&self) -> usize {
        let mut contexts = self.contexts.write();
        let before = contexts.len();
        contexts.retain(|_, context| {
            let current = context
                .module()
                .is_some_and(|module| module.is_live() && context.is_current_for(module.as_ref()));
            if !current {
                context.destroy();
            }
            current
        });
        before - contexts.len()
    }

    /// Destroy and forget every cached context.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.contexts.write());
        for context in drained.values() {
            context.destroy();
        }
    }
}

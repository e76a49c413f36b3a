use crate::file_context::ModuleFileContext;
use arc_swap::ArcSwap;
use kls_classpath::{ClassNameSet, ClasspathResolver, ResolveError};
use kls_project::ModuleRef;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// A class known to a service, split into its name parts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClassInfo {
    pub simple_name: String,
    pub fully_qualified_name: String,
    pub package_name: String,
}

impl ClassInfo {
    pub fn from_qualified(name: &str) -> Self {
        let (package_name, simple_name) = match name.rsplit_once('.') {
            Some((package, simple)) => (package, simple),
            None => ("", name),
        };
        Self {
            simple_name: simple_name.to_string(),
            fully_qualified_name: name.to_string(),
            package_name: package_name.to_string(),
        }
    }
}

/// Per-module analysis state: the module's file context plus its resolved
/// dependency and boot class sets.
#[derive(Debug)]
pub struct AnalysisService {
    module: Option<ModuleRef>,
    generation: u64,
    file_context: Arc<ModuleFileContext>,
    resolver: Arc<ClasspathResolver>,
    dependency_classes: Arc<ClassNameSet>,
    boot_classes: ArcSwap<ClassNameSet>,
    destroyed: AtomicBool,
}

impl AnalysisService {
    /// Service for the absent module. All class sets are empty.
    pub fn no_module() -> Self {
        Self {
            module: None,
            generation: 0,
            file_context: Arc::new(ModuleFileContext::no_module()),
            resolver: Arc::new(ClasspathResolver::default()),
            dependency_classes: Arc::new(ClassNameSet::new()),
            boot_classes: ArcSwap::from_pointee(ClassNameSet::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub(crate) fn build(
        module: &ModuleRef,
        file_context: Arc<ModuleFileContext>,
        resolver: Arc<ClasspathResolver>,
    ) -> Result<Self, ResolveError> {
        let entries = file_context.class_paths().iter().cloned().collect::<Vec<_>>();
        let dependency_classes = resolver.dependency_classes_for(&entries);
        let boot_classes = resolver.boot_classes_for_module(Some(module.as_ref()))?;

        Ok(Self {
            module: Some(Arc::clone(module)),
            generation: file_context.generation(),
            file_context,
            resolver,
            dependency_classes,
            boot_classes: ArcSwap::from_pointee(boot_classes),
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn module(&self) -> Option<&ModuleRef> {
        self.module.as_ref()
    }

    /// True while the owning module is attached and unchanged since this
    /// service was built.
    pub fn is_live(&self) -> bool {
        match &self.module {
            Some(module) => {
                !self.is_destroyed() && module.is_live() && module.generation() == self.generation
            }
            None => false,
        }
    }

    /// Every class visible to the module: its dependencies, its boot
    /// classpath and its own sources. Sources are re-read on each call.
    pub fn available_types(&self) -> ClassNameSet {
        let local = match self.resolver.resolve_local_classes(self.module.as_deref()) {
            Ok(local) => local,
            Err(error) => {
                warn!(error = %error, "failed to read module source classes");
                ClassNameSet::new()
            }
        };
        let boot = self.boot_classes.load();
        ClassNameSet::union([&*self.dependency_classes, &**boot, &local])
    }

    /// Membership in the dependency or boot tier. Module sources are not
    /// consulted.
    pub fn is_class_available(&self, name: &str) -> bool {
        self.dependency_classes.contains(name) || self.boot_classes.load().contains(name)
    }

    /// Available types whose simple name starts with `prefix`.
    pub fn find_classes_by_prefix(&self, prefix: &str) -> Vec<ClassInfo> {
        if prefix.is_empty() {
            return Vec::new();
        }
        self.available_types()
            .iter()
            .map(ClassInfo::from_qualified)
            .filter(|info| info.simple_name.starts_with(prefix))
            .collect()
    }

    pub fn file_manager(&self) -> &Arc<ModuleFileContext> {
        &self.file_context
    }

    pub fn dependency_classes(&self) -> Arc<ClassNameSet> {
        Arc::clone(&self.dependency_classes)
    }

    pub fn boot_classes(&self) -> Arc<ClassNameSet> {
        self.boot_classes.load_full()
    }

    /// Recompute the boot tier from the module's current boot entries.
    pub fn refresh_boot_classes(&self) -> Result<(), ResolveError> {
        let refreshed = self
            .resolver
            .boot_classes_for_module(self.module.as_deref())?;
        debug!(classes = refreshed.len(), "boot classes refreshed");
        self.boot_classes.store(Arc::new(refreshed));
        Ok(())
    }

    /// Release the service and its file context.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.file_context.destroy();
        if let Some(module) = &self.module {
            debug!(module = %module.name(), "analysis service destroyed");
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }
}

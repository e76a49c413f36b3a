use crate::boot::BootClasspathCache;
use crate::class_names::ClassNameSet;
use crate::scanner::ClasspathScanner;
use kls_project::{ModelError, ModuleKind, ModuleProject};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Failure to obtain the inputs needed to resolve a module's classes.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to query module '{module}': {source}")]
    Model {
        module: String,
        #[source]
        source: ModelError,
    },
}

impl ResolveError {
    fn model(module: &dyn ModuleProject) -> impl FnOnce(ModelError) -> ResolveError + '_ {
        move |source| ResolveError::Model {
            module: module.name().to_string(),
            source,
        }
    }
}

/// Resolves the three class-name tiers of a module.
///
/// Dependency sets are memoized per distinct entry set and never rescanned
/// for the same entries. Boot classes are recomputed on every call; callers
/// keep the result.
#[derive(Debug)]
pub struct ClasspathResolver {
    scanner: ClasspathScanner,
    boot: Arc<BootClasspathCache>,
    default_boot_classpath: Vec<PathBuf>,
    dependency_sets: RwLock<HashMap<Vec<PathBuf>, Arc<ClassNameSet>>>,
}

impl ClasspathResolver {
    pub fn new(scanner: ClasspathScanner) -> Self {
        let boot = Arc::new(BootClasspathCache::new(scanner.clone()));
        Self::with_boot_cache(scanner, boot)
    }

    pub fn with_boot_cache(scanner: ClasspathScanner, boot: Arc<BootClasspathCache>) -> Self {
        Self {
            scanner,
            boot,
            default_boot_classpath: Vec::new(),
            dependency_sets: RwLock::new(HashMap::new()),
        }
    }

    /// Boot entries used for modules that do not declare their own platform.
    pub fn with_default_boot_classpath<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.default_boot_classpath = entries.into_iter().collect();
        self
    }

    pub fn boot_cache(&self) -> &Arc<BootClasspathCache> {
        &self.boot
    }

    pub fn default_boot_classpath(&self) -> &[PathBuf] {
        &self.default_boot_classpath
    }

    pub fn union<'a, I>(sets: I) -> ClassNameSet
    where
        I: IntoIterator<Item = &'a ClassNameSet>,
    {
        ClassNameSet::union(sets)
    }

    /// Classes declared by the module's own sources plus whatever its
    /// compiled-source output directories contain.
    pub fn resolve_local_classes(
        &self,
        module: Option<&dyn ModuleProject>,
    ) -> Result<ClassNameSet, ResolveError> {
        let Some(module) = module else {
            return Ok(ClassNameSet::new());
        };

        let mut classes = ClassNameSet::from(
            module
                .source_classes()
                .map_err(ResolveError::model(module))?,
        );
        let outputs = module
            .source_output_dirs()
            .into_iter()
            .filter(|dir| dir.exists())
            .collect::<Vec<_>>();
        if !outputs.is_empty() {
            classes.merge(&self.scanner.scan_entries(&outputs).classes);
        }
        Ok(classes)
    }

    pub fn resolve_dependency_classes(
        &self,
        module: Option<&dyn ModuleProject>,
    ) -> Result<Arc<ClassNameSet>, ResolveError> {
        let Some(module) = module else {
            return Ok(Arc::new(ClassNameSet::new()));
        };
        let entries = module
            .compile_classpaths()
            .map_err(ResolveError::model(module))?;
        Ok(self.dependency_classes_for(&entries))
    }

    /// Classes of a dependency entry set, scanned once per distinct set.
    pub fn dependency_classes_for(&self, entries: &[PathBuf]) -> Arc<ClassNameSet> {
        let key = normalize(entries);
        if let Some(existing) = self.dependency_sets.read().get(&key) {
            return Arc::clone(existing);
        }

        let outcome = self.scanner.scan_entries(&key);
        debug!(
            entries = key.len(),
            classes = outcome.classes.len(),
            skipped = outcome.skipped.len(),
            "dependency classes resolved"
        );
        let resolved = Arc::new(outcome.classes);
        Arc::clone(
            self.dependency_sets
                .write()
                .entry(key)
                .or_insert(resolved),
        )
    }

    pub fn resolve_boot_classes(&self, locations: &[PathBuf]) -> ClassNameSet {
        self.boot.top_level_classes(&normalize(locations))
    }

    /// Boot classes for `module`. Platform modules re-derive their boot
    /// entries from the module and refresh the shared boot index on every call.
    pub fn boot_classes_for_module(
        &self,
        module: Option<&dyn ModuleProject>,
    ) -> Result<ClassNameSet, ResolveError> {
        let Some(module) = module else {
            return Ok(ClassNameSet::new());
        };

        match module.kind() {
            ModuleKind::Platform => {
                let entries = normalize(
                    &module
                        .boot_classpaths()
                        .map_err(ResolveError::model(module))?,
                );
                self.boot.update(&entries);
                Ok(self.boot.top_level_classes(&entries))
            }
            ModuleKind::Plain => Ok(self.resolve_boot_classes(&self.default_boot_classpath)),
        }
    }

    /// Forget memoized dependency sets so the next resolution rescans.
    pub fn clear_dependency_classes(&self) {
        self.dependency_sets.write().clear();
    }

    pub fn memoized_dependency_sets(&self) -> usize {
        self.dependency_sets.read().len()
    }
}

impl Default for ClasspathResolver {
    fn default() -> Self {
        Self::new(ClasspathScanner::new())
    }
}

fn normalize(entries: &[PathBuf]) -> Vec<PathBuf> {
    let mut key = entries.to_vec();
    key.sort();
    key.dedup();
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{write_class_dir, write_jar};
    use kls_project::{ModuleSettings, ProjectModule};
    use std::collections::BTreeSet;
    use std::path::Path;
    use tempfile::tempdir;

    #[derive(Debug)]
    struct BrokenModule;

    impl ModuleProject for BrokenModule {
        fn name(&self) -> &str {
            "broken"
        }

        fn path(&self) -> &Path {
            Path::new("/ws/broken")
        }

        fn kind(&self) -> ModuleKind {
            ModuleKind::Platform
        }

        fn compile_classpaths(&self) -> Result<Vec<PathBuf>, ModelError> {
            Err(ModelError::Unavailable {
                module: "broken".to_string(),
                reason: "sync failed".to_string(),
            })
        }

        fn boot_classpaths(&self) -> Result<Vec<PathBuf>, ModelError> {
            Err(ModelError::Unavailable {
                module: "broken".to_string(),
                reason: "platform not installed".to_string(),
            })
        }

        fn source_classes(&self) -> Result<BTreeSet<String>, ModelError> {
            Ok(BTreeSet::new())
        }
    }

    #[test]
    fn sentinel_module_resolves_to_empty_sets() {
        let resolver = ClasspathResolver::default();
        assert!(resolver.resolve_local_classes(None).unwrap().is_empty());
        assert!(resolver.resolve_dependency_classes(None).unwrap().is_empty());
        assert!(resolver.boot_classes_for_module(None).unwrap().is_empty());
    }

    #[test]
    fn local_classes_merge_declared_and_compiled_sources() {
        let dir = tempdir().expect("temp dir");
        let output = write_class_dir(&dir.path().join("build/classes"), &["com/app/Generated.class"]);
        let module = ProjectModule::new(
            "app",
            dir.path().join("app"),
            ModuleSettings::plain()
                .with_source_classes(["com.app.MainActivity"])
                .with_source_output_dirs([output, dir.path().join("not-built-yet")]),
        );

        let classes = ClasspathResolver::default()
            .resolve_local_classes(Some(&module))
            .expect("local classes");
        assert_eq!(
            classes.to_vec(),
            vec!["com.app.Generated", "com.app.MainActivity"]
        );
    }

    #[test]
    fn dependency_sets_are_memoized_per_entry_set() {
        let dir = tempdir().expect("temp dir");
        let jar = write_jar(&dir.path().join("lib.jar"), &["com/lib/Helper.class"]);
        let resolver = ClasspathResolver::default();

        let first = resolver.dependency_classes_for(&[jar.clone()]);
        // Rewriting the archive does not trigger a rescan for the same entry set.
        write_jar(&jar, &["com/lib/Helper.class", "com/lib/Other.class"]);
        let second = resolver.dependency_classes_for(&[jar.clone(), jar.clone()]);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.to_vec(), vec!["com.lib.Helper"]);

        resolver.clear_dependency_classes();
        let rescanned = resolver.dependency_classes_for(&[jar]);
        assert_eq!(rescanned.to_vec(), vec!["com.lib.Helper", "com.lib.Other"]);
    }

    #[test]
    fn plain_modules_use_the_default_boot_classpath() {
        let dir = tempdir().expect("temp dir");
        let rt = write_jar(&dir.path().join("rt.jar"), &["java/lang/String.class"]);
        let resolver = ClasspathResolver::default().with_default_boot_classpath([rt]);
        let module = ProjectModule::new("lib", dir.path().join("lib"), ModuleSettings::plain());

        let boot = resolver
            .boot_classes_for_module(Some(&module))
            .expect("boot classes");
        assert_eq!(boot.to_vec(), vec!["java.lang.String"]);
    }

    #[test]
    fn platform_modules_rederive_boot_entries_on_every_call() {
        let dir = tempdir().expect("temp dir");
        let api_33 = write_jar(&dir.path().join("android-33.jar"), &["android/Old.class"]);
        let api_34 = write_jar(&dir.path().join("android-34.jar"), &["android/New.class"]);
        let module = ProjectModule::new(
            "app",
            dir.path().join("app"),
            ModuleSettings::platform([api_33]),
        );
        let resolver = ClasspathResolver::default();

        let before = resolver
            .boot_classes_for_module(Some(&module))
            .expect("boot classes");
        module.reconfigure(ModuleSettings::platform([api_34.clone()]));
        let after = resolver
            .boot_classes_for_module(Some(&module))
            .expect("boot classes");

        assert_eq!(before.to_vec(), vec!["android.Old"]);
        assert_eq!(after.to_vec(), vec!["android.New"]);
        assert_eq!(resolver.boot_cache().snapshot().current_entries(), &[api_34]);
    }

    #[test]
    fn model_failures_surface_as_resolve_errors() {
        let resolver = ClasspathResolver::default();
        let error = resolver
            .resolve_dependency_classes(Some(&BrokenModule))
            .expect_err("model failure should propagate");
        assert!(matches!(error, ResolveError::Model { ref module, .. } if module == "broken"));

        assert!(resolver.boot_classes_for_module(Some(&BrokenModule)).is_err());
    }
}

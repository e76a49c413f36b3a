use crate::module::{ModuleSettings, ProjectModule};
use crate::ModelError;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Set of modules belonging to one opened project, addressed by name.
///
/// Replacing or removing a module detaches the previous module object so
/// that anything cached against it observes it as stale.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    modules: RwLock<BTreeMap<String, Arc<ProjectModule>>>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            modules: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a module under `name`, resolving its path relative to the workspace root.
    pub fn add_module(&self, name: &str, settings: ModuleSettings) -> Arc<ProjectModule> {
        let module = Arc::new(ProjectModule::new(name, self.root.join(name), settings));
        let previous = self
            .modules
            .write()
            .insert(name.to_string(), Arc::clone(&module));
        if let Some(previous) = previous {
            previous.detach();
        }
        module
    }

    /// Swap the module registered under `name` for a fresh module object.
    pub fn replace_module(
        &self,
        name: &str,
        settings: ModuleSettings,
    ) -> Result<Arc<ProjectModule>, ModelError> {
        let mut modules = self.modules.write();
        let previous = modules.get(name).cloned().ok_or_else(|| ModelError::Unavailable {
            module: name.to_string(),
            reason: "not part of the workspace".to_string(),
        })?;

        let module = Arc::new(ProjectModule::new(name, self.root.join(name), settings));
        modules.insert(name.to_string(), Arc::clone(&module));
        drop(modules);

        previous.detach();
        info!(module = %name, "module replaced");
        Ok(module)
    }

    pub fn remove_module(&self, name: &str) -> Option<Arc<ProjectModule>> {
        let removed = self.modules.write().remove(name);
        if let Some(module) = &removed {
            module.detach();
        }
        removed
    }

    pub fn module(&self, name: &str) -> Option<Arc<ProjectModule>> {
        self.modules.read().get(name).cloned()
    }

    pub fn modules(&self) -> Vec<Arc<ProjectModule>> {
        self.modules.read().values().cloned().collect()
    }

    /// Detach every module, e.g. when the project is closed.
    pub fn close(&self) {
        let modules = std::mem::take(&mut *self.modules.write());
        for module in modules.values() {
            module.detach();
        }
    }
}

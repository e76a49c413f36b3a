use crate::config::{ServiceConfig, StaleEntryPolicy};
use crate::environment::{EngineEnvironment, ProcessEnvironment};
use crate::file_context::FileContextCache;
use crate::service::AnalysisService;
use crate::ServiceError;
use kls_classpath::ClasspathResolver;
use kls_project::{ModuleKey, ModuleRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct RegistryState {
    /// Bumped by every teardown. Constructions started under an older epoch
    /// are discarded instead of inserted.
    epoch: u64,
    services: HashMap<ModuleKey, Arc<AnalysisService>>,
}

#[derive(Debug, Default)]
struct RegistryStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_rebuilds: AtomicU64,
    construction_failures: AtomicU64,
}

/// Point-in-time counters of a registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub stale_rebuilds: u64,
    pub construction_failures: u64,
}

impl RegistryStats {
    fn snapshot(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale_rebuilds: self.stale_rebuilds.load(Ordering::Relaxed),
            construction_failures: self.construction_failures.load(Ordering::Relaxed),
        }
    }
}

/// Process-wide map from module identity to its analysis service.
///
/// At most one live service exists per module. Callers asking for the same
/// module concurrently observe the same instance.
#[derive(Debug)]
pub struct AnalysisServiceRegistry {
    state: RwLock<RegistryState>,
    file_contexts: FileContextCache,
    resolver: Arc<ClasspathResolver>,
    stale_policy: StaleEntryPolicy,
    no_module: Arc<AnalysisService>,
    stats: RegistryStats,
}

impl AnalysisServiceRegistry {
    pub fn new(config: &ServiceConfig) -> Self {
        Self::with_environment(config, Arc::new(ProcessEnvironment))
    }

    pub fn with_environment(config: &ServiceConfig, environment: Arc<dyn EngineEnvironment>) -> Self {
        let resolver = Arc::new(
            ClasspathResolver::new(config.scanner())
                .with_default_boot_classpath(config.default_boot_classpath.iter().cloned()),
        );
        let file_contexts = FileContextCache::new(
            environment,
            Arc::clone(resolver.boot_cache()),
            config.resolved_platform_home(),
        );

        Self {
            state: RwLock::new(RegistryState::default()),
            file_contexts,
            resolver,
            stale_policy: config.stale_entries,
            no_module: Arc::new(AnalysisService::no_module()),
            stats: RegistryStats::default(),
        }
    }

    /// Service for `module`, built on first use and rebuilt once the cached
    /// one is no longer live. `None` yields the shared no-module service,
    /// which is never stored.
    pub fn get(&self, module: Option<&ModuleRef>) -> Result<Arc<AnalysisService>, ServiceError> {
        let Some(module) = module else {
            return Ok(Arc::clone(&self.no_module));
        };
        let key = ModuleKey::of(module);

        loop {
            let (epoch, stale) = {
                let state = self.state.read();
                match state.services.get(&key) {
                    Some(service) if service.is_live() => {
                        self.stats.hits.fetch_add(1, Ordering::Relaxed);
                        return Ok(Arc::clone(service));
                    }
                    Some(_) => (state.epoch, true),
                    None => (state.epoch, false),
                }
            };

            if stale {
                self.stats.stale_rebuilds.fetch_add(1, Ordering::Relaxed);
            } else {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
            }
            self.purge_stale();

            let service = match self.construct(module) {
                Ok(service) => Arc::new(service),
                Err(error) => {
                    self.stats
                        .construction_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(module = %module.name(), error = %error, "failed to create analysis service");
                    return Err(error);
                }
            };

            let mut state = self.state.write();
            if state.epoch != epoch {
                debug!(module = %module.name(), "registry torn down during construction; rebuilding");
                continue;
            }
            if let Some(existing) = state.services.get(&key) {
                if existing.is_live() {
                    return Ok(Arc::clone(existing));
                }
            }
            if let Some(previous) = state.services.insert(key, Arc::clone(&service)) {
                if self.stale_policy == StaleEntryPolicy::Dispose {
                    previous.destroy();
                }
            }
            return Ok(service);
        }
    }

    fn construct(&self, module: &ModuleRef) -> Result<AnalysisService, ServiceError> {
        let file_context = self.file_contexts.for_module(module)?;
        let service = AnalysisService::build(module, file_context, Arc::clone(&self.resolver))?;
        info!(
            module = %module.name(),
            kind = %module.kind(),
            dependency_classes = service.dependency_classes().len(),
            boot_classes = service.boot_classes().len(),
            "analysis service created"
        );
        Ok(service)
    }

    /// Remove and destroy every cached service whose module was detached,
    /// replaced or reconfigured, together with its file context. Does nothing
    /// under [`StaleEntryPolicy::Retain`].
    pub fn purge_stale(&self) -> usize {
        if self.stale_policy == StaleEntryPolicy::Retain {
            return 0;
        }
        let purged = {
            let mut state = self.state.write();
            let stale = state
                .services
                .iter()
                .filter(|(_, service)| !service.is_live())
                .map(|(key, _)| *key)
                .collect::<Vec<_>>();
            stale
                .into_iter()
                .filter_map(|key| state.services.remove(&key))
                .collect::<Vec<_>>()
        };
        for service in &purged {
            service.destroy();
        }
        let contexts = self.file_contexts.purge_stale();
        if !purged.is_empty() || contexts > 0 {
            debug!(services = purged.len(), contexts, "stale analysis services disposed");
        }
        purged.len()
    }

    /// Destroy every cached service and file context and drop the memoized
    /// dependency and boot indexes. Services being built concurrently are
    /// discarded and rebuilt by their callers.
    pub fn destroy_all(&self) {
        let mut state = self.state.write();
        state.epoch += 1;
        let services = std::mem::take(&mut state.services);
        for service in services.values() {
            service.destroy();
        }
        self.file_contexts.clear();
        self.resolver.clear_dependency_classes();
        self.resolver.boot_cache().clear();
        drop(state);

        info!(destroyed = services.len(), "analysis services destroyed");
    }

    /// Number of cached services, after stale entries have been purged.
    pub fn len(&self) -> usize {
        self.purge_stale();
        self.state.read().services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn resolver(&self) -> &Arc<ClasspathResolver> {
        &self.resolver
    }

    pub fn file_contexts(&self) -> &FileContextCache {
        &self.file_contexts
    }
}

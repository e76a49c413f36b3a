// kls_service - Per-module analysis services and their registry
mod config;
mod environment;
mod file_context;
mod registry;
pub mod retry;
mod service;

pub use config::{ConfigError, IndexCacheConfig, ReconnectConfig, ServiceConfig, StaleEntryPolicy};
pub use environment::{EngineEnvironment, ProcessEnvironment};
pub use file_context::{FileContextCache, ModuleFileContext};
pub use registry::{AnalysisServiceRegistry, RegistryStatsSnapshot};
pub use service::{AnalysisService, ClassInfo};

pub use kls_classpath::{ClassNameSet, ResolveError};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("analysis service construction failed: {0}")]
    Construction(#[from] ResolveError),
}

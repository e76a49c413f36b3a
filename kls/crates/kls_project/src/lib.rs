// kls_project - Project and module model consumed by the analysis services
mod module;
mod workspace;

pub use module::{ModuleKey, ModuleKind, ModuleProject, ModuleRef, ModuleSettings, ProjectModule};
pub use workspace::Workspace;

use std::path::PathBuf;
use thiserror::Error;

/// Failures reported by the project model while answering module queries.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("module '{module}' is unavailable: {reason}")]
    Unavailable { module: String, reason: String },
    #[error("IO error while reading module '{module}' at {path}: {source}")]
    Io {
        module: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests;
